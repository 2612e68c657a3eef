//! Paragraphs: runs of characters with embedded math insets

use math::{InsetMath, MathAtom, WriteStream};

/// Placeholder used for an inset when a paragraph is seen as text
pub const INSET_CHAR: char = '\u{FFFC}';

/// One element of a paragraph
#[derive(Debug, Clone, PartialEq)]
pub enum ParElement {
    Char(char),
    /// A formula or a macro template
    Inset(MathAtom),
}

impl ParElement {
    pub fn as_char(&self) -> Option<char> {
        match self {
            ParElement::Char(c) => Some(*c),
            ParElement::Inset(_) => None,
        }
    }

    pub fn as_inset(&self) -> Option<&MathAtom> {
        match self {
            ParElement::Inset(atom) => Some(atom),
            ParElement::Char(_) => None,
        }
    }

    pub fn as_inset_mut(&mut self) -> Option<&mut MathAtom> {
        match self {
            ParElement::Inset(atom) => Some(atom),
            ParElement::Char(_) => None,
        }
    }

    /// The character used for bidi analysis
    pub fn text_char(&self) -> char {
        self.as_char().unwrap_or(INSET_CHAR)
    }
}

/// A paragraph of the document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    elements: Vec<ParElement>,
    /// Explicit base direction; `None` follows the document default
    pub rtl: Option<bool>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A paragraph of plain text
    pub fn from_text(text: &str) -> Self {
        Self {
            elements: text.chars().map(ParElement::Char).collect(),
            rtl: None,
        }
    }

    pub fn from_elements(elements: Vec<ParElement>) -> Self {
        Self { elements, rtl: None }
    }

    /// Number of elements; also the last valid cursor offset
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[ParElement] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [ParElement] {
        &mut self.elements
    }

    pub fn get(&self, pos: usize) -> Option<&ParElement> {
        self.elements.get(pos)
    }

    /// The inset at `pos`, if the element there is one
    pub fn inset(&self, pos: usize) -> Option<&MathAtom> {
        self.elements.get(pos).and_then(ParElement::as_inset)
    }

    pub fn inset_mut(&mut self, pos: usize) -> Option<&mut MathAtom> {
        self.elements.get_mut(pos).and_then(ParElement::as_inset_mut)
    }

    /// Offset of the inset with the given atom id
    pub fn position_of(&self, id: math::AtomId) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| e.as_inset().is_some_and(|a| a.id() == id))
    }

    /// Characters with insets replaced by [`INSET_CHAR`]
    pub fn text(&self) -> String {
        self.elements.iter().map(ParElement::text_char).collect()
    }

    pub fn insert_char(&mut self, pos: usize, c: char) {
        let pos = pos.min(self.elements.len());
        self.elements.insert(pos, ParElement::Char(c));
    }

    pub fn insert_inset(&mut self, pos: usize, atom: MathAtom) {
        let pos = pos.min(self.elements.len());
        self.elements.insert(pos, ParElement::Inset(atom));
    }

    pub fn erase(&mut self, pos: usize) -> Option<ParElement> {
        (pos < self.elements.len()).then(|| self.elements.remove(pos))
    }

    /// Remove `from..to`, clamped to the paragraph
    pub fn erase_range(&mut self, from: usize, to: usize) -> Vec<ParElement> {
        let to = to.min(self.elements.len());
        let from = from.min(to);
        self.elements.drain(from..to).collect()
    }

    /// Split at `pos`; the tail becomes a new paragraph with the same direction
    pub fn split_off(&mut self, pos: usize) -> Paragraph {
        let pos = pos.min(self.elements.len());
        Paragraph {
            elements: self.elements.split_off(pos),
            rtl: self.rtl,
        }
    }

    pub fn append(&mut self, other: Paragraph) {
        self.elements.extend(other.elements);
    }

    /// Insets of the paragraph with their offsets
    pub fn insets(&self) -> impl Iterator<Item = (usize, &MathAtom)> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_inset().map(|a| (i, a)))
    }

    pub fn insets_mut(&mut self) -> impl Iterator<Item = (usize, &mut MathAtom)> {
        self.elements
            .iter_mut()
            .enumerate()
            .filter_map(|(i, e)| e.as_inset_mut().map(|a| (i, a)))
    }

    /// Serialize as LaTeX; characters are written literally
    pub fn write(&self, ws: &mut WriteStream) {
        for element in &self.elements {
            match element {
                ParElement::Char(c) => ws.ch(*c),
                ParElement::Inset(atom) => atom.inset().write(ws),
            }
        }
    }

    pub fn to_latex(&self) -> String {
        let mut ws = WriteStream::new();
        self.write(&mut ws);
        ws.finish()
    }
}

/// Whether an inset is a macro template
pub fn is_template(atom: &MathAtom) -> bool {
    matches!(atom.inset(), InsetMath::MacroTemplate(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use math::{HullInset, HullType, MathData};

    fn formula() -> MathAtom {
        MathAtom::new(InsetMath::Hull(HullInset::with_content(
            HullType::Simple,
            MathData::from_chars("x"),
        )))
    }

    #[test]
    fn test_text_uses_placeholder() {
        let mut par = Paragraph::from_text("ab");
        par.insert_inset(1, formula());
        assert_eq!(par.len(), 3);
        assert_eq!(par.text(), "a\u{FFFC}b");
        assert!(par.inset(1).is_some());
        assert!(par.inset(0).is_none());
    }

    #[test]
    fn test_split_and_append() {
        let mut par = Paragraph::from_text("hello");
        let tail = par.split_off(2);
        assert_eq!(par.text(), "he");
        assert_eq!(tail.text(), "llo");
        par.append(tail);
        assert_eq!(par.text(), "hello");
    }

    #[test]
    fn test_write_formula() {
        let mut par = Paragraph::from_text("a ");
        par.insert_inset(2, formula());
        assert_eq!(par.to_latex(), "a $x$");
    }

    #[test]
    fn test_position_of_inset() {
        let mut par = Paragraph::from_text("abc");
        let atom = formula();
        let id = atom.id();
        par.insert_inset(2, atom);
        assert_eq!(par.position_of(id), Some(2));
        assert_eq!(par.erase_range(0, 10).len(), 4);
        assert!(par.is_empty());
    }
}
