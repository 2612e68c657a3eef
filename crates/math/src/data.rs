//! MathData: the ordered atom sequence that makes up one cell

use crate::atom::{AtomId, MathAtom};
use crate::inset::InsetMath;
use crate::metrics::{CellGeometry, Color, Dimension, MetricsInfo, PainterInfo, Point, StyleContext};
use crate::stream::{NormalStream, WriteStream};
use std::ops::Range;

/// One cell of math content
#[derive(Debug, Clone, Default)]
pub struct MathData {
    atoms: Vec<MathAtom>,
    dim: Dimension,
}

impl PartialEq for MathData {
    fn eq(&self, other: &Self) -> bool {
        self.atoms == other.atoms
    }
}

impl MathData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_atoms(atoms: Vec<MathAtom>) -> Self {
        Self {
            atoms,
            dim: Dimension::default(),
        }
    }

    /// A cell holding exactly one atom
    pub fn single(atom: MathAtom) -> Self {
        Self::from_atoms(vec![atom])
    }

    /// A cell of character atoms
    pub fn from_chars(text: &str) -> Self {
        Self::from_atoms(text.chars().map(|c| MathAtom::new(InsetMath::char(c))).collect())
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&MathAtom> {
        self.atoms.get(pos)
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut MathAtom> {
        self.atoms.get_mut(pos)
    }

    pub fn first(&self) -> Option<&MathAtom> {
        self.atoms.first()
    }

    pub fn last(&self) -> Option<&MathAtom> {
        self.atoms.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut MathAtom> {
        self.atoms.last_mut()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MathAtom> {
        self.atoms.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, MathAtom> {
        self.atoms.iter_mut()
    }

    pub fn atoms(&self) -> &[MathAtom] {
        &self.atoms
    }

    /// Position of the atom with identity `id`
    pub fn position_of(&self, id: AtomId) -> Option<usize> {
        self.atoms.iter().position(|a| a.id() == id)
    }

    // =========================================================================
    // Sequence edits
    // =========================================================================

    pub fn push(&mut self, atom: MathAtom) {
        self.atoms.push(atom);
    }

    pub fn pop(&mut self) -> Option<MathAtom> {
        self.atoms.pop()
    }

    /// Insert `atom` before `pos`; positions past the end append
    pub fn insert(&mut self, pos: usize, atom: MathAtom) {
        debug_assert!(pos <= self.len(), "insert position {pos} out of range");
        let pos = pos.min(self.len());
        self.atoms.insert(pos, atom);
    }

    /// Insert all atoms of `other` before `pos`
    pub fn insert_data(&mut self, pos: usize, other: MathData) {
        debug_assert!(pos <= self.len(), "insert position {pos} out of range");
        let pos = pos.min(self.len());
        self.atoms.splice(pos..pos, other.atoms);
    }

    /// Append all atoms of `other`
    pub fn append(&mut self, other: MathData) {
        self.atoms.extend(other.atoms);
    }

    /// Remove and return the atom at `pos`
    pub fn erase(&mut self, pos: usize) -> Option<MathAtom> {
        debug_assert!(pos < self.len(), "erase position {pos} out of range");
        if pos < self.len() {
            Some(self.atoms.remove(pos))
        } else {
            None
        }
    }

    /// Remove the half-open range `from..to`, clamped to the sequence
    pub fn erase_range(&mut self, from: usize, to: usize) -> MathData {
        let to = to.min(self.len());
        let from = from.min(to);
        MathData::from_atoms(self.atoms.drain(from..to).collect())
    }

    /// Split off everything from `pos` on
    pub fn split_off(&mut self, pos: usize) -> MathData {
        let pos = pos.min(self.len());
        MathData::from_atoms(self.atoms.split_off(pos))
    }

    /// Copy of the range `from..to` with fresh identities
    pub fn copy_range(&self, range: Range<usize>) -> MathData {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        MathData::from_atoms(self.atoms[start..end].iter().map(MathAtom::fresh_copy).collect())
    }

    /// Deep copy with fresh identities
    pub fn fresh_copy(&self) -> MathData {
        self.copy_range(0..self.len())
    }

    pub fn clear(&mut self) {
        self.atoms.clear();
    }

    pub fn take(&mut self) -> MathData {
        std::mem::take(self)
    }

    pub fn into_atoms(self) -> Vec<MathAtom> {
        self.atoms
    }

    // =========================================================================
    // Textual search
    // =========================================================================

    /// First position where `needle` occurs, comparing atoms by their LaTeX
    pub fn find(&self, needle: &MathData) -> Option<usize> {
        self.find_positions(needle).next()
    }

    /// Last position where `needle` occurs
    pub fn find_last(&self, needle: &MathData) -> Option<usize> {
        self.find_positions(needle).last()
    }

    fn find_positions<'s>(&'s self, needle: &MathData) -> impl Iterator<Item = usize> + 's {
        let hay: Vec<String> = self.atoms.iter().map(MathAtom::to_latex).collect();
        let pat: Vec<String> = needle.atoms.iter().map(MathAtom::to_latex).collect();
        let n = pat.len();
        let last = if n == 0 || n > hay.len() { 0 } else { hay.len() - n + 1 };
        (0..last).filter(move |&i| hay[i..i + n] == pat[..])
    }

    /// Position of the first relation atom
    pub fn first_relation(&self) -> Option<usize> {
        self.atoms.iter().position(MathAtom::is_relation)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn write(&self, ws: &mut WriteStream) {
        for atom in &self.atoms {
            atom.inset().write(ws);
        }
    }

    pub fn normalize(&self, ns: &mut NormalStream) {
        ns.open("par");
        for atom in &self.atoms {
            atom.inset().normalize(ns);
        }
        ns.close();
    }

    /// LaTeX rendering of the whole cell
    pub fn to_latex(&self) -> String {
        let mut ws = WriteStream::new();
        self.write(&mut ws);
        ws.finish()
    }

    /// Debug-canonical rendering of the whole cell
    pub fn to_normal(&self) -> String {
        let mut ns = NormalStream::new();
        self.normalize(&mut ns);
        ns.finish()
    }

    // =========================================================================
    // Metrics and drawing
    // =========================================================================

    /// Aggregate dimension cached by the last metrics pass
    pub fn dim(&self) -> Dimension {
        self.dim
    }

    /// Recompute and cache the size of every atom and of the cell
    pub fn metrics(&mut self, mi: &MetricsInfo<'_>) -> Dimension {
        if self.atoms.is_empty() {
            let em = mi.em();
            self.dim = Dimension::new(0.5 * em, 0.7 * em, 0.1 * em);
            return self.dim;
        }
        let mut total = Dimension::default();
        for atom in &mut self.atoms {
            let dim = atom.inset_mut().metrics(mi);
            atom.set_dim(dim);
            total.add_horizontal(&dim);
        }
        self.dim = total;
        total
    }

    /// x offset of cursor position `pos` from the cell origin
    pub fn pos2x(&self, pos: usize) -> f32 {
        self.atoms.iter().take(pos).map(|a| a.dim().wid).sum()
    }

    /// Cursor position closest to x offset `x`
    pub fn x2pos(&self, x: f32) -> usize {
        let mut acc = 0.0;
        for (i, atom) in self.atoms.iter().enumerate() {
            let w = atom.dim().wid;
            if x < acc + w / 2.0 {
                return i;
            }
            acc += w;
        }
        self.atoms.len()
    }

    fn stops(&self) -> Vec<f32> {
        let mut stops = Vec::with_capacity(self.atoms.len() + 1);
        let mut acc = 0.0;
        stops.push(acc);
        for atom in &self.atoms {
            acc += atom.dim().wid;
            stops.push(acc);
        }
        stops
    }

    /// Draw the cell with its baseline origin at `(x, y)`
    pub fn draw(&self, pi: &mut PainterInfo<'_>, sc: &StyleContext<'_>, x: f32, y: f32) {
        if self.atoms.is_empty() {
            let d = self.dim;
            pi.painter
                .rectangle(x, y - d.asc, d.wid, d.height(), Color::PLACEHOLDER);
            return;
        }
        let mut cx = x;
        for atom in &self.atoms {
            atom.inset().draw(pi, sc, atom.id(), atom.dim(), cx, y);
            pi.coords.record_inset(atom.id(), Point::new(cx, y), atom.dim());
            cx += atom.dim().wid;
        }
    }

    /// Draw the cell and record it as cell `idx` of `owner`
    pub fn draw_cell(
        &self,
        pi: &mut PainterInfo<'_>,
        sc: &StyleContext<'_>,
        owner: AtomId,
        idx: usize,
        x: f32,
        y: f32,
    ) {
        pi.coords.record_cell(
            owner,
            idx,
            CellGeometry {
                origin: Point::new(x, y),
                dim: self.dim,
                stops: self.stops(),
            },
        );
        self.draw(pi, sc, x, y);
    }
}

impl FromIterator<MathAtom> for MathData {
    fn from_iter<T: IntoIterator<Item = MathAtom>>(iter: T) -> Self {
        Self::from_atoms(iter.into_iter().collect())
    }
}

impl std::ops::Index<usize> for MathData {
    type Output = MathAtom;

    fn index(&self, pos: usize) -> &MathAtom {
        &self.atoms[pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{FixedFontMetrics, FontInfo};

    #[test]
    fn test_insert_and_erase() {
        let mut md = MathData::from_chars("ac");
        md.insert(1, MathAtom::new(InsetMath::char('b')));
        assert_eq!(md.to_latex(), "abc");
        let removed = md.erase(0).unwrap();
        assert_eq!(removed.as_char(), Some('a'));
        assert_eq!(md.to_latex(), "bc");
    }

    #[test]
    fn test_insert_data_and_append() {
        let mut md = MathData::from_chars("ad");
        md.insert_data(1, MathData::from_chars("bc"));
        md.append(MathData::from_chars("e"));
        assert_eq!(md.to_latex(), "abcde");
    }

    #[test]
    fn test_erase_range_clamps() {
        let mut md = MathData::from_chars("abcd");
        let cut = md.erase_range(2, 10);
        assert_eq!(cut.to_latex(), "cd");
        assert_eq!(md.to_latex(), "ab");
    }

    #[test]
    fn test_find_and_find_last() {
        let md = MathData::from_chars("abab");
        let needle = MathData::from_chars("ab");
        assert_eq!(md.find(&needle), Some(0));
        assert_eq!(md.find_last(&needle), Some(2));
        assert_eq!(md.find(&MathData::from_chars("ba")), Some(1));
        assert_eq!(md.find(&MathData::from_chars("x")), None);
        assert_eq!(md.find(&MathData::new()), None);
    }

    #[test]
    fn test_first_relation() {
        let md = MathData::from_chars("x+y=z");
        assert_eq!(md.first_relation(), Some(3));
        assert_eq!(MathData::from_chars("x+y").first_relation(), None);
    }

    #[test]
    fn test_fresh_copy_changes_ids() {
        let md = MathData::from_chars("xy");
        let copy = md.fresh_copy();
        assert_eq!(md, copy);
        assert_ne!(md[0].id(), copy[0].id());
        let clone = md.clone();
        assert_eq!(md[0].id(), clone[0].id());
    }

    #[test]
    fn test_empty_cell_has_placeholder_size() {
        let fm = FixedFontMetrics::default();
        let mi = MetricsInfo::new(&fm, FontInfo::default());
        let mut md = MathData::new();
        let dim = md.metrics(&mi);
        assert!(dim.wid > 0.0);
        assert!(dim.height() > 0.0);
    }

    #[test]
    fn test_pos2x_and_x2pos() {
        let fm = FixedFontMetrics::default();
        let mi = MetricsInfo::new(&fm, FontInfo::default());
        let mut md = MathData::from_chars("abc");
        md.metrics(&mi);
        let w = md[0].dim().wid;
        assert_eq!(md.pos2x(2), 2.0 * w);
        assert_eq!(md.x2pos(0.0), 0);
        assert_eq!(md.x2pos(w * 1.1), 1);
        assert_eq!(md.x2pos(100.0), 3);
    }
}
