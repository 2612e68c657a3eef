//! Visual order of a paragraph for left/right caret movement
//!
//! The caret sits in one of the `n + 1` gaps between the visual slots of a
//! line of `n` characters. Character `c` at visual slot `v` has a leading
//! edge (where the caret is drawn when the position is just before `c`) and a
//! trailing edge (just after `c`):
//!
//! | direction of `c` | leading | trailing |
//! |---|---|---|
//! | left-to-right | `v` | `v + 1` |
//! | right-to-left | `v + 1` | `v` |
//!
//! A position `(pos, boundary)` is drawn at the leading edge of `pos`, except
//! at the end of the line and when `boundary` is set, where it is drawn at
//! the trailing edge of `pos - 1`. Moving right or left targets the next gap
//! and picks the position drawn there, preferring the one adjacent to the
//! character just crossed.

use crate::paragraph::Paragraph;
use unicode_bidi::{BidiInfo, Level};

/// Result of one visual step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualStep {
    pub pos: usize,
    pub boundary: bool,
    /// Logical index of the character the caret moved over
    pub crossed: usize,
}

/// Visual ordering of one line
#[derive(Debug, Clone)]
pub struct VisualLine {
    /// Visual slot of each logical character
    visual_of: Vec<usize>,
    /// Logical character at each visual slot
    logical_at: Vec<usize>,
    rtl: Vec<bool>,
}

impl VisualLine {
    pub fn new(text: &str, base_rtl: bool) -> Self {
        if text.is_empty() {
            return Self {
                visual_of: Vec::new(),
                logical_at: Vec::new(),
                rtl: Vec::new(),
            };
        }
        let base = if base_rtl { Level::rtl() } else { Level::ltr() };
        let info = BidiInfo::new(text, Some(base));
        let mut levels = Vec::new();
        for para in &info.paragraphs {
            let line = para.range.clone();
            let reordered = info.reordered_levels(para, line.clone());
            levels.extend(
                text[line.clone()]
                    .char_indices()
                    .map(|(i, _)| reordered[line.start + i]),
            );
        }
        let logical_at = BidiInfo::reorder_visual(&levels);
        let mut visual_of = vec![0; logical_at.len()];
        for (v, &c) in logical_at.iter().enumerate() {
            visual_of[c] = v;
        }
        Self {
            visual_of,
            logical_at,
            rtl: levels.iter().map(|l| l.is_rtl()).collect(),
        }
    }

    /// Visual line of a paragraph; insets count as neutral characters
    pub fn from_paragraph(par: &Paragraph, base_rtl: bool) -> Self {
        Self::new(&par.text(), base_rtl)
    }

    /// Number of characters
    pub fn len(&self) -> usize {
        self.visual_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visual_of.is_empty()
    }

    pub fn is_rtl_at(&self, c: usize) -> bool {
        self.rtl.get(c).copied().unwrap_or(false)
    }

    pub fn visual_index(&self, c: usize) -> Option<usize> {
        self.visual_of.get(c).copied()
    }

    fn leading(&self, c: usize) -> usize {
        let v = self.visual_of[c];
        if self.rtl[c] {
            v + 1
        } else {
            v
        }
    }

    fn trailing(&self, c: usize) -> usize {
        let v = self.visual_of[c];
        if self.rtl[c] {
            v
        } else {
            v + 1
        }
    }

    /// Gap in which the caret for `(pos, boundary)` is drawn
    pub fn caret_gap(&self, pos: usize, boundary: bool) -> usize {
        let n = self.len();
        if n == 0 {
            return 0;
        }
        let pos = pos.min(n);
        if pos == n || (boundary && pos > 0) {
            self.trailing(pos - 1)
        } else {
            self.leading(pos)
        }
    }

    /// Position one gap to the right of `(pos, boundary)`
    pub fn step_right(&self, pos: usize, boundary: bool) -> Option<VisualStep> {
        let gap = self.caret_gap(pos, boundary);
        if gap >= self.len() {
            return None;
        }
        self.position_at_gap(gap + 1, self.logical_at[gap])
    }

    /// Position one gap to the left of `(pos, boundary)`
    pub fn step_left(&self, pos: usize, boundary: bool) -> Option<VisualStep> {
        let gap = self.caret_gap(pos, boundary);
        if gap == 0 || self.is_empty() {
            return None;
        }
        self.position_at_gap(gap - 1, self.logical_at[gap - 1])
    }

    /// The position drawn in `gap`, preferring one next to character `crossed`
    pub fn position_at_gap(&self, gap: usize, crossed: usize) -> Option<VisualStep> {
        let n = self.len();
        let mut candidates: Vec<(usize, bool, usize)> = Vec::new();
        for c in 0..n {
            if self.leading(c) == gap {
                candidates.push((c, false, c));
            }
            if self.trailing(c) == gap {
                let pos = c + 1;
                // boundary only matters where it moves the caret
                let boundary = pos < n && self.caret_gap(pos, false) != gap;
                candidates.push((pos, boundary, c));
            }
        }
        candidates
            .iter()
            .min_by_key(|(_, boundary, c)| (*c != crossed, *boundary))
            .map(|&(pos, boundary, _)| VisualStep {
                pos,
                boundary,
                crossed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALEF: char = '\u{05D0}';
    const BET: char = '\u{05D1}';

    fn walk_right(line: &VisualLine, mut pos: usize, mut boundary: bool) -> Vec<(usize, bool)> {
        let mut out = Vec::new();
        while let Some(step) = line.step_right(pos, boundary) {
            pos = step.pos;
            boundary = step.boundary;
            out.push((pos, boundary));
        }
        out
    }

    #[test]
    fn test_ltr_moves_logically() {
        let line = VisualLine::new("abc", false);
        assert_eq!(
            walk_right(&line, 0, false),
            vec![(1, false), (2, false), (3, false)]
        );
        assert_eq!(line.step_left(0, false), None);
        assert_eq!(line.step_left(3, false).map(|s| s.pos), Some(2));
    }

    #[test]
    fn test_rtl_paragraph_is_mirrored() {
        let text: String = [ALEF, BET, ALEF].iter().collect();
        let line = VisualLine::new(&text, true);
        // logical start is drawn at the right edge
        assert_eq!(line.caret_gap(0, false), 3);
        assert_eq!(line.step_right(0, false), None);
        let step = line.step_left(0, false).unwrap();
        assert_eq!((step.pos, step.boundary, step.crossed), (1, false, 0));
        assert_eq!(line.caret_gap(3, false), 0);
        assert_eq!(line.step_right(3, false).map(|s| s.pos), Some(2));
    }

    #[test]
    fn test_mixed_line_visits_every_gap() {
        // visual order: a b BET ALEF
        let text: String = ['a', 'b', ALEF, BET].iter().collect();
        let line = VisualLine::new(&text, false);
        assert_eq!(line.visual_index(2), Some(3));
        assert_eq!(line.visual_index(3), Some(2));

        let path = walk_right(&line, 0, false);
        assert_eq!(path, vec![(1, false), (2, true), (3, false), (2, false)]);
        let gaps: Vec<usize> = path.iter().map(|&(p, b)| line.caret_gap(p, b)).collect();
        assert_eq!(gaps, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_left_retraces_right() {
        let text: String = ['a', ALEF, BET, 'b'].iter().collect();
        let line = VisualLine::new(&text, false);
        let mut pos = (0, false);
        let mut forward = vec![pos];
        while let Some(s) = line.step_right(pos.0, pos.1) {
            pos = (s.pos, s.boundary);
            forward.push(pos);
        }
        let mut back = vec![pos];
        while let Some(s) = line.step_left(pos.0, pos.1) {
            pos = (s.pos, s.boundary);
            back.push(pos);
        }
        let gaps = |v: &[(usize, bool)]| v.iter().map(|&(p, b)| line.caret_gap(p, b)).collect::<Vec<_>>();
        let mut back_gaps = gaps(&back);
        back_gaps.reverse();
        assert_eq!(gaps(&forward), back_gaps);
        assert_eq!(gaps(&forward), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_position_beside_a_character() {
        // visual order: a b BET ALEF
        let text: String = ['a', 'b', ALEF, BET].iter().collect();
        let line = VisualLine::new(&text, false);
        // screen-right of ALEF is the end of the line
        let right = line.position_at_gap(4, 2).unwrap();
        assert_eq!((right.pos, right.boundary), (2, false));
        // screen-left of ALEF is the gap before it, after BET
        let left = line.position_at_gap(3, 2).unwrap();
        assert_eq!((left.pos, left.boundary), (3, false));
    }

    #[test]
    fn test_empty_line() {
        let line = VisualLine::new("", false);
        assert!(line.is_empty());
        assert_eq!(line.step_right(0, false), None);
        assert_eq!(line.step_left(0, false), None);
    }
}
