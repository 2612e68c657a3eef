//! One level of a document position

use math::AtomId;
use serde::{Deserialize, Serialize};

/// What a slice's container is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceOwner {
    /// The document's paragraph list
    Text,
    /// A math node, named by the id of its atom
    Math(AtomId),
}

/// One `(owner, cell, offset)` step of a [`crate::DocIterator`]
///
/// At the text level `idx` is the paragraph and `pos` the element offset.
/// Inside math `idx` is the cell of the owning node and `pos` the atom
/// offset in that cell. A slice that has a child slice has its `pos` on the
/// inset the child lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSlice {
    pub owner: SliceOwner,
    pub idx: usize,
    pub pos: usize,
    /// Caret drawn at the end of the previous row or run rather than the
    /// start of this one
    pub boundary: bool,
}

impl CursorSlice {
    /// A slice at the start of paragraph `pit`
    pub fn text(pit: usize, pos: usize) -> Self {
        Self {
            owner: SliceOwner::Text,
            idx: pit,
            pos,
            boundary: false,
        }
    }

    /// A slice at the start of cell `idx` of math node `owner`
    pub fn math(owner: AtomId, idx: usize, pos: usize) -> Self {
        Self {
            owner: SliceOwner::Math(owner),
            idx,
            pos,
            boundary: false,
        }
    }

    pub fn is_math(&self) -> bool {
        matches!(self.owner, SliceOwner::Math(_))
    }

    /// Id of the owning math node
    pub fn owner_id(&self) -> Option<AtomId> {
        match self.owner {
            SliceOwner::Math(id) => Some(id),
            SliceOwner::Text => None,
        }
    }

    /// Key used for ordering positions
    pub(crate) fn key(&self) -> (usize, usize, bool) {
        (self.idx, self.pos, self.boundary)
    }
}
