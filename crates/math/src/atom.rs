//! Math atoms: owning handles to exactly one node of the tree

use crate::inset::InsetMath;
use crate::metrics::Dimension;
use crate::stream::WriteStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of one math node
///
/// Cursor slices and argument proxies refer to their owner by this id, never
/// by ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomId(Uuid);

impl AtomId {
    /// Create a new random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AtomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exclusive handle to one math node
///
/// `Clone` is a deep copy that keeps node identities, which is what undo
/// snapshots and rollback copies need. Content copied to a new place in the
/// tree goes through [`MathAtom::fresh_copy`], which re-identifies every node.
#[derive(Debug, Clone)]
pub struct MathAtom {
    id: AtomId,
    inset: Box<InsetMath>,
    dim: Dimension,
}

impl MathAtom {
    pub fn new(inset: InsetMath) -> Self {
        Self {
            id: AtomId::new(),
            inset: Box::new(inset),
            dim: Dimension::default(),
        }
    }

    pub fn id(&self) -> AtomId {
        self.id
    }

    pub fn inset(&self) -> &InsetMath {
        &self.inset
    }

    pub fn inset_mut(&mut self) -> &mut InsetMath {
        &mut self.inset
    }

    /// Replace the node, keeping the identity of the handle
    pub fn set_inset(&mut self, inset: InsetMath) {
        *self.inset = inset;
    }

    pub fn into_inset(self) -> InsetMath {
        *self.inset
    }

    /// Dimension cached by the last metrics pass
    pub fn dim(&self) -> Dimension {
        self.dim
    }

    pub fn set_dim(&mut self, dim: Dimension) {
        self.dim = dim;
    }

    /// Deep copy with new identities for every node in the subtree
    pub fn fresh_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.reidentify();
        copy
    }

    fn reidentify(&mut self) {
        self.id = AtomId::new();
        for idx in 0..self.inset.nargs() {
            if let Some(cell) = self.inset.cell_mut(idx) {
                for atom in cell.iter_mut() {
                    atom.reidentify();
                }
            }
        }
    }

    /// LaTeX rendering of this atom alone
    pub fn to_latex(&self) -> String {
        let mut ws = WriteStream::new();
        self.inset.write(&mut ws);
        ws.finish()
    }

    /// Single character payload, if this is a character atom
    pub fn as_char(&self) -> Option<char> {
        match self.inset() {
            InsetMath::Char(c) => Some(c.ch),
            _ => None,
        }
    }

    /// Whether this atom is a relation (`=`, `<`, `\leq`, ...)
    pub fn is_relation(&self) -> bool {
        self.inset.is_relation()
    }
}

impl PartialEq for MathAtom {
    fn eq(&self, other: &Self) -> bool {
        self.inset == other.inset
    }
}

impl From<InsetMath> for MathAtom {
    fn from(inset: InsetMath) -> Self {
        Self::new(inset)
    }
}
