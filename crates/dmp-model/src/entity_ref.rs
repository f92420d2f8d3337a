//! References between entities of one aggregate
//!
//! A resolution pass links entities before any of them are committed, so a
//! reference points either at a stored row or at a slot in the pass's
//! staging area.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Slot of a staged entity within one resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StagedKey(pub usize);

impl StagedKey {
    /// Slot index
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StagedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "staged#{}", self.0)
    }
}

/// Reference to another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef<I> {
    /// Persisted row
    Stored(I),
    /// Entity staged in the current resolution pass
    Staged(StagedKey),
}

impl<I: Copy> EntityRef<I> {
    /// Stored id, if this reference points at a persisted row
    #[inline]
    #[must_use]
    pub fn stored(&self) -> Option<I> {
        match self {
            Self::Stored(id) => Some(*id),
            Self::Staged(_) => None,
        }
    }

    /// Staging slot, if this reference points into the current pass
    #[inline]
    #[must_use]
    pub fn staged(&self) -> Option<StagedKey> {
        match self {
            Self::Stored(_) => None,
            Self::Staged(key) => Some(*key),
        }
    }

    /// Rewrite a staged reference into a stored one
    ///
    /// `resolve` maps a staging slot to the id assigned at commit time.
    #[must_use]
    pub fn settle(self, resolve: impl Fn(StagedKey) -> Option<I>) -> Option<I> {
        match self {
            Self::Stored(id) => Some(id),
            Self::Staged(key) => resolve(key),
        }
    }
}
