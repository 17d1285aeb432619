//! Equation identity for the dependency graph.
//!
//! An `EquationId` uniquely identifies a cell for the lifetime of an engine.

use serde::{Deserialize, Serialize};

/// Unique identifier for an equation cell.
///
/// Assigned by the engine from a monotonic counter and never reused, so it is
/// safe to use as a graph node after the cell it named has been removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquationId(u64);

impl EquationId {
    /// Create an id from its raw value (used when loading records).
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// The id following this one.
    #[inline]
    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for EquationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
