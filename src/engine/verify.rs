//! engine::verify
//!
//! Symmetry verification of a forest.
//!
//! Reciprocation is best-effort, so a forest can legitimately drift out of
//! symmetry (a veto on one side, a key mismatch on a custom-keyed detach).
//! [`verify`] reports every such asymmetry so callers and tests can assert
//! on it.
//!
//! # Checks
//!
//! - Every child pointing at a parent that holds children is listed by that
//!   parent
//! - Every child listed by a parent, and able to hold a parent, points back
//!   at that parent
//! - No relation refers to a handle that is no longer in the forest
//!
//! Counterparts that lack the matching capability are not asymmetric: there
//! is nothing for them to point back with. A keyed counterpart of an
//! unkeyed side does hold the capability, so drift there is reported; the
//! protocol logs it as [`FailureCause::KeyRequired`](super::FailureCause).
//!
//! # Invariants
//!
//! - Never mutates the forest
//! - Must be deterministic

use thiserror::Error;

use super::Forest;
use crate::core::types::{EntityId, RelationKey};

/// An asymmetry found by verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("{child} names {parent} as parent but is not among its children")]
    MissingChildEntry { child: EntityId, parent: EntityId },

    #[error("{parent} lists {child} as child but {child} does not name it as parent")]
    MissingParentEntry { parent: EntityId, child: EntityId },

    #[error("{child} names removed entity {parent} as parent")]
    DanglingParent { child: EntityId, parent: EntityId },

    #[error("{parent} lists removed entity {child} as child")]
    DanglingChild { parent: EntityId, child: EntityId },
}

/// Result of verification.
#[derive(Debug)]
pub struct VerifyResult {
    /// Whether verification passed
    pub ok: bool,
    /// Errors found during verification
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: vec![],
        }
    }

    /// Create a failed result with errors.
    pub fn failure(errors: Vec<VerifyError>) -> Self {
        Self { ok: false, errors }
    }
}

/// Check that every relation in `forest` is mirrored on both sides.
pub fn verify<K: RelationKey>(forest: &Forest<K>) -> VerifyResult {
    let mut errors = Vec::new();

    for id in forest.ids() {
        if let Some(parent) = forest.parent(id) {
            if !forest.contains(parent) {
                errors.push(VerifyError::DanglingParent { child: id, parent });
            } else if holds_children(forest, parent) && !forest.is_child_attached(parent, id) {
                errors.push(VerifyError::MissingChildEntry { child: id, parent });
            }
        }

        for child in forest.children(id) {
            if !forest.contains(child) {
                errors.push(VerifyError::DanglingChild { parent: id, child });
            } else if holds_parent(forest, child) && forest.parent(child) != Some(id) {
                errors.push(VerifyError::MissingParentEntry { parent: id, child });
            }
        }
    }

    if errors.is_empty() {
        VerifyResult::success()
    } else {
        VerifyResult::failure(errors)
    }
}

fn holds_children<K>(forest: &Forest<K>, id: EntityId) -> bool {
    forest
        .capabilities(id)
        .map_or(false, |caps| caps.holds_children())
}

fn holds_parent<K>(forest: &Forest<K>, id: EntityId) -> bool {
    forest
        .capabilities(id)
        .map_or(false, |caps| caps.holds_parent())
}
