//! core::hooks
//!
//! Lifecycle hooks fired after a relationship changes.
//!
//! # Ordering
//!
//! A hook fires strictly after the structural change it describes (the
//! parent slot or child collection update) and after the reciprocal call to
//! the other side has been attempted. Idempotent no-ops, vetoed transitions
//! and blocked replacements fire nothing.
//!
//! Unkeyed relations pass `None` as the key. Keyed relations pass the key
//! under which the relation is stored on the entity firing the hook.
//!
//! # Example
//!
//! ```
//! use reciprocal::core::hooks::RelationHooks;
//! use reciprocal::core::types::EntityId;
//!
//! #[derive(Default)]
//! struct Counter {
//!     attached: usize,
//! }
//!
//! impl RelationHooks<String> for Counter {
//!     fn on_child_attach(&mut self, _key: Option<&String>, _child: EntityId) {
//!         self.attached += 1;
//!     }
//! }
//! ```

use super::types::EntityId;

/// Observer of one entity's relationship transitions.
///
/// Every method defaults to a no-op. Hooks observe; they cannot veto. Use
/// a [`CheckChain`](super::checks::CheckChain) to reject transitions.
pub trait RelationHooks<K> {
    /// A parent was attached (or replaced).
    fn on_parent_attach(&mut self, _key: Option<&K>, _parent: EntityId) {}

    /// The parent was detached.
    fn on_parent_detach(&mut self, _key: Option<&K>, _parent: EntityId) {}

    /// A child was attached.
    fn on_child_attach(&mut self, _key: Option<&K>, _child: EntityId) {}

    /// A child was detached.
    fn on_child_detach(&mut self, _key: Option<&K>, _child: EntityId) {}
}

/// Hooks that ignore every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<K> RelationHooks<K> for NoHooks {}
