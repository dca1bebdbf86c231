//! core::checks
//!
//! Veto checks evaluated before a relationship mutation.
//!
//! # Architecture
//!
//! A checked side of an entity owns a [`CheckChain`]: an ordered list of
//! predicates over a [`Proposal`]. Before an attach or detach is applied the
//! chain is run in registration order and the first rejection aborts the
//! whole operation before anything is mutated. An empty chain approves
//! everything.
//!
//! # Invariants
//!
//! - Checks run strictly in registration order and short-circuit
//! - Checks see a read-only view of the forest, so evaluating them cannot
//!   mutate the graph
//! - Managing the chain (add/remove/clear) has no other side effects
//!
//! # Example
//!
//! ```
//! use reciprocal::core::checks::CheckChain;
//! use reciprocal::core::types::Action;
//!
//! let mut chain: CheckChain<String> = CheckChain::new();
//! let id = chain.add(|proposal| proposal.action == Action::Attach);
//! assert_eq!(chain.len(), 1);
//!
//! assert!(chain.remove(id));
//! assert!(chain.is_empty());
//! ```

use std::fmt;

use super::types::{Action, EntityId};
use crate::engine::Forest;

/// A transition submitted to a veto check.
///
/// `subject` is the entity whose chain is running. `value` is the entity
/// about to be attached or detached (a parent for parent-side chains, a
/// child for child-side chains). For detaches, `key` and `value` are read
/// from the current state just before the checks run.
pub struct Proposal<'a, K> {
    /// Read-only view of the whole graph.
    pub forest: &'a Forest<K>,
    /// The entity owning the chain.
    pub subject: EntityId,
    /// Key of the relation, for keyed sides.
    pub key: Option<&'a K>,
    /// The parent or child the transition is about.
    pub value: EntityId,
    /// Whether the transition attaches or detaches.
    pub action: Action,
}

impl<K: fmt::Debug> fmt::Debug for Proposal<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proposal")
            .field("subject", &self.subject)
            .field("key", &self.key)
            .field("value", &self.value)
            .field("action", &self.action)
            .finish()
    }
}

/// A veto predicate. Returning `false` rejects the transition.
pub type Check<K> = Box<dyn Fn(&Proposal<'_, K>) -> bool>;

/// Handle to a registered check, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckId(u64);

/// Ordered list of veto predicates.
pub struct CheckChain<K> {
    checks: Vec<(CheckId, Check<K>)>,
    next_id: u64,
}

impl<K> Default for CheckChain<K> {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            next_id: 0,
        }
    }
}

impl<K> CheckChain<K> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a check. It runs after every check already registered.
    pub fn add<F>(&mut self, check: F) -> CheckId
    where
        F: Fn(&Proposal<'_, K>) -> bool + 'static,
    {
        self.push(Box::new(check))
    }

    /// Append an already boxed check.
    pub fn push(&mut self, check: Check<K>) -> CheckId {
        let id = CheckId(self.next_id);
        self.next_id += 1;
        self.checks.push((id, check));
        id
    }

    /// Remove the check registered as `id`. Returns whether it was present.
    pub fn remove(&mut self, id: CheckId) -> bool {
        let before = self.checks.len();
        self.checks.retain(|(existing, _)| *existing != id);
        self.checks.len() != before
    }

    /// Remove the check at `index` in registration order.
    pub fn remove_at(&mut self, index: usize) -> Option<CheckId> {
        if index < self.checks.len() {
            Some(self.checks.remove(index).0)
        } else {
            None
        }
    }

    /// Remove every check.
    pub fn clear(&mut self) {
        self.checks.clear();
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Handles of the registered checks, in registration order.
    pub fn ids(&self) -> Vec<CheckId> {
        self.checks.iter().map(|(id, _)| *id).collect()
    }

    /// Run every check in registration order.
    ///
    /// Returns `false` on the first rejection without evaluating the rest.
    pub fn run_checks(&self, proposal: &Proposal<'_, K>) -> bool {
        self.checks.iter().all(|(_, check)| check(proposal))
    }
}

impl<K> fmt::Debug for CheckChain<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckChain")
            .field("checks", &self.ids())
            .finish()
    }
}
