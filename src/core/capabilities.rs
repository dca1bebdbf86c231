//! core::capabilities
//!
//! Optional relationship capabilities and the traits that expose them.
//!
//! # Architecture
//!
//! Every entity may hold a parent, hold children, both, or neither, and each
//! side may be keyed or unkeyed. These are independent: an entity that only
//! holds a keyed parent is as valid a participant as a fully bidirectional
//! one. The engine reads an entity's capabilities to decide whether (and
//! how) it can reciprocate, and never fails because the other side lacks
//! one.
//!
//! The traits below are the contract an entity handle offers:
//!
//! - [`HasParent`] - get/attach/detach a single parent
//! - [`HasKeyedParent`] - the same with a key naming the parent
//! - [`HasChildren`] - get/attach/detach children by identity
//! - [`HasKeyedChildren`] - get/attach/detach/rename children by key
//!
//! Lifecycle hooks live in [`RelationHooks`](super::hooks::RelationHooks).
//!
//! # Example
//!
//! ```
//! use reciprocal::core::capabilities::{Capability, CapabilitySet};
//!
//! let caps = CapabilitySet::with([Capability::KeyedParent, Capability::Children]);
//!
//! assert!(caps.holds_parent());
//! assert!(caps.holds_children());
//! assert!(!caps.has(&Capability::Parent));
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::types::{EntityId, RelationError, Transition};

/// One optional relationship capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Holds at most one parent, identified by handle.
    Parent,

    /// Holds at most one parent, identified by handle and a key.
    KeyedParent,

    /// Holds a set of children identified by handle.
    Children,

    /// Holds a map of children identified by key.
    KeyedChildren,
}

impl Capability {
    /// Get a human-readable description of the capability.
    ///
    /// # Example
    ///
    /// ```
    /// use reciprocal::core::capabilities::Capability;
    ///
    /// assert_eq!(Capability::KeyedParent.description(), "keyed parent");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Capability::Parent => "parent",
            Capability::KeyedParent => "keyed parent",
            Capability::Children => "children",
            Capability::KeyedChildren => "keyed children",
        }
    }

    /// Whether this capability lives on the parent side of an entity.
    pub fn is_parent_side(&self) -> bool {
        matches!(self, Capability::Parent | Capability::KeyedParent)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The capabilities of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    capabilities: HashSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a capability set with the given capabilities.
    pub fn with<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }

    /// Insert a capability into the set.
    pub fn insert(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    /// Check if a capability is present.
    pub fn has(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Whether either parent capability is present.
    pub fn holds_parent(&self) -> bool {
        self.has(&Capability::Parent) || self.has(&Capability::KeyedParent)
    }

    /// Whether either children capability is present.
    pub fn holds_children(&self) -> bool {
        self.has(&Capability::Children) || self.has(&Capability::KeyedChildren)
    }

    /// Number of capabilities in the set.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether the entity takes no part in any relationship.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// Holds a single parent identified by handle.
///
/// Attaching replaces: the current parent is detached first, and if that
/// detach is vetoed the attach returns [`Transition::Blocked`] without
/// changing anything.
pub trait HasParent {
    /// The attached parent, if any.
    fn parent(&self) -> Option<EntityId>;

    /// Whether a parent is attached.
    fn is_parent_attached(&self) -> bool {
        self.parent().is_some()
    }

    /// Attach `parent`, reciprocating when the parent holds unkeyed children.
    fn attach_parent(&mut self, parent: EntityId) -> Result<Transition, RelationError>;

    /// Detach the current parent, reciprocating when able.
    fn detach_parent(&mut self) -> Result<Transition, RelationError>;
}

/// Holds a single parent identified by handle and key.
///
/// The key names the parent from this entity's point of view. The
/// `custom_child_key` arguments name this entity from the parent's point of
/// view when the two sides use different namespaces.
pub trait HasKeyedParent<K> {
    /// The attached parent, if any.
    fn keyed_parent(&self) -> Option<EntityId>;

    /// The key of the attached parent, if any.
    fn parent_key(&self) -> Option<&K>;

    /// Attach `parent` under `key`.
    fn attach_keyed_parent(
        &mut self,
        key: K,
        parent: EntityId,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError>;

    /// Detach the current parent, asking the parent to drop the child
    /// stored under `custom_child_key` (or under the parent key when `None`).
    fn detach_keyed_parent(
        &mut self,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError>;
}

/// Holds a set of children identified by handle.
pub trait HasChildren {
    /// Handles of all attached children, in ascending order.
    fn children(&self) -> Vec<EntityId>;

    /// Whether `child` is attached.
    fn is_child_attached(&self, child: EntityId) -> bool {
        self.children().contains(&child)
    }

    /// Attach `child`.
    fn attach_child(&mut self, child: EntityId) -> Result<Transition, RelationError>;

    /// Attach every child in order. Returns how many were applied.
    ///
    /// An invalid handle anywhere in `children` fails the whole call before
    /// any child is attached.
    fn attach_children<I>(&mut self, children: I) -> Result<usize, RelationError>
    where
        I: IntoIterator<Item = EntityId>;

    /// Detach `child`.
    fn detach_child(&mut self, child: EntityId) -> Result<Transition, RelationError>;

    /// Detach every child one at a time. Returns how many were applied.
    fn detach_children(&mut self) -> Result<usize, RelationError>;
}

/// Holds a map of children identified by key.
pub trait HasKeyedChildren<K> {
    /// The child stored under `key`.
    fn child(&self, key: &K) -> Option<EntityId>;

    /// All keys currently in use.
    fn child_keys(&self) -> Vec<K>;

    /// Whether `key` is in use.
    fn is_child_key_attached(&self, key: &K) -> bool {
        self.child(key).is_some()
    }

    /// Attach `child` under `key`. `custom_parent_key` names this entity
    /// from the child's point of view.
    fn attach_keyed_child(
        &mut self,
        key: K,
        child: EntityId,
        custom_parent_key: Option<K>,
    ) -> Result<Transition, RelationError>;

    /// Detach the child stored under `key`.
    fn detach_keyed_child(&mut self, key: &K) -> Result<Transition, RelationError>;

    /// Move the child stored under `old` to `new`.
    fn rename_child(&mut self, old: &K, new: K, use_hooks: bool)
        -> Result<Transition, RelationError>;
}
