//! engine::entity
//!
//! Entity records stored in a forest and the builder used to create them.
//!
//! # Roles
//!
//! Each entity has a parent role and a child role, each one of absent,
//! unkeyed or keyed. The role decides which capability the entity offers
//! and therefore how the other side of a relationship reciprocates. Roles
//! are fixed when the entity is inserted.
//!
//! A side may additionally be *checked*: it owns a
//! [`CheckChain`] consulted before every attach or detach on that side.
//!
//! # Example
//!
//! ```
//! use reciprocal::core::types::Action;
//! use reciprocal::engine::{EntitySpec, Forest, SlotKind};
//!
//! let mut forest: Forest = Forest::new();
//!
//! // A folder-like entity: keyed on both sides, refusing new children
//! // whose key is already taken.
//! let folder = forest.insert(
//!     EntitySpec::keyed_bidirectional().child_check(|p| {
//!         p.action == Action::Detach
//!             || p.key.map_or(true, |k| !p.forest.is_child_key_attached(p.subject, k))
//!     }),
//! );
//!
//! // A file-like entity: only holds a keyed parent.
//! let file = forest.insert(EntitySpec::new().with_parent(SlotKind::Keyed));
//!
//! assert!(forest.capabilities(folder).unwrap().holds_children());
//! assert!(!forest.capabilities(file).unwrap().holds_children());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::core::capabilities::{Capability, CapabilitySet};
use crate::core::checks::{CheckChain, Proposal};
use crate::core::hooks::{NoHooks, RelationHooks};
use crate::core::types::EntityId;

/// How one side of an entity identifies its relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Relations are identified by entity handle alone.
    Unkeyed,
    /// Relations are identified by an explicit key.
    Keyed,
}

/// Blueprint for a new entity.
pub struct EntitySpec<K> {
    parent: Option<SlotKind>,
    children: Option<SlotKind>,
    parent_checks: Option<CheckChain<K>>,
    child_checks: Option<CheckChain<K>>,
    hooks: Box<dyn RelationHooks<K>>,
}

impl<K> Default for EntitySpec<K> {
    fn default() -> Self {
        Self {
            parent: None,
            children: None,
            parent_checks: None,
            child_checks: None,
            hooks: Box::new(NoHooks),
        }
    }
}

impl<K> EntitySpec<K> {
    /// An entity with no relationship capability at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unkeyed parent and unkeyed children.
    pub fn bidirectional() -> Self {
        Self::new()
            .with_parent(SlotKind::Unkeyed)
            .with_children(SlotKind::Unkeyed)
    }

    /// Keyed parent and keyed children.
    pub fn keyed_bidirectional() -> Self {
        Self::new()
            .with_parent(SlotKind::Keyed)
            .with_children(SlotKind::Keyed)
    }

    /// Give the entity a parent slot.
    pub fn with_parent(mut self, kind: SlotKind) -> Self {
        self.parent = Some(kind);
        self
    }

    /// Give the entity a child collection.
    pub fn with_children(mut self, kind: SlotKind) -> Self {
        self.children = Some(kind);
        self
    }

    /// Run veto checks before parent transitions (starts with an empty chain).
    pub fn checked_parent(mut self) -> Self {
        self.parent_checks.get_or_insert_with(CheckChain::new);
        self
    }

    /// Run veto checks before child transitions (starts with an empty chain).
    pub fn checked_children(mut self) -> Self {
        self.child_checks.get_or_insert_with(CheckChain::new);
        self
    }

    /// Add a veto check on parent transitions.
    pub fn parent_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Proposal<'_, K>) -> bool + 'static,
    {
        self.parent_checks
            .get_or_insert_with(CheckChain::new)
            .add(check);
        self
    }

    /// Add a veto check on child transitions.
    pub fn child_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Proposal<'_, K>) -> bool + 'static,
    {
        self.child_checks
            .get_or_insert_with(CheckChain::new)
            .add(check);
        self
    }

    /// Install lifecycle hooks.
    pub fn hooks<H>(mut self, hooks: H) -> Self
    where
        H: RelationHooks<K> + 'static,
    {
        self.hooks = Box::new(hooks);
        self
    }

    pub(crate) fn build(self) -> Entity<K> {
        Entity {
            parent: match self.parent {
                None => ParentSlot::Absent,
                Some(SlotKind::Unkeyed) => ParentSlot::Unkeyed(None),
                Some(SlotKind::Keyed) => ParentSlot::Keyed(None),
            },
            children: match self.children {
                None => ChildSlot::Absent,
                Some(SlotKind::Unkeyed) => ChildSlot::Unkeyed(BTreeSet::new()),
                Some(SlotKind::Keyed) => ChildSlot::Keyed(HashMap::new()),
            },
            parent_checks: self.parent_checks,
            child_checks: self.child_checks,
            hooks: self.hooks,
        }
    }
}

impl<K> fmt::Debug for EntitySpec<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySpec")
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("checked_parent", &self.parent_checks.is_some())
            .field("checked_children", &self.child_checks.is_some())
            .finish()
    }
}

/// The parent side of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParentSlot<K> {
    Absent,
    Unkeyed(Option<EntityId>),
    Keyed(Option<(K, EntityId)>),
}

impl<K> ParentSlot<K> {
    pub(crate) fn parent(&self) -> Option<EntityId> {
        match self {
            ParentSlot::Absent => None,
            ParentSlot::Unkeyed(parent) => *parent,
            ParentSlot::Keyed(slot) => slot.as_ref().map(|(_, parent)| *parent),
        }
    }

    pub(crate) fn key(&self) -> Option<&K> {
        match self {
            ParentSlot::Keyed(Some((key, _))) => Some(key),
            _ => None,
        }
    }

    pub(crate) fn capability(&self) -> Option<Capability> {
        match self {
            ParentSlot::Absent => None,
            ParentSlot::Unkeyed(_) => Some(Capability::Parent),
            ParentSlot::Keyed(_) => Some(Capability::KeyedParent),
        }
    }

    /// Drop the reference to `target` without any protocol.
    pub(crate) fn scrub(&mut self, target: EntityId) {
        if self.parent() == Some(target) {
            match self {
                ParentSlot::Unkeyed(parent) => *parent = None,
                ParentSlot::Keyed(slot) => *slot = None,
                ParentSlot::Absent => {}
            }
        }
    }
}

/// The child side of an entity.
#[derive(Debug, Clone)]
pub(crate) enum ChildSlot<K> {
    Absent,
    Unkeyed(BTreeSet<EntityId>),
    Keyed(HashMap<K, EntityId>),
}

impl<K> ChildSlot<K> {
    pub(crate) fn contains(&self, child: EntityId) -> bool {
        match self {
            ChildSlot::Absent => false,
            ChildSlot::Unkeyed(set) => set.contains(&child),
            ChildSlot::Keyed(map) => map.values().any(|c| *c == child),
        }
    }

    /// Children in ascending handle order, without duplicates.
    pub(crate) fn ids(&self) -> Vec<EntityId> {
        match self {
            ChildSlot::Absent => Vec::new(),
            ChildSlot::Unkeyed(set) => set.iter().copied().collect(),
            ChildSlot::Keyed(map) => {
                let unique: BTreeSet<EntityId> = map.values().copied().collect();
                unique.into_iter().collect()
            }
        }
    }

    pub(crate) fn capability(&self) -> Option<Capability> {
        match self {
            ChildSlot::Absent => None,
            ChildSlot::Unkeyed(_) => Some(Capability::Children),
            ChildSlot::Keyed(_) => Some(Capability::KeyedChildren),
        }
    }

    /// Drop every reference to `target` without any protocol.
    pub(crate) fn scrub(&mut self, target: EntityId) {
        match self {
            ChildSlot::Absent => {}
            ChildSlot::Unkeyed(set) => {
                set.remove(&target);
            }
            ChildSlot::Keyed(map) => map.retain(|_, child| *child != target),
        }
    }
}

/// An entity stored in a forest.
pub(crate) struct Entity<K> {
    pub(crate) parent: ParentSlot<K>,
    pub(crate) children: ChildSlot<K>,
    pub(crate) parent_checks: Option<CheckChain<K>>,
    pub(crate) child_checks: Option<CheckChain<K>>,
    pub(crate) hooks: Box<dyn RelationHooks<K>>,
}

impl<K> Entity<K> {
    pub(crate) fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::with(
            self.parent
                .capability()
                .into_iter()
                .chain(self.children.capability()),
        )
    }

    pub(crate) fn has(&self, capability: Capability) -> bool {
        self.parent.capability() == Some(capability)
            || self.children.capability() == Some(capability)
    }
}

impl<K: fmt::Debug> fmt::Debug for Entity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("parent_checks", &self.parent_checks)
            .field("child_checks", &self.child_checks)
            .finish_non_exhaustive()
    }
}
