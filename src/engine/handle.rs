//! engine::handle
//!
//! Entity handles that expose the capability traits.
//!
//! [`EntityMut`] borrows the forest mutably and implements
//! [`HasParent`], [`HasKeyedParent`], [`HasChildren`] and
//! [`HasKeyedChildren`], so code written against the traits can drive any
//! entity. Every method forwards to the matching [`Forest`] operation, which
//! means an entity that lacks a capability answers with
//! [`RelationError::MissingCapability`] rather than failing to compile.
//!
//! # Example
//!
//! ```
//! use reciprocal::core::capabilities::{HasChildren, HasParent};
//! use reciprocal::engine::{EntitySpec, Forest};
//!
//! let mut forest: Forest = Forest::new();
//! let root = forest.insert(EntitySpec::bidirectional());
//! let leaf = forest.insert(EntitySpec::bidirectional());
//!
//! forest.entity_mut(root).unwrap().attach_child(leaf).unwrap();
//! assert_eq!(forest.entity_mut(leaf).unwrap().parent(), Some(root));
//! ```

use crate::core::capabilities::{
    CapabilitySet, HasChildren, HasKeyedChildren, HasKeyedParent, HasParent,
};
use crate::core::types::{EntityId, RelationError, RelationKey, Transition};

use super::Forest;

/// Read-only view of one entity.
#[derive(Debug)]
pub struct EntityRef<'a, K> {
    forest: &'a Forest<K>,
    id: EntityId,
}

impl<'a, K: RelationKey> EntityRef<'a, K> {
    pub(crate) fn new(forest: &'a Forest<K>, id: EntityId) -> Self {
        Self { forest, id }
    }

    /// Handle of the entity.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Capabilities of the entity.
    pub fn capabilities(&self) -> CapabilitySet {
        self.forest.capabilities(self.id).unwrap_or_default()
    }

    /// The parent, through either parent role.
    pub fn parent(&self) -> Option<EntityId> {
        self.forest.parent(self.id)
    }

    /// The parent key, for keyed parent roles.
    pub fn parent_key(&self) -> Option<&'a K> {
        self.forest.parent_key(self.id)
    }

    /// Children in ascending handle order, through either children role.
    pub fn children(&self) -> Vec<EntityId> {
        self.forest.children(self.id)
    }

    /// The child stored under `key`.
    pub fn child(&self, key: &K) -> Option<EntityId> {
        self.forest.child(self.id, key)
    }
}

/// Mutable handle to one entity.
#[derive(Debug)]
pub struct EntityMut<'a, K> {
    forest: &'a mut Forest<K>,
    id: EntityId,
}

impl<'a, K: RelationKey> EntityMut<'a, K> {
    pub(crate) fn new(forest: &'a mut Forest<K>, id: EntityId) -> Self {
        Self { forest, id }
    }

    /// Handle of the entity.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Capabilities of the entity.
    pub fn capabilities(&self) -> CapabilitySet {
        self.forest.capabilities(self.id).unwrap_or_default()
    }

    /// Reborrow as a read-only view.
    pub fn as_view(&self) -> EntityRef<'_, K> {
        EntityRef::new(self.forest, self.id)
    }
}

impl<K: RelationKey> HasParent for EntityMut<'_, K> {
    fn parent(&self) -> Option<EntityId> {
        self.forest.parent(self.id)
    }

    fn attach_parent(&mut self, parent: EntityId) -> Result<Transition, RelationError> {
        self.forest.attach_parent(self.id, parent)
    }

    fn detach_parent(&mut self) -> Result<Transition, RelationError> {
        self.forest.detach_parent(self.id)
    }
}

impl<K: RelationKey> HasKeyedParent<K> for EntityMut<'_, K> {
    fn keyed_parent(&self) -> Option<EntityId> {
        self.forest.parent_key(self.id)?;
        self.forest.parent(self.id)
    }

    fn parent_key(&self) -> Option<&K> {
        self.forest.parent_key(self.id)
    }

    fn attach_keyed_parent(
        &mut self,
        key: K,
        parent: EntityId,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        self.forest
            .attach_keyed_parent(self.id, key, parent, custom_child_key)
    }

    fn detach_keyed_parent(
        &mut self,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        self.forest.detach_keyed_parent(self.id, custom_child_key)
    }
}

impl<K: RelationKey> HasChildren for EntityMut<'_, K> {
    fn children(&self) -> Vec<EntityId> {
        self.forest.children(self.id)
    }

    fn is_child_attached(&self, child: EntityId) -> bool {
        self.forest.is_child_attached(self.id, child)
    }

    fn attach_child(&mut self, child: EntityId) -> Result<Transition, RelationError> {
        self.forest.attach_child(self.id, child)
    }

    fn attach_children<I>(&mut self, children: I) -> Result<usize, RelationError>
    where
        I: IntoIterator<Item = EntityId>,
    {
        self.forest.attach_children(self.id, children)
    }

    fn detach_child(&mut self, child: EntityId) -> Result<Transition, RelationError> {
        self.forest.detach_child(self.id, child)
    }

    fn detach_children(&mut self) -> Result<usize, RelationError> {
        self.forest.detach_children(self.id)
    }
}

impl<K: RelationKey> HasKeyedChildren<K> for EntityMut<'_, K> {
    fn child(&self, key: &K) -> Option<EntityId> {
        self.forest.child(self.id, key)
    }

    fn child_keys(&self) -> Vec<K> {
        self.forest.child_keys(self.id)
    }

    fn attach_keyed_child(
        &mut self,
        key: K,
        child: EntityId,
        custom_parent_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        self.forest
            .attach_keyed_child(self.id, key, child, custom_parent_key)
    }

    fn detach_keyed_child(&mut self, key: &K) -> Result<Transition, RelationError> {
        self.forest.detach_keyed_child(self.id, key)
    }

    fn rename_child(
        &mut self,
        old: &K,
        new: K,
        use_hooks: bool,
    ) -> Result<Transition, RelationError> {
        self.forest.rename_child(self.id, old, new, use_hooks)
    }
}
