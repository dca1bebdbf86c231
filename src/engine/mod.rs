//! engine
//!
//! The forest arena and the relationship protocol that runs on it.
//!
//! # Architecture
//!
//! A [`Forest`] owns every entity and addresses them by
//! [`EntityId`]. All mutation goes through the forest, which lets one call
//! update both sides of a relationship without shared mutable references:
//!
//! 1. **Validate**: every handle exists and the entity holds the capability
//!    the operation needs (see [`checked`])
//! 2. **Check**: the no-op short-circuit runs, then the side's veto chain
//! 3. **Apply**: the local slot or collection changes ([`unkeyed`], [`keyed`])
//! 4. **Reciprocate**: the other side is asked to follow through its own
//!    public entry point ([`reciprocate`])
//! 5. **Notify**: the local lifecycle hook fires
//!
//! # Invariants
//!
//! - A call that returns anything other than `Applied` changed nothing
//! - Failed reciprocation never aborts the local change
//! - Handles are never reused
//!
//! # Example
//!
//! ```
//! use reciprocal::engine::{EntitySpec, Forest};
//!
//! let mut forest: Forest = Forest::new();
//! let usr = forest.insert(EntitySpec::keyed_bidirectional());
//! let bin = forest.insert(EntitySpec::keyed_bidirectional());
//!
//! forest.attach_keyed_child(usr, "bin".to_string(), bin, None).unwrap();
//!
//! assert_eq!(forest.child(usr, &"bin".to_string()), Some(bin));
//! assert_eq!(forest.parent_key(bin), Some(&"bin".to_string()));
//! assert!(forest.reciprocation_failures().next().is_none());
//! ```

pub mod checked;
pub mod entity;
pub mod handle;
pub mod keyed;
pub mod reciprocate;
pub mod unkeyed;
pub mod verify;

pub use entity::{EntitySpec, SlotKind};
pub use handle::{EntityMut, EntityRef};
pub use reciprocate::{FailureCause, Operation, ReciprocationFailure};
pub use verify::{verify, VerifyError, VerifyResult};

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use tracing::debug;

use crate::core::capabilities::{Capability, CapabilitySet};
use crate::core::checks::CheckChain;
use crate::core::config::Config;
use crate::core::hooks::RelationHooks;
use crate::core::types::{EntityId, RelationError, RelationKey};
use entity::{ChildSlot, Entity, ParentSlot};

/// Arena of entities joined by parent/child relationships.
///
/// `K` is the key type of keyed relationships; it defaults to `String`.
pub struct Forest<K = String> {
    entities: HashMap<EntityId, Entity<K>>,
    next_id: u64,
    config: Config,
    failures: VecDeque<ReciprocationFailure>,
}

impl<K> Default for Forest<K> {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl<K> Forest<K> {
    /// Create an empty forest with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty forest with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
            config,
            failures: VecDeque::new(),
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add an entity and return its handle.
    pub fn insert(&mut self, spec: EntitySpec<K>) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, spec.build());
        debug!(entity = %id, "entity inserted");
        id
    }

    /// Whether `id` names a live entity.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the forest holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Handles of all live entities, in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        let ids: BTreeSet<EntityId> = self.entities.keys().copied().collect();
        ids.into_iter().collect()
    }

    /// The capabilities `id` was inserted with.
    pub fn capabilities(&self, id: EntityId) -> Result<CapabilitySet, RelationError> {
        Ok(self.get(id)?.capabilities())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The parent of `id`, through either parent role.
    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(&id).and_then(|e| e.parent.parent())
    }

    /// The key naming the parent of `id`, for keyed parent roles.
    pub fn parent_key(&self, id: EntityId) -> Option<&K> {
        self.entities.get(&id).and_then(|e| e.parent.key())
    }

    /// Whether `id` has a parent attached.
    pub fn is_parent_attached(&self, id: EntityId) -> bool {
        self.parent(id).is_some()
    }

    /// Children of `id` in ascending handle order, through either children role.
    pub fn children(&self, id: EntityId) -> Vec<EntityId> {
        self.entities
            .get(&id)
            .map(|e| e.children.ids())
            .unwrap_or_default()
    }

    /// Whether `child` is among the children of `parent`.
    pub fn is_child_attached(&self, parent: EntityId, child: EntityId) -> bool {
        self.entities
            .get(&parent)
            .map_or(false, |e| e.children.contains(child))
    }

    // =========================================================================
    // Check chains
    // =========================================================================

    /// The parent-side veto chain of `id`.
    pub fn parent_checks(&self, id: EntityId) -> Result<&CheckChain<K>, RelationError> {
        self.get(id)?
            .parent_checks
            .as_ref()
            .ok_or(RelationError::Unchecked {
                entity: id,
                capability: self.parent_capability(id),
            })
    }

    /// The parent-side veto chain of `id`, for adding or removing checks.
    pub fn parent_checks_mut(&mut self, id: EntityId) -> Result<&mut CheckChain<K>, RelationError> {
        let capability = self.parent_capability(id);
        self.get_mut(id)?
            .parent_checks
            .as_mut()
            .ok_or(RelationError::Unchecked {
                entity: id,
                capability,
            })
    }

    /// The child-side veto chain of `id`.
    pub fn child_checks(&self, id: EntityId) -> Result<&CheckChain<K>, RelationError> {
        self.get(id)?
            .child_checks
            .as_ref()
            .ok_or(RelationError::Unchecked {
                entity: id,
                capability: self.children_capability(id),
            })
    }

    /// The child-side veto chain of `id`, for adding or removing checks.
    pub fn child_checks_mut(&mut self, id: EntityId) -> Result<&mut CheckChain<K>, RelationError> {
        let capability = self.children_capability(id);
        self.get_mut(id)?
            .child_checks
            .as_mut()
            .ok_or(RelationError::Unchecked {
                entity: id,
                capability,
            })
    }

    // =========================================================================
    // Reciprocation failures
    // =========================================================================

    /// Reciprocation failures recorded so far, oldest first.
    ///
    /// At most `failure_log_capacity` entries are retained.
    pub fn reciprocation_failures(
        &self,
    ) -> std::collections::vec_deque::Iter<'_, ReciprocationFailure> {
        self.failures.iter()
    }

    /// Forget every recorded reciprocation failure.
    pub fn clear_reciprocation_failures(&mut self) {
        self.failures.clear();
    }

    // =========================================================================
    // Internal accessors
    // =========================================================================

    pub(crate) fn get(&self, id: EntityId) -> Result<&Entity<K>, RelationError> {
        self.entities.get(&id).ok_or(RelationError::EntityNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity<K>, RelationError> {
        self.entities
            .get_mut(&id)
            .ok_or(RelationError::EntityNotFound(id))
    }

    pub(crate) fn ensure(&self, id: EntityId) -> Result<(), RelationError> {
        self.get(id).map(|_| ())
    }

    /// Fail unless `id` exists and holds `capability`.
    pub(crate) fn require(&self, id: EntityId, capability: Capability) -> Result<(), RelationError> {
        if self.get(id)?.has(capability) {
            Ok(())
        } else {
            Err(RelationError::MissingCapability {
                entity: id,
                capability,
            })
        }
    }

    pub(crate) fn parent_slot(&self, id: EntityId) -> Option<&ParentSlot<K>> {
        self.entities.get(&id).map(|e| &e.parent)
    }

    pub(crate) fn parent_slot_mut(&mut self, id: EntityId) -> Option<&mut ParentSlot<K>> {
        self.entities.get_mut(&id).map(|e| &mut e.parent)
    }

    pub(crate) fn child_slot(&self, id: EntityId) -> Option<&ChildSlot<K>> {
        self.entities.get(&id).map(|e| &e.children)
    }

    pub(crate) fn child_slot_mut(&mut self, id: EntityId) -> Option<&mut ChildSlot<K>> {
        self.entities.get_mut(&id).map(|e| &mut e.children)
    }

    /// Fire a lifecycle hook on `id`.
    pub(crate) fn notify<F>(&mut self, id: EntityId, fire: F)
    where
        F: FnOnce(&mut dyn RelationHooks<K>),
    {
        if let Some(entity) = self.entities.get_mut(&id) {
            fire(entity.hooks.as_mut());
        }
    }

    fn parent_capability(&self, id: EntityId) -> Capability {
        self.parent_slot(id)
            .and_then(ParentSlot::capability)
            .unwrap_or(Capability::Parent)
    }

    fn children_capability(&self, id: EntityId) -> Capability {
        self.child_slot(id)
            .and_then(ChildSlot::capability)
            .unwrap_or(Capability::Children)
    }
}

impl<K: RelationKey> Forest<K> {
    /// The child of `parent` stored under `key`.
    pub fn child(&self, parent: EntityId, key: &K) -> Option<EntityId> {
        match self.child_slot(parent) {
            Some(ChildSlot::Keyed(map)) => map.get(key).copied(),
            _ => None,
        }
    }

    /// Keys in use among the keyed children of `parent`.
    pub fn child_keys(&self, parent: EntityId) -> Vec<K> {
        match self.child_slot(parent) {
            Some(ChildSlot::Keyed(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// The key-to-child map of `parent`, for keyed children roles.
    pub fn children_and_keys(&self, parent: EntityId) -> Option<&HashMap<K, EntityId>> {
        match self.child_slot(parent) {
            Some(ChildSlot::Keyed(map)) => Some(map),
            _ => None,
        }
    }

    /// Whether `key` is in use among the keyed children of `parent`.
    pub fn is_child_key_attached(&self, parent: EntityId, key: &K) -> bool {
        self.child(parent, key).is_some()
    }

    /// Remove an entity from the forest.
    ///
    /// The parent and every child are first detached through the normal
    /// protocol, so hooks and reciprocation run as usual. Any reference to
    /// the entity that survives (because a detach was vetoed or a
    /// counterpart never reciprocated) is then dropped silently, so no live
    /// entity is left pointing at a removed handle.
    pub fn remove(&mut self, id: EntityId) -> Result<(), RelationError> {
        let entity = self.get(id)?;
        let parent_role = entity.parent.capability();
        let has_children_role = entity.children.capability().is_some();

        match parent_role {
            Some(Capability::KeyedParent) => {
                let stored = self
                    .parent(id)
                    .and_then(|parent| self.stored_key(parent, id));
                self.detach_keyed_parent(id, stored)?;
            }
            Some(_) => {
                // A keyed parent can only drop the entry by its key.
                let keyed_entry = self
                    .parent(id)
                    .and_then(|parent| self.stored_key(parent, id).map(|key| (parent, key)));
                match keyed_entry {
                    Some((parent, key)) => {
                        self.detach_keyed_child(parent, &key)?;
                    }
                    None => {
                        self.detach_parent(id)?;
                    }
                }
            }
            None => {}
        }
        if has_children_role {
            self.detach_children(id)?;
        }

        for (other, entity) in self.entities.iter_mut() {
            if *other != id {
                entity.parent.scrub(id);
                entity.children.scrub(id);
            }
        }

        self.entities.remove(&id);
        debug!(entity = %id, "entity removed");
        Ok(())
    }

    /// Read-only handle to an entity.
    pub fn entity(&self, id: EntityId) -> Result<EntityRef<'_, K>, RelationError> {
        self.ensure(id)?;
        Ok(EntityRef::new(self, id))
    }

    /// Mutable handle to an entity, implementing the capability traits.
    pub fn entity_mut(&mut self, id: EntityId) -> Result<EntityMut<'_, K>, RelationError> {
        self.ensure(id)?;
        Ok(EntityMut::new(self, id))
    }
}

impl<K: fmt::Debug> fmt::Debug for Forest<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("entities", &self.entities)
            .field("next_id", &self.next_id)
            .field("failures", &self.failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transition;

    #[test]
    fn handles_start_at_one_and_are_never_reused() {
        let mut forest: Forest = Forest::new();
        let a = forest.insert(EntitySpec::bidirectional());
        let b = forest.insert(EntitySpec::bidirectional());
        assert_eq!(a, EntityId::new(1));
        assert_eq!(b, EntityId::new(2));

        forest.remove(b).unwrap();
        let c = forest.insert(EntitySpec::bidirectional());
        assert_eq!(c, EntityId::new(3));
        assert_eq!(forest.ids(), vec![a, c]);
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn queries_on_unknown_handles_are_empty() {
        let forest: Forest = Forest::new();
        let ghost = EntityId::new(42);
        assert!(forest.is_empty());
        assert_eq!(forest.parent(ghost), None);
        assert!(forest.children(ghost).is_empty());
        assert!(!forest.is_child_attached(ghost, ghost));
        assert_eq!(
            forest.capabilities(ghost),
            Err(RelationError::EntityNotFound(ghost))
        );
    }

    #[test]
    fn check_chain_access_requires_checked_side() {
        let mut forest: Forest = Forest::new();
        let plain = forest.insert(EntitySpec::bidirectional());
        let checked = forest.insert(EntitySpec::keyed_bidirectional().checked_children());

        assert_eq!(
            forest.child_checks(plain).map(|c| c.len()),
            Err(RelationError::Unchecked {
                entity: plain,
                capability: Capability::Children,
            })
        );
        assert!(matches!(
            forest.parent_checks_mut(checked),
            Err(RelationError::Unchecked {
                capability: Capability::KeyedParent,
                ..
            })
        ));

        forest.child_checks_mut(checked).unwrap().add(|_| false);
        assert_eq!(forest.child_checks(checked).unwrap().len(), 1);
    }

    #[test]
    fn remove_detaches_both_directions() {
        let mut forest: Forest = Forest::new();
        let root = forest.insert(EntitySpec::bidirectional());
        let mid = forest.insert(EntitySpec::bidirectional());
        let leaf = forest.insert(EntitySpec::bidirectional());

        forest.attach_child(root, mid).unwrap();
        forest.attach_child(mid, leaf).unwrap();
        forest.remove(mid).unwrap();

        assert!(!forest.contains(mid));
        assert!(forest.children(root).is_empty());
        assert_eq!(forest.parent(leaf), None);
        assert!(verify(&forest).ok);
    }

    #[test]
    fn remove_scrubs_references_left_by_vetoes() {
        let mut forest: Forest = Forest::new();
        let parent = forest.insert(EntitySpec::bidirectional().child_check(|_| false));
        let child = forest.insert(EntitySpec::bidirectional());

        // The parent refuses the child, so only the child points upward.
        assert_eq!(forest.attach_parent(child, parent).unwrap(), Transition::Applied);
        assert_eq!(forest.parent(child), Some(parent));
        assert!(forest.children(parent).is_empty());

        forest.remove(parent).unwrap();
        assert_eq!(forest.parent(child), None);
        assert!(verify(&forest).ok);
    }

    #[test]
    fn remove_finds_custom_keyed_entry() {
        let mut forest: Forest = Forest::new();
        let dir = forest.insert(EntitySpec::keyed_bidirectional());
        let file = forest.insert(EntitySpec::new().with_parent(SlotKind::Keyed));
        forest
            .attach_keyed_parent(file, "dir".to_string(), dir, Some("file".to_string()))
            .unwrap();

        forest.remove(file).unwrap();
        assert!(forest.child_keys(dir).is_empty());
        assert_eq!(forest.reciprocation_failures().len(), 0);
    }

    #[test]
    fn remove_drops_unkeyed_child_from_keyed_parent() {
        let mut forest: Forest = Forest::new();
        let bag = forest.insert(EntitySpec::keyed_bidirectional());
        let tag = forest.insert(EntitySpec::bidirectional());
        forest
            .attach_keyed_child(bag, "t".to_string(), tag, None)
            .unwrap();
        assert_eq!(forest.parent(tag), Some(bag));

        forest.remove(tag).unwrap();
        assert!(forest.child_keys(bag).is_empty());
        assert_eq!(forest.reciprocation_failures().len(), 0);
        assert!(verify(&forest).ok);
    }

    #[test]
    fn remove_unknown_entity_fails() {
        let mut forest: Forest = Forest::new();
        let ghost = EntityId::new(9);
        assert_eq!(forest.remove(ghost), Err(RelationError::EntityNotFound(ghost)));
    }
}
