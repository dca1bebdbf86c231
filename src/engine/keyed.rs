//! engine::keyed
//!
//! Relationship protocol for keyed parent slots and keyed child maps.
//!
//! # Keys on each side
//!
//! A keyed relation may be named differently from each side. The parent
//! stores the child under a *child key*; the child stores its parent under
//! a *parent key*. By default both are the same key. The `custom_*`
//! arguments override the key used on the far side of a reciprocal call.
//!
//! # Ordering
//!
//! Same as the unkeyed protocol: local change, reciprocation, local hook.
//! Replacing an occupied key or an attached parent detaches the previous
//! relation first through the public (checked) path. If that detach is
//! vetoed the replacement is blocked and nothing changes. A replaced keyed
//! parent is asked to drop the entry where it actually stores the child,
//! whatever key that entry uses.

use tracing::{debug, trace};

use super::entity::{ChildSlot, ParentSlot};
use super::reciprocate::{FailureCause, Operation, Reciprocation, ReciprocationFailure};
use super::Forest;
use crate::core::types::{EntityId, RelationError, RelationKey, Transition};

impl<K: RelationKey> Forest<K> {
    /// Key under which `parent` stores `child`, preferring the child's own
    /// parent key when both name the same entry.
    pub(crate) fn stored_key(&self, parent: EntityId, child: EntityId) -> Option<K> {
        let map = self.children_and_keys(parent)?;
        if let Some(key) = self.parent_key(child) {
            if map.get(key) == Some(&child) {
                return Some(key.clone());
            }
        }
        map.iter()
            .find(|(_, stored)| **stored == child)
            .map(|(key, _)| key.clone())
    }

    pub(super) fn attach_child_keyed(
        &mut self,
        parent: EntityId,
        key: K,
        child: EntityId,
        custom_parent_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        match self.child(parent, &key) {
            Some(existing) if existing == child => return Ok(Transition::Unchanged),
            Some(displaced) => {
                self.detach_keyed_child(parent, &key)?;
                if self.is_child_key_attached(parent, &key) {
                    debug!(parent = %parent, key = ?key, displaced = %displaced, "replacing child blocked");
                    return Ok(Transition::Blocked);
                }
            }
            None => {}
        }

        match self.child_slot_mut(parent) {
            Some(ChildSlot::Keyed(map)) => {
                map.insert(key.clone(), child);
            }
            _ => return Ok(Transition::Unchanged),
        }
        trace!(parent = %parent, key = ?key, child = %child, "keyed child attached");

        match self.parent_strategy(child) {
            Reciprocation::Keyed => {
                let parent_key = custom_parent_key.unwrap_or_else(|| key.clone());
                let result = self.attach_keyed_parent(child, parent_key, parent, Some(key.clone()));
                self.settle(parent, child, Operation::AttachParent, result);
            }
            Reciprocation::Unkeyed => {
                let result = self.attach_parent(child, parent);
                self.settle(parent, child, Operation::AttachParent, result);
            }
            Reciprocation::None => {}
        }

        self.notify(parent, |hooks| hooks.on_child_attach(Some(&key), child));
        Ok(Transition::Applied)
    }

    pub(super) fn detach_child_keyed(
        &mut self,
        parent: EntityId,
        key: &K,
    ) -> Result<Transition, RelationError> {
        let removed = match self.child_slot_mut(parent) {
            Some(ChildSlot::Keyed(map)) => map.remove(key),
            _ => None,
        };
        let Some(child) = removed else {
            return Ok(Transition::Unchanged);
        };
        trace!(parent = %parent, key = ?key, child = %child, "keyed child detached");

        if self.parent(child) == Some(parent) {
            match self.parent_strategy(child) {
                Reciprocation::Keyed => {
                    let result = self.detach_keyed_parent(child, Some(key.clone()));
                    self.settle(parent, child, Operation::DetachParent, result);
                }
                Reciprocation::Unkeyed => {
                    let result = self.detach_parent(child);
                    self.settle(parent, child, Operation::DetachParent, result);
                }
                Reciprocation::None => {}
            }
        }

        self.notify(parent, |hooks| hooks.on_child_detach(Some(key), child));
        Ok(Transition::Applied)
    }

    pub(super) fn attach_parent_keyed(
        &mut self,
        child: EntityId,
        key: K,
        parent: EntityId,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        if let Some(ParentSlot::Keyed(Some((current_key, current)))) = self.parent_slot(child) {
            if *current_key == key && *current == parent {
                return Ok(Transition::Unchanged);
            }
        }

        if let Some(current) = self.parent(child) {
            let stored = self.stored_key(current, child);
            self.detach_keyed_parent(child, stored)?;
            if self.parent(child).is_some() {
                debug!(child = %child, current = %current, parent = %parent, "replacing keyed parent blocked");
                return Ok(Transition::Blocked);
            }
        }

        match self.parent_slot_mut(child) {
            Some(ParentSlot::Keyed(slot)) => *slot = Some((key.clone(), parent)),
            _ => return Ok(Transition::Unchanged),
        }
        trace!(child = %child, key = ?key, parent = %parent, "keyed parent attached");

        match self.children_strategy(parent) {
            Reciprocation::Keyed => {
                let child_key = custom_child_key.unwrap_or_else(|| key.clone());
                let result = self.attach_keyed_child(parent, child_key, child, Some(key.clone()));
                self.settle(child, parent, Operation::AttachChild, result);
            }
            Reciprocation::Unkeyed => {
                let result = self.attach_child(parent, child);
                self.settle(child, parent, Operation::AttachChild, result);
            }
            Reciprocation::None => {}
        }

        self.notify(child, |hooks| hooks.on_parent_attach(Some(&key), parent));
        Ok(Transition::Applied)
    }

    pub(super) fn detach_parent_keyed(
        &mut self,
        child: EntityId,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        let taken = match self.parent_slot_mut(child) {
            Some(ParentSlot::Keyed(slot)) => slot.take(),
            _ => None,
        };
        let Some((key, parent)) = taken else {
            return Ok(Transition::Unchanged);
        };
        trace!(child = %child, key = ?key, parent = %parent, "keyed parent detached");

        match self.children_strategy(parent) {
            Reciprocation::Keyed => {
                let child_key = custom_child_key.unwrap_or_else(|| key.clone());
                if self.child(parent, &child_key) == Some(child) {
                    let result = self.detach_keyed_child(parent, &child_key);
                    self.settle(child, parent, Operation::DetachChild, result);
                } else if self.is_child_attached(parent, child) {
                    self.record_failure(ReciprocationFailure {
                        origin: child,
                        target: parent,
                        operation: Operation::DetachChild,
                        cause: FailureCause::KeyMismatch,
                    });
                }
            }
            Reciprocation::Unkeyed => {
                let result = self.detach_child(parent, child);
                self.settle(child, parent, Operation::DetachChild, result);
            }
            Reciprocation::None => {}
        }

        self.notify(child, |hooks| hooks.on_parent_detach(Some(&key), parent));
        Ok(Transition::Applied)
    }

    pub(super) fn rename_child_keyed(
        &mut self,
        parent: EntityId,
        old: &K,
        new: K,
        use_hooks: bool,
    ) -> Result<Transition, RelationError> {
        let Some(child) = self.child(parent, old) else {
            return Ok(Transition::Unchanged);
        };
        if self.is_child_key_attached(parent, &new) {
            return Ok(Transition::Unchanged);
        }

        if use_hooks {
            // Keep the child's own name for the parent across the move.
            let parent_key = if self.parent(child) == Some(parent) {
                self.parent_key(child).cloned()
            } else {
                None
            };

            self.detach_keyed_child(parent, old)?;
            if self.is_child_key_attached(parent, old) {
                debug!(parent = %parent, old = ?old, new = ?new, "rename blocked");
                return Ok(Transition::Blocked);
            }
            let moved = self.attach_keyed_child(parent, new.clone(), child, parent_key.clone())?;
            if moved.is_applied() {
                return Ok(moved);
            }

            // The detach already happened; put the child back under `old`.
            let restored = self.attach_keyed_child(parent, old.clone(), child, parent_key);
            debug!(parent = %parent, old = ?old, new = ?new, moved = %moved, restored = ?restored, "rename blocked after detach");
            return Ok(Transition::Blocked);
        }

        if let Some(ChildSlot::Keyed(map)) = self.child_slot_mut(parent) {
            map.remove(old);
            map.insert(new.clone(), child);
        }
        trace!(parent = %parent, old = ?old, new = ?new, child = %child, "keyed child renamed");
        Ok(Transition::Applied)
    }
}
