//! engine::unkeyed
//!
//! Relationship protocol for unkeyed parent slots and child sets.
//!
//! These functions assume the caller already validated handles, roles and
//! veto checks; they are reached only through [`checked`](super::checked).
//!
//! # Ordering
//!
//! Attach: update the local slot, reciprocate, fire the local hook.
//! Detach: clear the local slot, reciprocate, fire the local hook.
//!
//! Clearing locally before reciprocating means the reciprocal call that
//! comes back to this entity finds nothing left to do and returns
//! `Unchanged`, so each hook fires exactly once per transition.
//!
//! # Keyed counterparts
//!
//! A keyed parent slot or keyed child map cannot be reached from here,
//! since there is no key to give it. When such a counterpart is left out of
//! step, a [`FailureCause::KeyRequired`] failure is recorded.

use tracing::{debug, trace};

use super::entity::{ChildSlot, ParentSlot};
use super::reciprocate::{FailureCause, Operation, Reciprocation, ReciprocationFailure};
use super::Forest;
use crate::core::types::{EntityId, RelationError, RelationKey, Transition};

impl<K: RelationKey> Forest<K> {
    pub(super) fn attach_child_unkeyed(
        &mut self,
        parent: EntityId,
        child: EntityId,
    ) -> Result<Transition, RelationError> {
        let inserted = match self.child_slot_mut(parent) {
            Some(ChildSlot::Unkeyed(set)) => set.insert(child),
            _ => false,
        };
        if !inserted {
            return Ok(Transition::Unchanged);
        }
        trace!(parent = %parent, child = %child, "child attached");

        match self.parent_strategy(child) {
            Reciprocation::Unkeyed => {
                let result = self.attach_parent(child, parent);
                self.settle(parent, child, Operation::AttachParent, result);
            }
            Reciprocation::Keyed if self.parent(child) != Some(parent) => {
                self.key_required(parent, child, Operation::AttachParent);
            }
            _ => {}
        }

        self.notify(parent, |hooks| hooks.on_child_attach(None, child));
        Ok(Transition::Applied)
    }

    pub(super) fn detach_child_unkeyed(
        &mut self,
        parent: EntityId,
        child: EntityId,
    ) -> Result<Transition, RelationError> {
        let removed = match self.child_slot_mut(parent) {
            Some(ChildSlot::Unkeyed(set)) => set.remove(&child),
            _ => false,
        };
        if !removed {
            return Ok(Transition::Unchanged);
        }
        trace!(parent = %parent, child = %child, "child detached");

        if self.parent(child) == Some(parent) && self.parent_strategy(child) != Reciprocation::None
        {
            let result = self.detach_parent(child);
            self.settle(parent, child, Operation::DetachParent, result);
        }

        self.notify(parent, |hooks| hooks.on_child_detach(None, child));
        Ok(Transition::Applied)
    }

    pub(super) fn attach_parent_unkeyed(
        &mut self,
        child: EntityId,
        parent: EntityId,
    ) -> Result<Transition, RelationError> {
        match self.parent(child) {
            Some(current) if current == parent => return Ok(Transition::Unchanged),
            Some(current) => {
                self.detach_parent(child)?;
                if self.parent(child).is_some() {
                    debug!(child = %child, current = %current, parent = %parent, "replacing parent blocked");
                    return Ok(Transition::Blocked);
                }
            }
            None => {}
        }

        match self.parent_slot_mut(child) {
            Some(ParentSlot::Unkeyed(slot)) => *slot = Some(parent),
            _ => return Ok(Transition::Unchanged),
        }
        trace!(child = %child, parent = %parent, "parent attached");

        match self.children_strategy(parent) {
            Reciprocation::Unkeyed => {
                let result = self.attach_child(parent, child);
                self.settle(child, parent, Operation::AttachChild, result);
            }
            Reciprocation::Keyed if !self.is_child_attached(parent, child) => {
                self.key_required(child, parent, Operation::AttachChild);
            }
            _ => {}
        }

        self.notify(child, |hooks| hooks.on_parent_attach(None, parent));
        Ok(Transition::Applied)
    }

    pub(super) fn detach_parent_unkeyed(
        &mut self,
        child: EntityId,
    ) -> Result<Transition, RelationError> {
        let parent = match self.parent_slot_mut(child) {
            Some(ParentSlot::Unkeyed(slot)) => slot.take(),
            _ => None,
        };
        let Some(parent) = parent else {
            return Ok(Transition::Unchanged);
        };
        trace!(child = %child, parent = %parent, "parent detached");

        match self.children_strategy(parent) {
            Reciprocation::Unkeyed => {
                let result = self.detach_child(parent, child);
                self.settle(child, parent, Operation::DetachChild, result);
            }
            Reciprocation::Keyed if self.is_child_attached(parent, child) => {
                self.key_required(child, parent, Operation::DetachChild);
            }
            _ => {}
        }

        self.notify(child, |hooks| hooks.on_parent_detach(None, parent));
        Ok(Transition::Applied)
    }

    fn key_required(&mut self, origin: EntityId, target: EntityId, operation: Operation) {
        self.record_failure(ReciprocationFailure {
            origin,
            target,
            operation,
            cause: FailureCause::KeyRequired,
        });
    }
}
