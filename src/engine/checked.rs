//! engine::checked
//!
//! Public relationship operations on a [`Forest`].
//!
//! # Gate
//!
//! Every operation runs the same gate before delegating to the protocol in
//! [`unkeyed`](super::unkeyed) or [`keyed`](super::keyed):
//!
//! 1. Keys are non-null and handles name live entities
//! 2. The entity holds the capability the operation belongs to
//! 3. A request that is already satisfied returns `Unchanged`
//! 4. If the side is checked, its veto chain runs; a rejection returns
//!    `Vetoed`
//!
//! Reciprocal calls made by the protocol come back through these same entry
//! points, so a counterpart's checks always get their say.
//!
//! # Example
//!
//! ```
//! use reciprocal::core::types::{Action, Transition};
//! use reciprocal::engine::{EntitySpec, Forest};
//!
//! let mut forest: Forest = Forest::new();
//! let sealed = forest.insert(
//!     EntitySpec::bidirectional().child_check(|p| p.action == Action::Detach),
//! );
//! let item = forest.insert(EntitySpec::bidirectional());
//!
//! assert_eq!(forest.attach_child(sealed, item).unwrap(), Transition::Vetoed);
//! assert!(forest.children(sealed).is_empty());
//! ```

use tracing::debug;

use super::entity::ParentSlot;
use super::Forest;
use crate::core::capabilities::Capability;
use crate::core::checks::Proposal;
use crate::core::types::{Action, EntityId, RelationError, RelationKey, Transition};

/// Which veto chain of an entity to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Parent,
    Children,
}

impl<K: RelationKey> Forest<K> {
    // =========================================================================
    // Unkeyed parent
    // =========================================================================

    /// Attach `parent` to `child`, replacing any current parent.
    ///
    /// `child` must hold an unkeyed parent slot. The parent is asked to add
    /// `child` if it holds unkeyed children.
    pub fn attach_parent(
        &mut self,
        child: EntityId,
        parent: EntityId,
    ) -> Result<Transition, RelationError> {
        self.ensure(parent)?;
        self.require(child, Capability::Parent)?;

        if self.parent(child) == Some(parent) {
            return Ok(Transition::Unchanged);
        }
        if !self.passes_checks(Side::Parent, child, None, parent, Action::Attach) {
            return Ok(Transition::Vetoed);
        }
        self.attach_parent_unkeyed(child, parent)
    }

    /// Detach the parent of `child`, whichever parent role it holds.
    ///
    /// A keyed parent is detached as if by
    /// [`detach_keyed_parent`](Self::detach_keyed_parent) with no custom key.
    pub fn detach_parent(&mut self, child: EntityId) -> Result<Transition, RelationError> {
        match self.get(child)?.parent {
            ParentSlot::Keyed(_) => self.detach_keyed_parent(child, None),
            ParentSlot::Unkeyed(None) => Ok(Transition::Unchanged),
            ParentSlot::Unkeyed(Some(parent)) => {
                if !self.passes_checks(Side::Parent, child, None, parent, Action::Detach) {
                    return Ok(Transition::Vetoed);
                }
                self.detach_parent_unkeyed(child)
            }
            ParentSlot::Absent => Err(RelationError::MissingCapability {
                entity: child,
                capability: Capability::Parent,
            }),
        }
    }

    // =========================================================================
    // Unkeyed children
    // =========================================================================

    /// Add `child` to the children of `parent`.
    ///
    /// `parent` must hold unkeyed children. The child is asked to set its
    /// parent if it holds an unkeyed parent slot.
    pub fn attach_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
    ) -> Result<Transition, RelationError> {
        self.ensure(child)?;
        self.require(parent, Capability::Children)?;

        if self.is_child_attached(parent, child) {
            return Ok(Transition::Unchanged);
        }
        if !self.passes_checks(Side::Children, parent, None, child, Action::Attach) {
            return Ok(Transition::Vetoed);
        }
        self.attach_child_unkeyed(parent, child)
    }

    /// Attach each child in turn. Returns how many were applied.
    ///
    /// Every handle is checked before the first attach, so an error leaves
    /// the forest untouched.
    pub fn attach_children<I>(&mut self, parent: EntityId, children: I) -> Result<usize, RelationError>
    where
        I: IntoIterator<Item = EntityId>,
    {
        let children: Vec<EntityId> = children.into_iter().collect();
        self.require(parent, Capability::Children)?;
        for child in &children {
            self.ensure(*child)?;
        }

        let mut applied = 0;
        for child in children {
            if self.attach_child(parent, child)?.is_applied() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Remove `child` from the children of `parent`.
    pub fn detach_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
    ) -> Result<Transition, RelationError> {
        self.require(parent, Capability::Children)?;

        if !self.is_child_attached(parent, child) {
            return Ok(Transition::Unchanged);
        }
        if !self.passes_checks(Side::Children, parent, None, child, Action::Detach) {
            return Ok(Transition::Vetoed);
        }
        self.detach_child_unkeyed(parent, child)
    }

    /// Detach every child of `parent` one at a time, through either
    /// children role. Returns how many were applied.
    ///
    /// Children whose detach is vetoed stay attached.
    pub fn detach_children(&mut self, parent: EntityId) -> Result<usize, RelationError> {
        let entity = self.get(parent)?;
        if entity.has(Capability::KeyedChildren) {
            let keys = self.child_keys(parent);
            return self.detach_keyed_children(parent, keys);
        }
        if !entity.has(Capability::Children) {
            return Err(RelationError::MissingCapability {
                entity: parent,
                capability: Capability::Children,
            });
        }

        let mut applied = 0;
        for child in self.children(parent) {
            if self.detach_child(parent, child)?.is_applied() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    // =========================================================================
    // Keyed children
    // =========================================================================

    /// Store `child` under `key` in the children of `parent`.
    ///
    /// A different child already stored under `key` is detached first; if
    /// that detach is vetoed the call returns `Blocked`. The child is asked
    /// to attach `parent` under `custom_parent_key`, or under `key` when
    /// `None`.
    pub fn attach_keyed_child(
        &mut self,
        parent: EntityId,
        key: K,
        child: EntityId,
        custom_parent_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        if key.is_null() || is_null_custom(&custom_parent_key) {
            return Err(RelationError::NullKey);
        }
        self.ensure(child)?;
        self.require(parent, Capability::KeyedChildren)?;

        if self.child(parent, &key) == Some(child) {
            return Ok(Transition::Unchanged);
        }
        if !self.passes_checks(Side::Children, parent, Some(&key), child, Action::Attach) {
            return Ok(Transition::Vetoed);
        }
        self.attach_child_keyed(parent, key, child, custom_parent_key)
    }

    /// Attach each `(key, child)` pair in turn. Returns how many were applied.
    ///
    /// Every key and handle is checked before the first attach.
    pub fn attach_keyed_children<I>(
        &mut self,
        parent: EntityId,
        children: I,
    ) -> Result<usize, RelationError>
    where
        I: IntoIterator<Item = (K, EntityId)>,
    {
        let children: Vec<(K, EntityId)> = children.into_iter().collect();
        self.require(parent, Capability::KeyedChildren)?;
        for (key, child) in &children {
            if key.is_null() {
                return Err(RelationError::NullKey);
            }
            self.ensure(*child)?;
        }

        let mut applied = 0;
        for (key, child) in children {
            if self.attach_keyed_child(parent, key, child, None)?.is_applied() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Remove the child stored under `key`.
    pub fn detach_keyed_child(
        &mut self,
        parent: EntityId,
        key: &K,
    ) -> Result<Transition, RelationError> {
        if key.is_null() {
            return Err(RelationError::NullKey);
        }
        self.require(parent, Capability::KeyedChildren)?;

        let Some(child) = self.child(parent, key) else {
            return Ok(Transition::Unchanged);
        };
        if !self.passes_checks(Side::Children, parent, Some(key), child, Action::Detach) {
            return Ok(Transition::Vetoed);
        }
        self.detach_child_keyed(parent, key)
    }

    /// Detach the children stored under each key. Returns how many were
    /// applied.
    pub fn detach_keyed_children<I>(&mut self, parent: EntityId, keys: I) -> Result<usize, RelationError>
    where
        I: IntoIterator<Item = K>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        self.require(parent, Capability::KeyedChildren)?;
        if keys.iter().any(RelationKey::is_null) {
            return Err(RelationError::NullKey);
        }

        let mut applied = 0;
        for key in keys {
            if self.detach_keyed_child(parent, &key)?.is_applied() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Move the child stored under `old` to `new`.
    ///
    /// Returns `Unchanged` when `old` is unused or `new` is taken. With
    /// `use_hooks` the move is a full detach then attach, so checks, hooks
    /// and reciprocation all run and the child keeps its own key for the
    /// parent. The parent's check on attaching under `new` runs before
    /// anything moves, so a veto there returns `Vetoed`; a veto on the
    /// detach returns `Blocked`. Without `use_hooks` only the map entry
    /// moves.
    pub fn rename_child(
        &mut self,
        parent: EntityId,
        old: &K,
        new: K,
        use_hooks: bool,
    ) -> Result<Transition, RelationError> {
        if new.is_null() {
            return Err(RelationError::NullKey);
        }
        self.require(parent, Capability::KeyedChildren)?;

        if use_hooks {
            let Some(child) = self.child(parent, old) else {
                return Ok(Transition::Unchanged);
            };
            if self.is_child_key_attached(parent, &new) {
                return Ok(Transition::Unchanged);
            }
            if !self.passes_checks(Side::Children, parent, Some(&new), child, Action::Attach) {
                return Ok(Transition::Vetoed);
            }
        }
        self.rename_child_keyed(parent, old, new, use_hooks)
    }

    // =========================================================================
    // Keyed parent
    // =========================================================================

    /// Attach `parent` to `child` under `key`, replacing any current parent.
    ///
    /// The parent is asked to store `child` under `custom_child_key`, or
    /// under `key` when `None`.
    pub fn attach_keyed_parent(
        &mut self,
        child: EntityId,
        key: K,
        parent: EntityId,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        if key.is_null() || is_null_custom(&custom_child_key) {
            return Err(RelationError::NullKey);
        }
        self.ensure(parent)?;
        self.require(child, Capability::KeyedParent)?;

        if self.parent(child) == Some(parent) && self.parent_key(child) == Some(&key) {
            return Ok(Transition::Unchanged);
        }
        if !self.passes_checks(Side::Parent, child, Some(&key), parent, Action::Attach) {
            return Ok(Transition::Vetoed);
        }
        self.attach_parent_keyed(child, key, parent, custom_child_key)
    }

    /// Detach the keyed parent of `child`.
    ///
    /// The parent is asked to drop the child stored under
    /// `custom_child_key`, or under the parent key when `None`, but only if
    /// that entry really is `child`.
    pub fn detach_keyed_parent(
        &mut self,
        child: EntityId,
        custom_child_key: Option<K>,
    ) -> Result<Transition, RelationError> {
        if is_null_custom(&custom_child_key) {
            return Err(RelationError::NullKey);
        }
        self.require(child, Capability::KeyedParent)?;

        let current = match &self.get(child)?.parent {
            ParentSlot::Keyed(Some((key, parent))) => Some((key.clone(), *parent)),
            _ => None,
        };
        let Some((key, parent)) = current else {
            return Ok(Transition::Unchanged);
        };
        if !self.passes_checks(Side::Parent, child, Some(&key), parent, Action::Detach) {
            return Ok(Transition::Vetoed);
        }
        self.detach_parent_keyed(child, custom_child_key)
    }

    // =========================================================================
    // Veto checks
    // =========================================================================

    fn passes_checks(
        &self,
        side: Side,
        subject: EntityId,
        key: Option<&K>,
        value: EntityId,
        action: Action,
    ) -> bool {
        let Some(entity) = self.entities.get(&subject) else {
            return true;
        };
        let chain = match side {
            Side::Parent => entity.parent_checks.as_ref(),
            Side::Children => entity.child_checks.as_ref(),
        };
        let Some(chain) = chain else {
            return true;
        };

        let proposal = Proposal {
            forest: self,
            subject,
            key,
            value,
            action,
        };
        let approved = chain.run_checks(&proposal);
        if !approved {
            debug!(subject = %subject, value = %value, action = %action, side = ?side, "transition vetoed");
        }
        approved
    }
}

fn is_null_custom<K: RelationKey>(custom: &Option<K>) -> bool {
    custom.as_ref().map_or(false, RelationKey::is_null)
}
