//! core::types
//!
//! Strong types for core relationship concepts.
//!
//! # Types
//!
//! - [`EntityId`] - Stable handle of an entity inside a [`Forest`](crate::engine::Forest)
//! - [`RelationKey`] - Contract for keys used by keyed relationships
//! - [`Action`] - Which transition a veto check is asked about
//! - [`Transition`] - Outcome of a relationship mutator
//! - [`RelationError`] - Precondition violations
//!
//! # Identity
//!
//! Entities are compared by handle, never structurally. Two entities with
//! identical relations are still distinct participants in the graph.
//!
//! # Examples
//!
//! ```
//! use reciprocal::core::types::{RelationKey, Transition};
//!
//! // Empty strings are the "null" key and are rejected by keyed operations
//! assert!(String::new().is_null());
//! assert!(!"usr".to_string().is_null());
//! assert!(None::<u32>.is_null());
//!
//! assert!(Transition::Applied.is_applied());
//! assert!(!Transition::Vetoed.is_applied());
//! ```

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::capabilities::Capability;

/// Errors raised before any mutation takes place.
///
/// Veto rejections are not errors; they are reported as
/// [`Transition::Vetoed`]. Failures of a reciprocal call are never returned
/// either: they are recorded by the forest (see
/// [`ReciprocationFailure`](crate::engine::ReciprocationFailure)).
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationError {
    #[error("relation key must not be null")]
    NullKey,

    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("entity {entity} does not have the {capability} capability")]
    MissingCapability {
        entity: EntityId,
        capability: Capability,
    },

    #[error("entity {entity} has no veto checks on its {capability} side")]
    Unchecked {
        entity: EntityId,
        capability: Capability,
    },
}

/// A stable handle to an entity stored in a forest.
///
/// Handles are allocated sequentially and never reused, so a handle to a
/// removed entity stays invalid forever instead of aliasing a newer one.
///
/// # Example
///
/// ```
/// use reciprocal::engine::{EntitySpec, Forest};
///
/// let mut forest: Forest = Forest::new();
/// let a = forest.insert(EntitySpec::bidirectional());
/// let b = forest.insert(EntitySpec::bidirectional());
///
/// assert_ne!(a, b);
/// assert_eq!(a.to_string(), "#1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Create a handle from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A key identifying one side of a keyed relationship.
///
/// Keys must never be "null". Rust has no null reference, so each key type
/// states what its null value is; keyed operations fail with
/// [`RelationError::NullKey`] before mutating anything when handed one.
///
/// The default says a key is never null, which is right for integers and
/// other types with no sentinel value.
pub trait RelationKey: Clone + Eq + Hash + fmt::Debug {
    /// Whether this value is the null key.
    fn is_null(&self) -> bool {
        false
    }
}

impl RelationKey for String {
    fn is_null(&self) -> bool {
        self.is_empty()
    }
}

impl RelationKey for &'static str {
    fn is_null(&self) -> bool {
        self.is_empty()
    }
}

impl<T: RelationKey> RelationKey for Option<T> {
    fn is_null(&self) -> bool {
        self.as_ref().map_or(true, RelationKey::is_null)
    }
}

macro_rules! never_null_key {
    ($($ty:ty),* $(,)?) => {
        $(impl RelationKey for $ty {})*
    };
}

never_null_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool);

/// The transition a veto check is asked to approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A parent or child is about to be attached.
    Attach,
    /// A parent or child is about to be detached.
    Detach,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Attach => write!(f, "attach"),
            Action::Detach => write!(f, "detach"),
        }
    }
}

/// Outcome of a relationship mutator.
///
/// Only [`Transition::Applied`] means the graph changed. The other variants
/// all leave the graph exactly as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The structural mutation happened and hooks fired.
    Applied,
    /// The request was already satisfied (or had nothing to remove).
    Unchanged,
    /// A veto check rejected the transition.
    Vetoed,
    /// Replacing the current relation was blocked because tearing down the
    /// previous one was vetoed.
    Blocked,
}

impl Transition {
    /// Whether the graph changed.
    pub fn is_applied(self) -> bool {
        self == Transition::Applied
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Applied => write!(f, "applied"),
            Transition::Unchanged => write!(f, "unchanged"),
            Transition::Vetoed => write!(f, "vetoed"),
            Transition::Blocked => write!(f, "blocked"),
        }
    }
}
