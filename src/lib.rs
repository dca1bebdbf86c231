//! Reciprocal - bidirectional parent/child relationships
//!
//! Reciprocal keeps both sides of a parent/child relationship in agreement.
//! Attaching a child to a parent also sets the child's parent pointer, and
//! the reverse holds for every attach and detach, keyed or unkeyed.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, capability traits, checks, hooks and config
//! - [`engine`] - The [`Forest`](engine::Forest) arena and the relationship
//!   protocol that runs on it
//!
//! Entities live in a [`Forest`](engine::Forest) and are addressed by
//! [`EntityId`](core::types::EntityId). Each entity declares which sides of
//! a relationship it supports (unkeyed or keyed parent, unkeyed or keyed
//! children) and whether either side runs veto checks.
//!
//! # Best-effort reciprocation
//!
//! Every mutation first changes the entity it was called on, then asks the
//! other side to follow. The other side may decline: it may lack the
//! matching capability, or its own checks may veto. When that happens the
//! local change stands and the two sides are left asymmetric. The failure
//! is logged through `tracing` and recorded on the forest (see
//! [`Forest::reciprocation_failures`](engine::Forest::reciprocation_failures)),
//! but it is never returned to the caller.
//!
//! Callers who need strict symmetry should check
//! [`verify`](engine::verify::verify) after a sequence of operations.
//!
//! # Example
//!
//! ```
//! use reciprocal::core::types::Transition;
//! use reciprocal::engine::{EntitySpec, Forest};
//!
//! let mut forest: Forest = Forest::new();
//! let folder = forest.insert(EntitySpec::bidirectional());
//! let file = forest.insert(EntitySpec::bidirectional());
//!
//! assert_eq!(forest.attach_child(folder, file).unwrap(), Transition::Applied);
//! assert_eq!(forest.parent(file), Some(folder));
//! assert_eq!(forest.attach_parent(file, folder).unwrap(), Transition::Unchanged);
//! ```

pub mod core;
pub mod engine;
