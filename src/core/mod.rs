//! core
//!
//! Core domain types and contracts for reciprocal relationships.
//!
//! # Modules
//!
//! - [`types`] - Strong types: EntityId, RelationKey, Transition, errors
//! - [`capabilities`] - Capability enumeration and the parent/children traits
//! - [`checks`] - Veto predicates and ordered check chains
//! - [`hooks`] - Lifecycle hooks fired after a transition
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Capabilities are data, so reciprocation never needs downcasting
//! - Checks are pure reads of the graph

pub mod capabilities;
pub mod checks;
pub mod config;
pub mod hooks;
pub mod types;
