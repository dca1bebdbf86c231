//! engine::reciprocate
//!
//! Choosing how the other side of a relationship follows a change, and
//! settling the outcome when it does not.
//!
//! # Strategy
//!
//! The strategy is read from the counterpart's role, never from a type
//! test:
//!
//! | counterpart role | reciprocal call                           |
//! |------------------|-------------------------------------------|
//! | absent           | none                                      |
//! | unkeyed          | the unkeyed public entry point            |
//! | keyed            | the keyed public entry point, with keys   |
//!
//! # Settling
//!
//! A reciprocal call that returns `Applied` or `Unchanged` is a success.
//! Anything else (a precondition error, a veto, a blocked replacement) is a
//! [`ReciprocationFailure`]: it is reported through `tracing` at the
//! configured level and kept in the forest's bounded failure log. It never
//! reaches the caller of the operation that triggered it.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use super::entity::{ChildSlot, ParentSlot};
use super::Forest;
use crate::core::config::FailureLogLevel;
use crate::core::types::{EntityId, RelationError, Transition};

/// Which public entry point a reciprocal call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AttachParent,
    DetachParent,
    AttachChild,
    DetachChild,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AttachParent => write!(f, "attach parent"),
            Operation::DetachParent => write!(f, "detach parent"),
            Operation::AttachChild => write!(f, "attach child"),
            Operation::DetachChild => write!(f, "detach child"),
        }
    }
}

/// Why a reciprocal call did not take effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The call was rejected before mutating anything.
    Error(RelationError),
    /// The counterpart's own checks vetoed it.
    Vetoed,
    /// The counterpart could not release its current relation.
    Blocked,
    /// The counterpart still holds the entity, under a key other than the
    /// one the detach asked for.
    KeyMismatch,
    /// The counterpart's role is keyed and the call had no key to give it.
    KeyRequired,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Error(err) => write!(f, "{}", err),
            FailureCause::Vetoed => write!(f, "vetoed"),
            FailureCause::Blocked => write!(f, "blocked"),
            FailureCause::KeyMismatch => write!(f, "held under a different key"),
            FailureCause::KeyRequired => write!(f, "counterpart needs a key"),
        }
    }
}

/// A reciprocal call that left the two sides asymmetric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReciprocationFailure {
    /// The entity whose change triggered the call.
    pub origin: EntityId,
    /// The counterpart that was asked to follow.
    pub target: EntityId,
    /// The entry point called on the counterpart.
    pub operation: Operation,
    /// What went wrong.
    pub cause: FailureCause,
}

/// How a counterpart can follow a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reciprocation {
    None,
    Unkeyed,
    Keyed,
}

impl<K> Forest<K> {
    /// Strategy for reaching the parent side of `id`.
    pub(crate) fn parent_strategy(&self, id: EntityId) -> Reciprocation {
        match self.parent_slot(id) {
            None | Some(ParentSlot::Absent) => Reciprocation::None,
            Some(ParentSlot::Unkeyed(_)) => Reciprocation::Unkeyed,
            Some(ParentSlot::Keyed(_)) => Reciprocation::Keyed,
        }
    }

    /// Strategy for reaching the children side of `id`.
    pub(crate) fn children_strategy(&self, id: EntityId) -> Reciprocation {
        match self.child_slot(id) {
            None | Some(ChildSlot::Absent) => Reciprocation::None,
            Some(ChildSlot::Unkeyed(_)) => Reciprocation::Unkeyed,
            Some(ChildSlot::Keyed(_)) => Reciprocation::Keyed,
        }
    }

    /// Record the outcome of a reciprocal call if it did not succeed.
    pub(crate) fn settle(
        &mut self,
        origin: EntityId,
        target: EntityId,
        operation: Operation,
        result: Result<Transition, RelationError>,
    ) {
        let cause = match result {
            Ok(Transition::Applied) | Ok(Transition::Unchanged) => return,
            Ok(Transition::Vetoed) => FailureCause::Vetoed,
            Ok(Transition::Blocked) => FailureCause::Blocked,
            Err(err) => FailureCause::Error(err),
        };

        self.record_failure(ReciprocationFailure {
            origin,
            target,
            operation,
            cause,
        });
    }

    /// Report a failure and append it to the bounded log.
    pub(crate) fn record_failure(&mut self, failure: ReciprocationFailure) {
        match self.config.failure_log_level() {
            FailureLogLevel::Off => {}
            FailureLogLevel::Debug => debug!(
                origin = %failure.origin,
                target = %failure.target,
                operation = %failure.operation,
                cause = %failure.cause,
                "reciprocation failed"
            ),
            FailureLogLevel::Warn => warn!(
                origin = %failure.origin,
                target = %failure.target,
                operation = %failure.operation,
                cause = %failure.cause,
                "reciprocation failed"
            ),
        }

        let capacity = self.config.failure_log_capacity();
        if capacity == 0 {
            return;
        }
        while self.failures.len() >= capacity {
            self.failures.pop_front();
        }
        self.failures.push_back(failure);
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::config::Config;
    use crate::engine::{EntitySpec, SlotKind};

    /// In-memory log sink shared with a scoped subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Record one failure under `level` and return what was logged.
    fn logged_at(level: &str) -> String {
        let toml = format!("[reciprocation]\nfailure_log_level = \"{}\"\n", level);
        let mut forest: Forest = Forest::with_config(Config::from_toml_str(&toml).unwrap());

        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || forest.record_failure(failure(1)));

        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn failure(n: u64) -> ReciprocationFailure {
        ReciprocationFailure {
            origin: EntityId::new(n),
            target: EntityId::new(n + 1),
            operation: Operation::AttachChild,
            cause: FailureCause::Vetoed,
        }
    }

    #[test]
    fn strategy_follows_roles() {
        let mut forest: Forest = Forest::new();
        let none = forest.insert(EntitySpec::new());
        let unkeyed = forest.insert(EntitySpec::bidirectional());
        let mixed = forest.insert(
            EntitySpec::new()
                .with_parent(SlotKind::Keyed)
                .with_children(SlotKind::Unkeyed),
        );

        assert_eq!(forest.parent_strategy(none), Reciprocation::None);
        assert_eq!(forest.children_strategy(none), Reciprocation::None);
        assert_eq!(forest.parent_strategy(unkeyed), Reciprocation::Unkeyed);
        assert_eq!(forest.parent_strategy(mixed), Reciprocation::Keyed);
        assert_eq!(forest.children_strategy(mixed), Reciprocation::Unkeyed);
        assert_eq!(
            forest.parent_strategy(EntityId::new(99)),
            Reciprocation::None
        );
    }

    #[test]
    fn successful_outcomes_are_not_recorded() {
        let mut forest: Forest = Forest::new();
        let (a, b) = (EntityId::new(1), EntityId::new(2));
        forest.settle(a, b, Operation::AttachParent, Ok(Transition::Applied));
        forest.settle(a, b, Operation::AttachParent, Ok(Transition::Unchanged));
        assert_eq!(forest.reciprocation_failures().len(), 0);

        forest.settle(a, b, Operation::DetachChild, Ok(Transition::Blocked));
        forest.settle(a, b, Operation::DetachChild, Err(RelationError::NullKey));
        let causes: Vec<_> = forest
            .reciprocation_failures()
            .map(|f| f.cause.clone())
            .collect();
        assert_eq!(
            causes,
            vec![
                FailureCause::Blocked,
                FailureCause::Error(RelationError::NullKey)
            ]
        );
    }

    #[test]
    fn log_keeps_most_recent_entries() {
        let config = Config::from_toml_str("[reciprocation]\nfailure_log_capacity = 2\n").unwrap();
        let mut forest: Forest = Forest::with_config(config);
        for n in 1..=3 {
            forest.record_failure(failure(n));
        }

        let origins: Vec<_> = forest.reciprocation_failures().map(|f| f.origin).collect();
        assert_eq!(origins, vec![EntityId::new(2), EntityId::new(3)]);

        forest.clear_reciprocation_failures();
        assert_eq!(forest.reciprocation_failures().len(), 0);
    }

    #[test]
    fn zero_capacity_disables_recording() {
        let config = Config::from_toml_str(
            "[reciprocation]\nfailure_log_capacity = 0\nfailure_log_level = \"off\"\n",
        )
        .unwrap();
        let mut forest: Forest = Forest::with_config(config);
        forest.record_failure(failure(1));
        assert_eq!(forest.reciprocation_failures().len(), 0);
    }

    #[test]
    fn failures_serialize_for_reports() {
        let json = serde_json::to_value(ReciprocationFailure {
            origin: EntityId::new(3),
            target: EntityId::new(4),
            operation: Operation::DetachParent,
            cause: FailureCause::Error(RelationError::EntityNotFound(EntityId::new(4))),
        })
        .unwrap();

        assert_eq!(json["origin"], 3);
        assert_eq!(json["operation"], "detach_parent");
        assert_eq!(json["cause"]["error"]["entity_not_found"], 4);
    }

    #[test]
    fn failure_log_level_controls_emission() {
        assert_eq!(logged_at("off"), "");

        let debug = logged_at("debug");
        assert!(debug.contains("DEBUG"), "{}", debug);
        assert!(debug.contains("reciprocation failed"));
        assert!(debug.contains("cause=vetoed"));

        let warn = logged_at("warn");
        assert!(warn.contains("WARN"), "{}", warn);
        assert!(warn.contains("reciprocation failed"));
        assert!(warn.contains("origin=#1"));
    }
}
