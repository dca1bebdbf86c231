//! Behavioural properties of the attach/detach protocol.
//!
//! Each test drives a small forest through the public API and checks both
//! sides of every relation afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use reciprocal::core::hooks::RelationHooks;
use reciprocal::core::types::{Action, EntityId, RelationError, Transition};
use reciprocal::engine::{verify, EntitySpec, FailureCause, Forest, Operation, SlotKind, VerifyError};

/// Hook recorder shared between the test and the entities it observes.
#[derive(Clone, Default)]
struct Recorder {
    events: Rc<RefCell<Vec<(EntityId, &'static str, Option<String>, EntityId)>>>,
    owner: Rc<RefCell<Option<EntityId>>>,
}

impl Recorder {
    fn events(&self) -> Vec<(EntityId, &'static str, Option<String>, EntityId)> {
        self.events.borrow().clone()
    }

    fn count(&self) -> usize {
        self.events.borrow().len()
    }

    fn push(&self, what: &'static str, key: Option<&String>, other: EntityId) {
        let owner = self.owner.borrow().unwrap_or(EntityId::new(0));
        self.events
            .borrow_mut()
            .push((owner, what, key.cloned(), other));
    }

    /// A recorder for one entity that writes into the same event list.
    fn for_entity(&self) -> Recorder {
        Recorder {
            events: self.events.clone(),
            owner: Rc::new(RefCell::new(None)),
        }
    }
}

impl RelationHooks<String> for Recorder {
    fn on_parent_attach(&mut self, key: Option<&String>, parent: EntityId) {
        self.push("parent_attach", key, parent);
    }
    fn on_parent_detach(&mut self, key: Option<&String>, parent: EntityId) {
        self.push("parent_detach", key, parent);
    }
    fn on_child_attach(&mut self, key: Option<&String>, child: EntityId) {
        self.push("child_attach", key, child);
    }
    fn on_child_detach(&mut self, key: Option<&String>, child: EntityId) {
        self.push("child_detach", key, child);
    }
}

fn insert_recorded(forest: &mut Forest, spec: EntitySpec<String>, log: &Recorder) -> EntityId {
    let recorder = log.for_entity();
    let owner = recorder.owner.clone();
    let id = forest.insert(spec.hooks(recorder));
    *owner.borrow_mut() = Some(id);
    id
}

fn key(s: &str) -> String {
    s.to_string()
}

// =============================================================================
// Idempotency
// =============================================================================

#[test]
fn attach_parent_twice_is_idempotent() {
    let log = Recorder::default();
    let mut forest: Forest = Forest::new();
    let p = insert_recorded(&mut forest, EntitySpec::bidirectional(), &log);
    let c = insert_recorded(&mut forest, EntitySpec::bidirectional(), &log);

    assert_eq!(forest.attach_parent(c, p).unwrap(), Transition::Applied);
    let events_after_first = log.events();

    assert_eq!(forest.attach_parent(c, p).unwrap(), Transition::Unchanged);
    assert_eq!(log.events(), events_after_first);
    assert_eq!(forest.parent(c), Some(p));
    assert_eq!(forest.children(p), vec![c]);
}

#[test]
fn keyed_attach_twice_is_idempotent() {
    let log = Recorder::default();
    let mut forest: Forest = Forest::new();
    let p = insert_recorded(&mut forest, EntitySpec::keyed_bidirectional(), &log);
    let c = insert_recorded(&mut forest, EntitySpec::keyed_bidirectional(), &log);

    forest.attach_keyed_child(p, key("k"), c, None).unwrap();
    let count = log.count();
    assert_eq!(
        forest.attach_keyed_child(p, key("k"), c, None).unwrap(),
        Transition::Unchanged
    );
    assert_eq!(
        forest.attach_keyed_parent(c, key("k"), p, None).unwrap(),
        Transition::Unchanged
    );
    assert_eq!(log.count(), count);
}

#[test]
fn detaching_nothing_is_a_no_op() {
    let log = Recorder::default();
    let mut forest: Forest = Forest::new();
    let p = insert_recorded(&mut forest, EntitySpec::bidirectional(), &log);
    let c = insert_recorded(&mut forest, EntitySpec::keyed_bidirectional(), &log);

    assert_eq!(forest.detach_parent(c).unwrap(), Transition::Unchanged);
    assert_eq!(forest.detach_child(p, c).unwrap(), Transition::Unchanged);
    assert_eq!(forest.detach_keyed_parent(c, None).unwrap(), Transition::Unchanged);
    assert_eq!(log.count(), 0);
}

// =============================================================================
// Symmetry and hook order
// =============================================================================

#[test]
fn attach_parent_is_symmetric() {
    let mut forest: Forest = Forest::new();
    let a = forest.insert(EntitySpec::bidirectional());
    let b = forest.insert(EntitySpec::bidirectional());

    forest.attach_parent(a, b).unwrap();

    assert_eq!(forest.parent(a), Some(b));
    assert!(forest.is_child_attached(b, a));
    assert!(verify(&forest).ok);
}

#[test]
fn hooks_fire_once_per_side_after_the_mutation() {
    let log = Recorder::default();
    let mut forest: Forest = Forest::new();
    let p = insert_recorded(&mut forest, EntitySpec::keyed_bidirectional(), &log);
    let c = insert_recorded(&mut forest, EntitySpec::keyed_bidirectional(), &log);

    forest.attach_keyed_child(p, key("a"), c, Some(key("up"))).unwrap();
    forest.detach_keyed_child(p, &key("a")).unwrap();

    assert_eq!(
        log.events(),
        vec![
            (c, "parent_attach", Some(key("up")), p),
            (p, "child_attach", Some(key("a")), c),
            (c, "parent_detach", Some(key("up")), p),
            (p, "child_detach", Some(key("a")), c),
        ]
    );
}

// =============================================================================
// Replacement
// =============================================================================

#[test]
fn replacement_tears_down_old_link() {
    let mut forest: Forest = Forest::new();
    let p1 = forest.insert(EntitySpec::bidirectional());
    let p2 = forest.insert(EntitySpec::bidirectional());
    let a = forest.insert(EntitySpec::bidirectional());

    forest.attach_parent(a, p1).unwrap();
    forest.attach_parent(a, p2).unwrap();

    assert!(!forest.is_child_attached(p1, a));
    assert!(forest.is_child_attached(p2, a));
    assert_eq!(forest.parent(a), Some(p2));
    assert!(verify(&forest).ok);
}

#[test]
fn keyed_replacement_tears_down_old_link() {
    let mut forest: Forest = Forest::new();
    let p1 = forest.insert(EntitySpec::keyed_bidirectional());
    let p2 = forest.insert(EntitySpec::keyed_bidirectional());
    let a = forest.insert(EntitySpec::keyed_bidirectional());

    forest.attach_keyed_parent(a, key("x"), p1, None).unwrap();
    forest.attach_keyed_parent(a, key("y"), p2, None).unwrap();

    assert!(forest.child_keys(p1).is_empty());
    assert_eq!(forest.child(p2, &key("y")), Some(a));
    assert_eq!(forest.parent_key(a), Some(&key("y")));
    assert!(verify(&forest).ok);
}

// =============================================================================
// Veto
// =============================================================================

#[test]
fn veto_blocks_all_mutation() {
    let log = Recorder::default();
    let mut forest: Forest = Forest::new();
    let p = insert_recorded(&mut forest, EntitySpec::bidirectional(), &log);
    let c = insert_recorded(
        &mut forest,
        EntitySpec::bidirectional().parent_check(|p| p.action != Action::Attach),
        &log,
    );

    assert_eq!(forest.attach_parent(c, p).unwrap(), Transition::Vetoed);
    assert_eq!(forest.parent(c), None);
    assert!(forest.children(p).is_empty());
    assert_eq!(log.count(), 0);
}

#[test]
fn counterpart_veto_leaves_local_change_standing() {
    let mut forest: Forest = Forest::new();
    let p = forest.insert(EntitySpec::bidirectional());
    let c = forest.insert(
        EntitySpec::bidirectional().parent_check(|p| p.action != Action::Attach),
    );

    assert_eq!(forest.attach_child(p, c).unwrap(), Transition::Applied);
    assert_eq!(forest.children(p), vec![c]);
    assert_eq!(forest.parent(c), None);

    let failures: Vec<_> = forest.reciprocation_failures().cloned().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].origin, p);
    assert_eq!(failures[0].target, c);
    assert_eq!(failures[0].operation, Operation::AttachParent);
    assert_eq!(failures[0].cause, FailureCause::Vetoed);
    assert!(!verify(&forest).ok);
}

#[test]
fn removing_a_check_lifts_the_veto() {
    let mut forest: Forest = Forest::new();
    let p = forest.insert(EntitySpec::bidirectional().checked_children());
    let c = forest.insert(EntitySpec::bidirectional());

    let veto = forest.child_checks_mut(p).unwrap().add(|_| false);
    assert_eq!(forest.attach_child(p, c).unwrap(), Transition::Vetoed);

    assert!(forest.child_checks_mut(p).unwrap().remove(veto));
    assert_eq!(forest.attach_child(p, c).unwrap(), Transition::Applied);
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn four_ring_forms_and_reparents_cleanly() {
    let mut forest: Forest = Forest::new();
    let n: Vec<EntityId> = (0..4)
        .map(|_| forest.insert(EntitySpec::bidirectional()))
        .collect();

    for i in 0..4 {
        assert_eq!(
            forest.attach_child(n[i], n[(i + 1) % 4]).unwrap(),
            Transition::Applied
        );
    }
    for i in 0..4 {
        assert_eq!(forest.parent(n[i]), Some(n[(i + 3) % 4]));
        assert_eq!(forest.children(n[i]), vec![n[(i + 1) % 4]]);
    }

    assert_eq!(forest.attach_parent(n[3], n[1]).unwrap(), Transition::Applied);

    assert_eq!(forest.parent(n[3]), Some(n[1]));
    assert!(forest.children(n[2]).is_empty());
    assert_eq!(forest.children(n[1]), vec![n[2], n[3]]);
    // Unrelated links untouched.
    assert_eq!(forest.parent(n[0]), Some(n[3]));
    assert_eq!(forest.children(n[3]), vec![n[0]]);
    assert_eq!(forest.parent(n[1]), Some(n[0]));
    assert_eq!(forest.parent(n[2]), Some(n[1]));
    assert!(verify(&forest).ok);
    assert_eq!(forest.reciprocation_failures().len(), 0);
}

#[test]
fn keyed_self_reference_round_trips() {
    let mut forest: Forest = Forest::new();
    let n = forest.insert(EntitySpec::keyed_bidirectional());

    assert_eq!(
        forest.attach_keyed_child(n, key("."), n, None).unwrap(),
        Transition::Applied
    );
    assert_eq!(forest.child(n, &key(".")), Some(n));
    assert_eq!(forest.parent(n), Some(n));

    assert_eq!(forest.detach_keyed_child(n, &key(".")).unwrap(), Transition::Applied);
    assert!(forest.child_keys(n).is_empty());
    assert_eq!(forest.parent(n), None);
}

// =============================================================================
// Keys
// =============================================================================

#[test]
fn second_child_under_same_key_overwrites() {
    let mut forest: Forest = Forest::new();
    let p = forest.insert(EntitySpec::keyed_bidirectional());
    let first = forest.insert(EntitySpec::keyed_bidirectional());
    let second = forest.insert(EntitySpec::keyed_bidirectional());

    forest.attach_keyed_child(p, key("k"), first, None).unwrap();
    assert_eq!(
        forest.attach_keyed_child(p, key("k"), first, None).unwrap(),
        Transition::Unchanged
    );
    assert_eq!(
        forest.attach_keyed_child(p, key("k"), second, None).unwrap(),
        Transition::Applied
    );

    assert_eq!(forest.child(p, &key("k")), Some(second));
    assert_eq!(forest.parent(first), None);
    assert!(verify(&forest).ok);
}

#[test]
fn null_key_leaves_map_untouched() {
    let mut forest: Forest = Forest::new();
    let p = forest.insert(EntitySpec::keyed_bidirectional());
    let c = forest.insert(EntitySpec::keyed_bidirectional());
    forest.attach_keyed_child(p, key("k"), c, None).unwrap();

    assert_eq!(
        forest.attach_keyed_child(p, String::new(), c, None),
        Err(RelationError::NullKey)
    );
    assert_eq!(forest.child_keys(p), vec![key("k")]);
    assert_eq!(forest.parent_key(c), Some(&key("k")));
}

#[test]
fn custom_keys_use_independent_namespaces() {
    let mut forest: Forest = Forest::new();
    let parent = forest.insert(EntitySpec::keyed_bidirectional());
    let child = forest.insert(EntitySpec::keyed_bidirectional());

    forest
        .attach_keyed_parent(child, key("keyA"), parent, Some(key("keyB")))
        .unwrap();

    assert_eq!(forest.child(parent, &key("keyB")), Some(child));
    assert_eq!(forest.parent_key(child), Some(&key("keyA")));
    assert!(!forest.is_child_key_attached(parent, &key("keyA")));
    assert!(verify(&forest).ok);
}

#[test]
fn integer_keys_are_never_null() {
    let mut forest: Forest<u32> = Forest::new();
    let p = forest.insert(EntitySpec::keyed_bidirectional());
    let c = forest.insert(EntitySpec::keyed_bidirectional());

    assert_eq!(forest.attach_keyed_child(p, 0, c, None).unwrap(), Transition::Applied);
    assert_eq!(forest.child(p, &0), Some(c));
    assert_eq!(forest.parent_key(c), Some(&0));
}

// =============================================================================
// Mixed roles
// =============================================================================

#[test]
fn one_sided_entities_do_not_fail_operations() {
    let mut forest: Forest = Forest::new();
    let bag = forest.insert(EntitySpec::new().with_children(SlotKind::Keyed));
    let token = forest.insert(EntitySpec::new());
    let tag = forest.insert(EntitySpec::new().with_parent(SlotKind::Unkeyed));

    assert_eq!(
        forest.attach_keyed_child(bag, key("t"), token, None).unwrap(),
        Transition::Applied
    );
    assert_eq!(forest.attach_parent(tag, token).unwrap(), Transition::Applied);

    assert_eq!(forest.child(bag, &key("t")), Some(token));
    assert_eq!(forest.parent(tag), Some(token));
    assert_eq!(forest.reciprocation_failures().len(), 0);
    assert!(verify(&forest).ok);
}

#[test]
fn unkeyed_side_reports_keyed_counterpart_it_cannot_reach() {
    let mut forest: Forest = Forest::new();
    let bag = forest.insert(EntitySpec::new().with_children(SlotKind::Keyed));
    let tag = forest.insert(EntitySpec::new().with_parent(SlotKind::Unkeyed));

    assert_eq!(forest.attach_parent(tag, bag).unwrap(), Transition::Applied);
    assert_eq!(forest.parent(tag), Some(bag));

    let causes: Vec<_> = forest
        .reciprocation_failures()
        .map(|failure| failure.cause.clone())
        .collect();
    assert_eq!(causes, vec![FailureCause::KeyRequired]);
    assert_eq!(
        verify(&forest).errors,
        vec![VerifyError::MissingChildEntry {
            child: tag,
            parent: bag,
        }]
    );
}
