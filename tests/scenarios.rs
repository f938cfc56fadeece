//! End-to-end scenario tests against the public `ReteEngine` API.

use rete_core::{Binding, Cond, Field, Pattern, ReteEngine, Rule, Wme};
use std::rc::Rc;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Fresh engine with the crate's `tracing` output wired to a subscriber, so a
/// failing test's `#[instrument]`/`debug!`/`trace!` spans are visible with
/// `RUST_LOG` set, matching the teacher's own `tracing_subscriber::fmt`
/// setup.
fn new_engine() -> ReteEngine {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
    ReteEngine::new()
}

fn var(name: &str) -> Field {
    Field::var(name).unwrap()
}

fn pos(id: Field, attr: &str, value: Field) -> Cond {
    Cond::Pos(Pattern::new(id, Field::constant(attr), value))
}

fn neg(id: Field, attr: &str, value: Field) -> Cond {
    Cond::Neg(Pattern::new(id, Field::constant(attr), value))
}

#[test]
fn s1_positive_chain_matches_then_unmatches_on_retract() {
    let mut engine = new_engine();
    engine
        .add_rule(Rule::new(
            "chain",
            vec![vec![pos(var("$x"), "parent", var("$y")), pos(var("$y"), "parent", var("$z"))]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    engine.assert(Wme::new("alice", "parent", "bob")).unwrap();
    engine.assert(Wme::new("bob", "parent", "carol")).unwrap();

    let matches = engine.matches("chain");
    assert_eq!(matches.len(), 1);
    let binding = &matches[0];
    assert_eq!(binding.get("$x").map(String::as_str), Some("alice"));
    assert_eq!(binding.get("$y").map(String::as_str), Some("bob"));
    assert_eq!(binding.get("$z").map(String::as_str), Some("carol"));

    engine.retract(&Wme::new("bob", "parent", "carol"));
    assert!(engine.matches("chain").is_empty());
}

#[test]
fn s2_negation_unblocks_when_the_blocking_fact_is_retracted() {
    let mut engine = new_engine();
    engine
        .add_rule(Rule::new(
            "active-person",
            vec![vec![
                pos(var("$x"), "type", Field::constant("person")),
                neg(var("$x"), "banned", Field::constant("true")),
            ]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    engine.assert(Wme::new("alice", "type", "person")).unwrap();
    assert_eq!(engine.matches("active-person").len(), 1);

    engine.assert(Wme::new("alice", "banned", "true")).unwrap();
    assert!(engine.matches("active-person").is_empty());

    engine.retract(&Wme::new("alice", "banned", "true"));
    let matches = engine.matches("active-person");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].get("$x").map(String::as_str), Some("alice"));
}

#[test]
fn s3_ncc_restores_the_match_once_the_inner_conjunction_stops_holding() {
    let mut engine = new_engine();
    engine
        .add_rule(Rule::new(
            "carless-person",
            vec![vec![
                pos(var("$x"), "type", Field::constant("person")),
                Cond::Ncc(vec![pos(var("$x"), "owns", var("$y")), pos(var("$y"), "type", Field::constant("car"))]),
            ]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    engine.assert(Wme::new("alice", "type", "person")).unwrap();
    assert_eq!(engine.matches("carless-person").len(), 1);

    engine.assert(Wme::new("alice", "owns", "v1")).unwrap();
    assert_eq!(engine.matches("carless-person").len(), 1, "owning something that isn't a car should not block");

    engine.assert(Wme::new("v1", "type", "car")).unwrap();
    assert!(engine.matches("carless-person").is_empty(), "owning a car should block the match");

    engine.retract(&Wme::new("v1", "type", "car"));
    let matches = engine.matches("carless-person");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].get("$x").map(String::as_str), Some("alice"));
}

#[test]
fn s4_disjunction_fans_out_to_one_match_per_satisfied_disjunct() {
    let mut engine = new_engine();
    engine
        .add_rule(Rule::new(
            "either",
            vec![
                vec![pos(var("$x"), "a", Field::constant("1"))],
                vec![pos(var("$x"), "b", Field::constant("2"))],
            ],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    engine.assert(Wme::new("k", "a", "1")).unwrap();
    engine.assert(Wme::new("k", "b", "2")).unwrap();

    let matches = engine.matches("either");
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|b| b.get("$x").map(String::as_str) == Some("k")));
}

#[test]
fn s5_rule_insertion_order_does_not_change_the_conflict_set() {
    // Facts asserted before the rule exists must still be picked up once the
    // rule is compiled, via priming.
    let mut before = new_engine();
    before.assert(Wme::new("alice", "parent", "bob")).unwrap();
    before.assert(Wme::new("bob", "parent", "carol")).unwrap();
    before
        .add_rule(Rule::new(
            "chain",
            vec![vec![pos(var("$x"), "parent", var("$y")), pos(var("$y"), "parent", var("$z"))]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    let mut after = new_engine();
    after
        .add_rule(Rule::new(
            "chain",
            vec![vec![pos(var("$x"), "parent", var("$y")), pos(var("$y"), "parent", var("$z"))]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();
    after.assert(Wme::new("alice", "parent", "bob")).unwrap();
    after.assert(Wme::new("bob", "parent", "carol")).unwrap();

    assert_eq!(before.matches("chain").len(), 1);
    assert_eq!(after.matches("chain").len(), 1);
    assert_eq!(before.matches("chain")[0], after.matches("chain")[0]);
}

#[test]
fn s5_ncc_rule_added_after_matching_facts_already_exist_is_primed_correctly() {
    // A stricter version of the priming property: the NCC's blocking fact
    // already exists by the time the rule is compiled, so the rule must come
    // up with zero matches rather than naively matching the outer pattern.
    let mut engine = new_engine();
    engine.assert(Wme::new("alice", "type", "person")).unwrap();
    engine.assert(Wme::new("alice", "owns", "v1")).unwrap();
    engine.assert(Wme::new("v1", "type", "car")).unwrap();

    engine
        .add_rule(Rule::new(
            "carless-person",
            vec![vec![
                pos(var("$x"), "type", Field::constant("person")),
                Cond::Ncc(vec![pos(var("$x"), "owns", var("$y")), pos(var("$y"), "type", Field::constant("car"))]),
            ]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    assert!(engine.matches("carless-person").is_empty());

    engine.retract(&Wme::new("v1", "type", "car"));
    assert_eq!(engine.matches("carless-person").len(), 1);
}

#[test]
fn ncc_priming_attributes_each_outer_token_to_its_own_sub_conjunction_matches() {
    // Two outer facts exist before the rule compiles; only one of them has a
    // blocking sub-conjunction match. Bulk priming must not let alice's
    // unrelated "owns a car" fact block bob's match, or vice versa.
    let mut engine = new_engine();
    engine.assert(Wme::new("alice", "type", "person")).unwrap();
    engine.assert(Wme::new("alice", "owns", "v1")).unwrap();
    engine.assert(Wme::new("v1", "type", "car")).unwrap();
    engine.assert(Wme::new("bob", "type", "person")).unwrap();

    engine
        .add_rule(Rule::new(
            "carless-person",
            vec![vec![
                pos(var("$x"), "type", Field::constant("person")),
                Cond::Ncc(vec![pos(var("$x"), "owns", var("$y")), pos(var("$y"), "type", Field::constant("car"))]),
            ]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    let matches = engine.matches("carless-person");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].get("$x").map(String::as_str), Some("bob"));
}

#[test]
fn s6_filter_admits_only_bindings_that_pass_the_predicate() {
    let mut engine = new_engine();
    let predicate: Rc<dyn Fn(&rete_core::Binding) -> bool> = Rc::new(|b: &rete_core::Binding| {
        b.get("$a").and_then(|v| v.parse::<i64>().ok()).map(|n| n > 18).unwrap_or(false)
    });
    engine
        .add_rule(Rule::new(
            "adults",
            vec![vec![
                pos(var("$x"), "age", var("$a")),
                Cond::Filter { vars: vec!["$a".to_string()], predicate },
            ]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    engine.assert(Wme::new("alice", "age", "21")).unwrap();
    engine.assert(Wme::new("bob", "age", "12")).unwrap();

    let matches = engine.matches("adults");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].get("$x").map(String::as_str), Some("alice"));
}

#[test]
fn bind_introduces_a_computed_variable_usable_by_later_filters() {
    let mut engine = new_engine();
    let expr: Rc<dyn Fn(&rete_core::Binding) -> String> =
        Rc::new(|b: &rete_core::Binding| (b.get("$a").unwrap().parse::<i64>().unwrap() * 2).to_string());
    let predicate: Rc<dyn Fn(&rete_core::Binding) -> bool> = Rc::new(|b: &rete_core::Binding| {
        b.get("$doubled").and_then(|v| v.parse::<i64>().ok()).map(|n| n >= 20).unwrap_or(false)
    });

    engine
        .add_rule(Rule::new(
            "doubled-at-least-20",
            vec![vec![
                pos(var("$x"), "age", var("$a")),
                Cond::Bind { var: "$doubled".to_string(), vars: vec!["$a".to_string()], expr },
                Cond::Filter { vars: vec!["$doubled".to_string()], predicate },
            ]],
            |_: &Binding| Ok(()),
        ))
        .unwrap();

    engine.assert(Wme::new("alice", "age", "11")).unwrap();
    engine.assert(Wme::new("bob", "age", "9")).unwrap();

    let matches = engine.matches("doubled-at-least-20");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].get("$x").map(String::as_str), Some("alice"));
    assert_eq!(matches[0].get("$doubled").map(String::as_str), Some("22"));
}

#[test]
fn asserting_an_already_present_wme_is_a_no_op() {
    let mut engine = new_engine();
    engine.add_rule(Rule::new("any", vec![vec![pos(var("$x"), "a", var("$y"))]], |_: &Binding| Ok(()))).unwrap();

    engine.assert(Wme::new("k", "a", "1")).unwrap();
    engine.assert(Wme::new("k", "a", "1")).unwrap();
    assert_eq!(engine.matches("any").len(), 1);
}

#[test]
fn retracting_an_absent_wme_is_a_no_op() {
    let mut engine = new_engine();
    engine.retract(&Wme::new("nothing", "here", "yet"));
}

#[test]
fn asserting_a_wme_with_a_variable_field_is_rejected() {
    let mut engine = new_engine();
    let err = engine.assert(Wme::new("$x", "a", "1")).unwrap_err();
    assert!(matches!(err, rete_core::EngineError::InvalidWme { .. }));
}

#[test]
fn unbound_variable_in_a_negated_pattern_is_rejected_at_compile_time() {
    let mut engine = new_engine();
    let err = engine
        .add_rule(Rule::new("bad", vec![vec![neg(var("$x"), "banned", Field::constant("true"))]], |_: &Binding| Ok(())))
        .unwrap_err();
    assert!(matches!(err, rete_core::EngineError::UnboundVariable { .. }));
}

#[test]
fn repeated_variable_in_one_pattern_is_rejected_at_compile_time() {
    let mut engine = new_engine();
    let err = engine
        .add_rule(Rule::new("bad", vec![vec![pos(var("$x"), "a", var("$x"))]], |_: &Binding| Ok(())))
        .unwrap_err();
    assert!(matches!(err, rete_core::EngineError::RepeatedVariable { .. }));
}

#[test]
fn empty_disjunct_is_rejected() {
    let mut engine = new_engine();
    let err = engine.add_rule(Rule::new("bad", vec![vec![]], |_: &Binding| Ok(()))).unwrap_err();
    assert!(matches!(err, rete_core::EngineError::EmptyDisjunct { .. }));
}

#[test]
fn run_fires_once_per_current_match() {
    let mut engine = new_engine();
    let fired = Rc::new(std::cell::RefCell::new(Vec::new()));
    let fired_clone = Rc::clone(&fired);
    engine
        .add_rule(Rule::new(
            "record",
            vec![vec![pos(var("$x"), "a", var("$y"))]],
            move |b: &rete_core::Binding| {
                fired_clone.borrow_mut().push(b.get("$x").cloned().unwrap());
                Ok(())
            },
        ))
        .unwrap();

    engine.assert(Wme::new("k1", "a", "1")).unwrap();
    engine.assert(Wme::new("k2", "a", "2")).unwrap();
    engine.assert(Wme::new("k3", "a", "3")).unwrap();

    let count = engine.run(None).unwrap();
    assert_eq!(count, 3);
    assert_eq!(fired.borrow().len(), 3);
}

#[test]
fn run_respects_a_firing_limit_within_a_single_call() {
    let mut engine = new_engine();
    engine.add_rule(Rule::new("record", vec![vec![pos(var("$x"), "a", var("$y"))]], |_: &Binding| Ok(()))).unwrap();

    engine.assert(Wme::new("k1", "a", "1")).unwrap();
    engine.assert(Wme::new("k2", "a", "2")).unwrap();
    engine.assert(Wme::new("k3", "a", "3")).unwrap();

    let limited = engine.run(Some(2)).unwrap();
    assert_eq!(limited, 2);
}
