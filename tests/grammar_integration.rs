//! Integration tests for rules, grammars and cross-rule invalidation

use jsgf_match::builder::{alt, lit, opt, rule_object, rule_ref, seq};
use jsgf_match::{ExpansionArena, ExpansionError, GrammarDef, GrammarId, RuleDef, RuleId};

fn rule(arena: &ExpansionArena, grammar: GrammarId, name: &str) -> RuleId {
    arena.get_rule_by_name(grammar, name).unwrap()
}

// ============================================================================
// Cross-rule invalidation
// ============================================================================

#[test]
fn test_new_alternative_reaches_referencing_rule() {
    let mut arena = ExpansionArena::new();
    let def = GrammarDef::new("g")
        .rule(RuleDef::new("n", alt([lit("one"), lit("two")])))
        .rule(RuleDef::new("r", seq([lit("go"), rule_ref("n")])));
    let g = arena.build_grammar(&def).unwrap();
    let n = rule(&arena, g, "n");
    let r = rule(&arena, g, "r");

    assert!(arena.matches(r, "go one").unwrap());
    assert!(!arena.matches(r, "go three").unwrap());

    let n_alt = arena.rule(n).root();
    let three = arena.new_literal("three");
    arena.append_child(n_alt, three).unwrap();

    let r_root = arena.rule(r).root();
    assert!(!arena.node(r_root).is_compiled());
    assert!(arena.matches(r, "go three").unwrap());
    assert_eq!(arena.current_match(three), Some("three"));
}

#[test]
fn test_literal_edit_reaches_object_reference() {
    let mut arena = ExpansionArena::new();
    let def = GrammarDef::new("g")
        .rule(RuleDef::hidden("thing", lit("lamp")))
        .rule(RuleDef::new("cmd", seq([lit("switch"), rule_object("g.thing")])));
    let g = arena.build_grammar(&def).unwrap();
    let thing = rule(&arena, g, "thing");
    let cmd = rule(&arena, g, "cmd");

    assert!(arena.matches(cmd, "switch lamp").unwrap());
    let literal = arena.rule(thing).root();
    arena.set_literal_text(literal, "heater").unwrap();
    assert!(arena.matches(cmd, "switch heater").unwrap());
    assert!(!arena.matches(cmd, "switch lamp").unwrap());
}

#[test]
fn test_replacing_rule_expansion() {
    let mut arena = ExpansionArena::new();
    let def = GrammarDef::new("g")
        .rule(RuleDef::new("n", lit("one")))
        .rule(RuleDef::new("r", seq([lit("go"), rule_ref("n")])));
    let g = arena.build_grammar(&def).unwrap();
    let n = rule(&arena, g, "n");
    let r = rule(&arena, g, "r");
    assert!(arena.matches(r, "go one").unwrap());

    let replacement = arena.new_literal("uno");
    arena.set_rule_expansion(n, replacement).unwrap();
    assert!(arena.matches(r, "go uno").unwrap());
    assert!(!arena.matches(r, "go one").unwrap());
}

#[test]
fn test_adding_rule_resolves_pending_reference() {
    let mut arena = ExpansionArena::new();
    let def = GrammarDef::new("g").rule(RuleDef::new("r", seq([lit("go"), rule_ref("n")])));
    let g = arena.build_grammar(&def).unwrap();
    let r = rule(&arena, g, "r");
    assert!(arena.matches(r, "go home").unwrap_err().is_reference_error());

    let home = arena.new_literal("home");
    let n = arena.new_rule("n", false, home).unwrap();
    arena.add_rule(g, n).unwrap();
    assert!(arena.matches(r, "go home").unwrap());
}

// ============================================================================
// Membership and integrity
// ============================================================================

#[test]
fn test_dependent_rule_removal() {
    let mut arena = ExpansionArena::new();
    let def = GrammarDef::new("g")
        .rule(RuleDef::new("r1", seq([lit("a"), rule_ref("r2")])))
        .rule(RuleDef::new("r2", lit("b")));
    let g = arena.build_grammar(&def).unwrap();
    let r1 = rule(&arena, g, "r1");
    let r2 = rule(&arena, g, "r2");
    assert_eq!(arena.dependencies(r1), vec![r2]);
    assert_eq!(arena.dependent_rules(r2), vec![r1]);

    let err = arena.remove_rule(g, r2, false).unwrap_err();
    assert!(matches!(err, ExpansionError::GrammarIntegrity { .. }));
    assert!(arena.get_rule_by_name(g, "r2").is_some());

    arena.remove_rule(g, r2, true).unwrap();
    assert!(arena.get_rule_by_name(g, "r2").is_none());
    assert!(!arena.dependencies(r1).contains(&r2));
    assert!(arena.matches(r1, "a b").unwrap_err().is_reference_error());
}

#[test]
fn test_duplicate_and_reserved_names() {
    let mut arena = ExpansionArena::new();
    let g = arena.new_grammar("g");
    let a = arena.new_literal("a");
    let first = arena.new_rule("cmd", true, a).unwrap();
    arena.add_rule(g, first).unwrap();
    // Adding twice is a no-op
    arena.add_rule(g, first).unwrap();
    assert_eq!(arena.grammar(g).rules(), &[first]);

    let b = arena.new_literal("b");
    let second = arena.new_rule("cmd", true, b).unwrap();
    assert!(matches!(
        arena.add_rule(g, second),
        Err(ExpansionError::GrammarIntegrity { .. })
    ));

    let c = arena.new_literal("c");
    assert!(matches!(
        arena.new_rule("NULL", true, c),
        Err(ExpansionError::GrammarIntegrity { .. })
    ));
    assert!(arena.new_rule("two words", true, c).is_err());
}

#[test]
fn test_rule_from_another_grammar_rejected() {
    let mut arena = ExpansionArena::new();
    let g1 = arena.new_grammar("one");
    let g2 = arena.new_grammar("two");
    let x = arena.new_literal("x");
    let r = arena.new_rule("r", true, x).unwrap();
    arena.add_rule(g1, r).unwrap();
    assert!(arena.add_rule(g2, r).is_err());
    assert_eq!(arena.fully_qualified_name(r), "one.r");
}

#[test]
fn test_lookup_helpers() {
    let mut arena = ExpansionArena::new();
    let def = GrammarDef::new("g")
        .rule(RuleDef::new("greet", seq([lit("hello"), opt(lit("there").tagged("polite"))])))
        .rule(RuleDef::hidden("name", lit("bob").tagged("person")))
        .rule(RuleDef::new("bye", lit("bye")));
    let g = arena.build_grammar(&def).unwrap();
    let greet = rule(&arena, g, "greet");
    let name = rule(&arena, g, "name");
    let bye = rule(&arena, g, "bye");

    assert_eq!(arena.visible_rules(g), vec![greet, bye]);
    assert_eq!(arena.get_rules_from_names(g, &["bye", "greet"]).unwrap(), vec![bye, greet]);
    assert!(arena.get_rules_from_names(g, &["bye", "nope"]).is_err());

    assert_eq!(arena.find_tagged_rules(g, "person", false), Vec::<RuleId>::new());
    assert_eq!(arena.find_tagged_rules(g, " person ", true), vec![name]);
    assert!(arena.rule_has_tag(greet, "polite"));

    assert_eq!(arena.find_matching_rules(g, "hello there").unwrap(), vec![greet]);
    assert_eq!(arena.find_matching_rules(g, "bob").unwrap(), Vec::<RuleId>::new());

    arena.disable_rule_by_name(g, "greet").unwrap();
    assert!(arena.find_matching_rules(g, "hello").unwrap().is_empty());
    arena.enable_rule_by_name(g, "greet").unwrap();
    assert_eq!(arena.find_matching_rules(g, "hello").unwrap(), vec![greet]);
}

#[test]
fn test_tags_of_match() {
    let mut arena = ExpansionArena::new();
    let def = GrammarDef::new("g")
        .rule(RuleDef::hidden("item", alt([lit("tea").tagged("tea"), lit("coffee").tagged("coffee")])))
        .rule(RuleDef::new("order", seq([lit("a"), rule_ref("item"), opt(lit("please").tagged("polite"))])));
    let g = arena.build_grammar(&def).unwrap();
    let order = rule(&arena, g, "order");

    assert_eq!(arena.get_tags_matching(order, "a coffee").unwrap(), vec!["coffee".to_string()]);
    assert_eq!(
        arena.get_tags_matching(order, "a tea please").unwrap(),
        vec!["tea".to_string(), "polite".to_string()]
    );
    assert!(arena.get_tags_matching(order, "a beer").unwrap().is_empty());
    assert_eq!(arena.rule_tags(order), vec!["polite".to_string()]);
}
