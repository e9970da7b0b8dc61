//! Integration tests for selector matching through the engine.
//!
//! Covers both matching paths:
//! - Direct token matching for flat selector groups
//! - Synthetic-tree matching for groups with structural combinators,
//!   which needs a [`FileContext`]

use chss::engine::{ChssEngine, FileContext};
use chss::parser::parse_sheet;
use chss::tokens::{SymbolInfo, Token, TokenIndex};
use chss::types::geometry::SourceRange;

fn token(name: &str, kind: &str, line: u32, character: u32, modifiers: &[&str]) -> Token {
    Token {
        name: name.to_string(),
        range: SourceRange::of(line, character, line, character + name.len() as u32),
        offset: line * 100 + character,
        kind: kind.to_string(),
        modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
        index: 0,
    }
}

fn symbol(name: &str, kind: &str, range: SourceRange, selection: SourceRange) -> SymbolInfo {
    SymbolInfo {
        name: name.to_string(),
        kind: kind.to_string(),
        range,
        selection_range: selection,
        children: Vec::new(),
    }
}

// class App { run() { config.port } }
fn fixture() -> (TokenIndex, FileContext) {
    let text = "class App {\n  run() {\n    config.port\n  }\n}\n";
    let mut app = symbol(
        "App",
        "class",
        SourceRange::of(0, 0, 4, 1),
        SourceRange::of(0, 6, 0, 9),
    );
    app.children.push(symbol(
        "run",
        "method",
        SourceRange::of(1, 2, 3, 3),
        SourceRange::of(1, 2, 1, 5),
    ));
    let tokens = TokenIndex::from_tokens(vec![
        token("App", "class", 0, 6, &["declaration"]),
        token("run", "method", 1, 2, &["declaration"]),
        token("config", "variable", 2, 4, &[]),
        token("port", "property", 2, 11, &[]),
    ]);
    let context = FileContext {
        path: "/work/src/app.ts".to_string(),
        language: "typescript".to_string(),
        version: 1,
        text: text.to_string(),
        symbols: vec![app],
    };
    (tokens, context)
}

// ============================================================================
// DIRECT MATCHING
// ============================================================================

#[test]
fn test_comma_group_matches_each_alternative() {
    let (tokens, _) = fixture();
    let rules = parse_sheet("App, run { color: red }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens, None);
    assert_eq!(matches.len(), 2);
}

#[test]
fn test_descendant_chain_without_context_falls_back_to_tokens() {
    let (tokens, _) = fixture();
    let rules = parse_sheet("App run { color: red }");
    let mut engine = ChssEngine::new(false);

    // No context, no tree: each chain member matches on its own.
    let matches = engine.process(&rules, &tokens, None);
    assert_eq!(matches.len(), 2);
}

#[test]
fn test_modifier_group_semantics() {
    let (tokens, context) = fixture();
    let rules = parse_sheet(":declaration { color: red }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens, Some(&context));
    assert_eq!(matches.len(), 2); // App and run

    let rules = parse_sheet("[variable/property]:none { color: red }");
    let matches = engine.process(&rules, &tokens, Some(&context));
    assert_eq!(matches.len(), 2); // config and port carry no modifiers
}

// ============================================================================
// TREE MATCHING
// ============================================================================

#[test]
fn test_descendant_chain_with_context_uses_nesting() {
    let (tokens, context) = fixture();
    let rules = parse_sheet("App run { color: red }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens, Some(&context));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].range, SourceRange::of(1, 2, 1, 5));
}

#[test]
fn test_child_combinator_needs_direct_parent() {
    let (tokens, context) = fixture();
    let mut engine = ChssEngine::new(false);

    // `port` chains under `config` through the accessor.
    let rules = parse_sheet("config > port { color: red }");
    let matches = engine.process(&rules, &tokens, Some(&context));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].range, SourceRange::of(2, 11, 2, 15));

    // `port` is a grandchild of `run`.
    let rules = parse_sheet("run > port { color: red }");
    assert!(engine.process(&rules, &tokens, Some(&context)).is_empty());

    let rules = parse_sheet("run port { color: red }");
    assert_eq!(engine.process(&rules, &tokens, Some(&context)).len(), 1);
}

#[test]
fn test_kind_chain_over_tree() {
    let (tokens, context) = fixture();
    let rules = parse_sheet("[class] [variable] > [property] { color: red }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens, Some(&context));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].range, SourceRange::of(2, 11, 2, 15));
}

#[test]
fn test_negation_inside_a_chain() {
    let (tokens, context) = fixture();
    let mut engine = ChssEngine::new(false);

    let rules = parse_sheet("App [method/property]:not(port) { color: red }");
    let matches = engine.process(&rules, &tokens, Some(&context));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].range, SourceRange::of(1, 2, 1, 5)); // run, not port
}

#[test]
fn test_regex_link_resolves_through_tokens_first() {
    let (tokens, context) = fixture();
    let rules = parse_sheet("App <co*g> { color: red }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens, Some(&context));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].range, SourceRange::of(2, 4, 2, 10)); // config
}

#[test]
fn test_stale_tree_is_rebuilt_on_new_version() {
    let (tokens, mut context) = fixture();
    let rules = parse_sheet("App run { color: red }");
    let mut engine = ChssEngine::new(false);

    assert_eq!(engine.process(&rules, &tokens, Some(&context)).len(), 1);

    // Same path, new snapshot without the class wrapper.
    context.version = 2;
    context.symbols.clear();
    context.text = "run()\n".to_string();
    let tokens = TokenIndex::from_tokens(vec![token("run", "function", 0, 0, &[])]);
    assert!(engine.process(&rules, &tokens, Some(&context)).is_empty());
}

// ============================================================================
// SCOPED RULES
// ============================================================================

#[test]
fn test_scope_limits_rules_to_matching_paths() {
    let (tokens, context) = fixture();
    let mut engine = ChssEngine::new(false);

    let rules = parse_sheet("scope(src/**/*.ts) { run { color: red } }");
    assert_eq!(engine.process(&rules, &tokens, Some(&context)).len(), 1);

    let rules = parse_sheet("scope(**/*.rs) { run { color: red } }");
    assert!(engine.process(&rules, &tokens, Some(&context)).is_empty());
}
