//! Integration tests for cascade resolution through the engine.
//!
//! Covers:
//! - One match per token, higher specificity winning per property
//! - Component-wise specificity merging
//! - Pseudo variants cascading independently
//! - Relative color actions against overridden values
//! - Grouping resolved matches for decoration

use chss::engine::{ChssEngine, group_matches};
use chss::parser::{Pseudo, Specificity, parse_sheet};
use chss::tokens::{Token, TokenIndex};
use chss::types::geometry::SourceRange;

fn token(name: &str, kind: &str, offset: u32, modifiers: &[&str]) -> Token {
    Token {
        name: name.to_string(),
        range: SourceRange::of(0, offset, 0, offset + name.len() as u32),
        offset,
        kind: kind.to_string(),
        modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
        index: 0,
    }
}

fn tokens() -> TokenIndex {
    TokenIndex::from_tokens(vec![
        token("count", "variable", 10, &["readonly"]),
        token("total", "variable", 30, &[]),
    ])
}

// ============================================================================
// PER-TOKEN CASCADE
// ============================================================================

#[test]
fn test_overlapping_rules_fold_into_one_match() {
    let rules = parse_sheet("#count { color: blue }\ncount { color: red; font-style: italic }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens(), None);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].offset, 10);
    // `#count` is more specific for color; the weaker rule still
    // contributes the property it alone declares.
    assert_eq!(matches[0].style.get("color").map(String::as_str), Some("blue"));
    assert_eq!(
        matches[0].style.get("fontStyle").map(String::as_str),
        Some("italic")
    );
}

#[test]
fn test_rule_order_loses_to_specificity() {
    let early = parse_sheet("count { color: red }\n#count { color: blue }");
    let late = parse_sheet("#count { color: blue }\ncount { color: red }");
    let mut engine = ChssEngine::new(false);

    for rules in [early, late] {
        let matches = engine.process(&rules, &tokens(), None);
        assert_eq!(matches[0].style.get("color").map(String::as_str), Some("blue"));
    }
}

#[test]
fn test_merged_specificity_is_componentwise_max() {
    let rules = parse_sheet("#count { color: blue }\ncount:readonly { font-style: italic }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens(), None);
    assert_eq!(matches.len(), 1);
    // (1,1,0) merged with (1,0,1).
    assert_eq!(matches[0].specificity, Specificity::new(1, 1, 1));
}

#[test]
fn test_pseudo_variants_cascade_independently() {
    let rules = parse_sheet("#count { color: red }\n#count::dark { color: black }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens(), None);
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].pseudo, None);
    assert_eq!(matches[1].pseudo, Some(Pseudo::Dark));
    assert_eq!(matches[1].style.get("color").map(String::as_str), Some("black"));
}

// ============================================================================
// COLOR ACTIONS
// ============================================================================

#[test]
fn test_relative_action_applies_to_overridden_color() {
    let rules = parse_sheet("[variable] { color: #808080 }\n#count { color: darken(20) }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens(), None);
    assert_eq!(matches.len(), 2);

    let count = matches.iter().find(|m| m.offset == 10).expect("count match");
    let derived = count.style.get("color").expect("derived color");
    assert!(derived.starts_with('#') && derived.len() == 9);
    assert_ne!(derived, "#808080");

    // `total` only matches the base rule and keeps the literal color.
    let total = matches.iter().find(|m| m.offset == 30).expect("total match");
    assert_eq!(total.style.get("color").map(String::as_str), Some("#808080"));

    // The resolved value is stable across runs of the same engine.
    let again = engine.process(&rules, &tokens(), None);
    let count_again = again.iter().find(|m| m.offset == 10).expect("count match");
    assert_eq!(count_again.style.get("color"), count.style.get("color"));
}

#[test]
fn test_action_without_base_produces_no_value() {
    let rules = parse_sheet("#count { color: darken(20) }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens(), None);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].style.get("color").is_none());
}

#[test]
fn test_random_needs_no_base() {
    let rules = parse_sheet("#count { color: random() }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens(), None);
    let value = matches[0].style.get("color").expect("random color");
    assert!(value.starts_with('#') && value.len() == 9);
}

// ============================================================================
// DECORATION GROUPS
// ============================================================================

#[test]
fn test_matches_group_by_style_and_pseudo() {
    let rules = parse_sheet("[variable] { color: red }\n#count::dark { color: black }");
    let mut engine = ChssEngine::new(false);

    let matches = engine.process(&rules, &tokens(), None);
    let groups = group_matches(&matches);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].ranges.len(), 2);
    assert_eq!(groups[0].pseudo, None);
    assert_eq!(groups[1].ranges.len(), 1);
    assert_eq!(groups[1].pseudo, Some(Pseudo::Dark));
}
