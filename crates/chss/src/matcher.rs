//! Direct selector matching against the token index.
//!
//! Resolves a single non-relational selector by scanning the file's token
//! lists. Structural combinators never reach this path; they go through
//! the synthetic tree instead.

use crate::parser::selector::{MatchMode, ParsedSelector};
use crate::tokens::{Token, TokenIndex};
use crate::types::geometry::SourceRange;

/// Parallel ranges/offsets of the tokens a selector matched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchPair {
    pub ranges: Vec<SourceRange>,
    pub offsets: Vec<u32>,
}

impl MatchPair {
    pub fn push(&mut self, range: SourceRange, offset: u32) {
        self.ranges.push(range);
        self.offsets.push(offset);
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Matches one selector against the token index.
///
/// `negated` holds the offsets produced by resolving the selector's
/// `:not()` groups; any token starting there is excluded.
pub fn match_direct(
    selector: &ParsedSelector,
    index: &TokenIndex,
    insensitive: bool,
    negated: &[u32],
) -> MatchPair {
    let mut matches = MatchPair::default();
    let kinds: Vec<&str> = if selector.matches_any_kind() {
        vec!["*"]
    } else {
        selector.kinds.iter().map(String::as_str).collect()
    };

    for kind in kinds {
        if kind != "*" && !index.has_kind(kind) {
            continue;
        }
        let tokens: Box<dyn Iterator<Item = &Token>> = if kind == "*" {
            Box::new(index.all.iter())
        } else {
            Box::new(index.of_kind(kind))
        };
        for token in tokens {
            if negated.contains(&token.offset) {
                continue;
            }
            if name_matches(selector, &token.name, insensitive)
                && modifiers_match(&selector.modifier_groups, &token.modifiers)
            {
                matches.push(token.range, token.offset);
            }
        }
    }
    matches
}

/// Applies the selector's name filter under its match mode.
fn name_matches(selector: &ParsedSelector, token_name: &str, insensitive: bool) -> bool {
    if selector.name.is_empty() {
        return true;
    }
    let (token_name, wanted) = if insensitive {
        (token_name.to_lowercase(), selector.name.to_lowercase())
    } else {
        (token_name.to_string(), selector.name.clone())
    };

    match selector.match_mode {
        MatchMode::Exact => token_name == wanted,
        MatchMode::StartsWith => token_name.starts_with(&wanted),
        MatchMode::EndsWith => token_name.ends_with(&wanted),
        MatchMode::Includes => token_name.contains(&wanted),
        MatchMode::Regex => selector
            .pattern
            .as_ref()
            .is_some_and(|p| p.is_match(&token_name)),
    }
}

/// Modifier groups AND across groups and OR within one; the literal
/// `none` requires a token with zero modifiers.
pub fn modifiers_match(groups: &[Vec<String>], modifiers: &[String]) -> bool {
    groups.iter().all(|group| {
        if group.is_empty() {
            return true;
        }
        if group.iter().any(|m| m == "none") {
            return modifiers.is_empty();
        }
        modifiers.iter().any(|m| group.contains(m))
    })
}
