//! Compiles relational selector chains into tree queries.
//!
//! Each selector in a chain becomes one query step; descendant and child
//! combinators carry over verbatim. Two selector features have no direct
//! query form and are pre-resolved against the token index before
//! translation:
//!
//! - regex name filters, whose matching name ranges arrive as a list and
//!   expand into `[data-namerange="..."]` alternatives;
//! - `:not()` groups, whose matched offsets arrive as exclusions and
//!   append `[data-offset!="..."]` predicates.

use crate::parser::selector::{Combinator, MatchMode, ParsedSelector};
use crate::types::geometry::{SourceRange, range_identifier};

/// One selector of a chain plus its pre-resolved parts.
pub struct ChainLink<'a> {
    pub selector: &'a ParsedSelector,
    /// Name ranges a regex selector matched; `None` for other modes.
    pub regex_ranges: Option<Vec<SourceRange>>,
    /// Offsets excluded by the selector's `:not()` groups.
    pub not_offsets: Vec<u32>,
}

/// Renders a chain as a query string.
///
/// Returns `None` when the chain provably matches nothing, e.g. a regex
/// link whose pre-resolution found no tokens.
pub fn chain_to_query(links: &[ChainLink]) -> Option<String> {
    let mut strings = vec![String::new()];

    for (i, link) in links.iter().enumerate() {
        if i > 0 {
            let separator = match links[i - 1].selector.combinator {
                Some(Combinator::Child) => " > ",
                _ => " ",
            };
            for s in &mut strings {
                s.push_str(separator);
            }
        }
        let alternatives = step_alternatives(link)?;
        strings = strings
            .iter()
            .flat_map(|prefix| {
                alternatives
                    .iter()
                    .map(move |step| format!("{prefix}{step}"))
            })
            .collect();
    }
    Some(strings.join(", "))
}

/// The alternative step strings one selector expands into.
fn step_alternatives(link: &ChainLink) -> Option<Vec<String>> {
    let selector = link.selector;
    let mut alternatives = vec![String::new()];

    match selector.match_mode {
        MatchMode::Regex => {
            let ranges = link.regex_ranges.as_deref().unwrap_or(&[]);
            if ranges.is_empty() {
                return None;
            }
            alternatives = ranges
                .iter()
                .map(|range| format!(r#"[data-namerange="{}"]"#, range_identifier(range)))
                .collect();
        }
        MatchMode::StartsWith => append(&mut alternatives, &name_predicate("^", selector)),
        MatchMode::EndsWith => append(&mut alternatives, &name_predicate("$", selector)),
        MatchMode::Includes => append(&mut alternatives, &name_predicate("*", selector)),
        MatchMode::Exact => {
            if !selector.name.is_empty() {
                append(&mut alternatives, &name_predicate("", selector));
            }
        }
    }

    for group in &selector.modifier_groups {
        if group.iter().any(|m| m == "none") {
            append(&mut alternatives, r#"[data-mods=""]"#);
        } else {
            alternatives = product(&alternatives, group);
        }
    }

    let kinds: Vec<String> = selector
        .kinds
        .iter()
        .filter(|k| *k != "*")
        .cloned()
        .collect();
    if !kinds.is_empty() {
        alternatives = product(&alternatives, &kinds);
    }

    for offset in &link.not_offsets {
        append(&mut alternatives, &format!(r#"[data-offset!="{offset}"]"#));
    }

    if alternatives.iter().all(String::is_empty) {
        return Some(vec!["*".to_string()]);
    }
    Some(alternatives)
}

fn name_predicate(op: &str, selector: &ParsedSelector) -> String {
    format!(r#"[data-name{op}="{}"]"#, selector.name)
}

fn append(alternatives: &mut [String], suffix: &str) {
    for alternative in alternatives {
        alternative.push_str(suffix);
    }
}

/// Expands each alternative once per class, OR semantics via alternation.
fn product(alternatives: &[String], classes: &[String]) -> Vec<String> {
    classes
        .iter()
        .flat_map(|class| {
            alternatives
                .iter()
                .map(move |alternative| format!("{alternative}.{class}"))
        })
        .collect()
}
