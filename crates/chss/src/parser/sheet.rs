//! Rule-sheet parsing.
//!
//! A CHSS sheet is a flat sequence of `selector-group { declarations }`
//! rules, optionally nested one level deep inside `scope(<glob>) { ... }`
//! blocks. Parsing is a small state machine over the text split on brace
//! characters: segments alternate strictly between selector position and
//! declaration position, with the alternation shifted by one inside a
//! scoped block. Broken rules are dropped locally; the sheet as a whole
//! always parses.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::selector::{ParsedSelector, Specificity, parse_selector_group};
use crate::types::color::ColorAction;

/// One parsed rule: a selector group and its declarations.
#[derive(Clone, Debug, Default)]
pub struct Rule {
    pub selectors: Vec<ParsedSelector>,
    /// Literal declarations, property name (camelCase) to raw value.
    pub style: BTreeMap<String, String>,
    /// Relative color operations, property name to action and argument.
    pub color_actions: BTreeMap<String, (ColorAction, Option<String>)>,
    /// Glob pattern restricting the rule to matching file paths.
    pub scope: Option<String>,
}

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//.*").expect("valid pattern"));
static EMPTY_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s*\}").expect("valid pattern"));
static SCOPE_GLOB: Lazy<Regex> = Lazy::new(|| Regex::new(r".*\((.*)\)$").expect("valid pattern"));
static DASH_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\w)").expect("valid pattern"));

/// Marker an empty `{}` pair is normalized to, so the brace split still
/// yields a declaration segment for it.
const EMPTY_SENTINEL: &str = "empty";

/// Parses a whole CHSS sheet. Never fails: rules that cannot be parsed
/// are dropped and the rest of the sheet survives.
pub fn parse_sheet(source: &str) -> Vec<Rule> {
    let stripped = LINE_COMMENT.replace_all(source, "");
    let normalized = EMPTY_BLOCK.replace_all(&stripped, format!("{{{EMPTY_SENTINEL}}}"));

    let mut rules: Vec<Rule> = Vec::new();
    let mut skip_next = false;
    let mut current_scope: Option<String> = None;

    for (i, segment) in normalized.split(['{', '}']).map(str::trim).enumerate() {
        // Outside scope() blocks selectors sit at even segments; inside,
        // the scope header consumed one, shifting selectors to odd.
        let is_selector = i % 2 == usize::from(current_scope.is_some());

        // An empty segment while scoped closes the scope block.
        if current_scope.is_some() && segment.is_empty() {
            current_scope = None;
            continue;
        }
        // The previous selector was unusable, so this block is dropped.
        if skip_next {
            skip_next = false;
            continue;
        }
        if is_selector && segment.is_empty() {
            skip_next = true;
            continue;
        }

        if is_selector {
            if segment.starts_with("scope(") {
                current_scope = Some(parse_scope_glob(segment));
                continue;
            }
            // Scoped rules start above unscoped ones so they always win.
            let base = if current_scope.is_some() {
                Specificity::new(1, 0, 0)
            } else {
                Specificity::default()
            };
            let selectors = parse_selector_group(segment, base);
            if selectors.is_empty() {
                log::debug!("dropping rule with unusable selector group: {segment:?}");
                skip_next = true;
                continue;
            }
            rules.push(Rule {
                selectors,
                scope: current_scope.clone(),
                ..Default::default()
            });
        } else {
            // An empty declaration block cancels its selector.
            if segment.is_empty() || segment == EMPTY_SENTINEL {
                rules.pop();
                continue;
            }
            let clauses: Vec<&str> = segment
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if clauses.is_empty() {
                rules.pop();
                continue;
            }
            if let Some(rule) = rules.last_mut() {
                for clause in clauses {
                    parse_declaration(clause, rule);
                }
            }
        }
    }

    log::debug!("parsed {} rules from sheet", rules.len());
    rules
}

/// Extracts and normalizes the glob pattern of a `scope(...)` directive.
fn parse_scope_glob(segment: &str) -> String {
    SCOPE_GLOB
        .captures(segment)
        .and_then(|c| c.get(1))
        .map(|glob| {
            glob.as_str()
                .trim()
                .trim_matches('"')
                .replace('\\', "/")
        })
        .filter(|glob| !glob.is_empty())
        .unwrap_or_else(|| "???".to_string())
}

/// Parses one `property: value` clause into the open rule.
///
/// Values shaped like `action(arg)` for a known color action become a
/// color action on the property; everything else is a literal declaration.
fn parse_declaration(clause: &str, rule: &mut Rule) {
    let Some((name, value)) = clause.split_once(':') else {
        return;
    };
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        return;
    }

    let action = ColorAction::ALL
        .iter()
        .find(|a| value.starts_with(&format!("{}(", a.name())));
    if let Some(&action) = action {
        let argument = value
            .split(['(', ')'])
            .nth(1)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        rule.color_actions
            .insert(camel_case(name), (action, argument));
        return;
    }

    rule.style.insert(camel_case(name), unquote(value));
}

/// Normalizes a dash-case property name to camelCase.
fn camel_case(name: &str) -> String {
    DASH_CHAR
        .replace_all(name, |caps: &regex::Captures| caps[1].to_uppercase())
        .into_owned()
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Convenience for hosts that keep sheets on disk.
pub fn parse_sheet_file(path: &std::path::Path) -> Result<Vec<Rule>, crate::error::ChssError> {
    let source = std::fs::read_to_string(path)?;
    Ok(parse_sheet(&source))
}
