//! CHSS selector parsing.
//!
//! A selector group is a comma/combinator-joined list of clauses like
//! `#count`, `[variable]:readonly`, `<^=get=[method]>` or
//! `name:not([keyword])::before`. Each clause becomes a [`ParsedSelector`]
//! with a computed [`Specificity`]; combinators link adjacent entries.
//!
//! Specificity accumulates across a compound (non-comma) chain and resets
//! at every comma. An invalid clause inside a compound chain poisons the
//! whole group; an invalid clause between commas only drops itself.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// CSS-style specificity triple, compared lexicographically.
///
/// The sentinel [`Specificity::INVALID`] is lower than any valid triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    pub ids: i32,
    pub classes: i32,
    pub types: i32,
}

impl Specificity {
    pub const INVALID: Self = Self {
        ids: -1,
        classes: -1,
        types: -1,
    };

    pub const fn new(ids: i32, classes: i32, types: i32) -> Self {
        Self { ids, classes, types }
    }

    /// Component-wise sum, used when selectors compound.
    pub fn sum(self, other: Self) -> Self {
        Self {
            ids: self.ids + other.ids,
            classes: self.classes + other.classes,
            types: self.types + other.types,
        }
    }

    /// Component-wise maximum, used when cascade entries merge.
    pub fn max_components(self, other: Self) -> Self {
        Self {
            ids: self.ids.max(other.ids),
            classes: self.classes.max(other.classes),
            types: self.types.max(other.types),
        }
    }
}

/// How a selector's name filter compares against token names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Exact,
    StartsWith,
    EndsWith,
    Includes,
    Regex,
}

impl MatchMode {
    /// Class-component specificity weight of an advanced matcher.
    fn class_weight(self) -> i32 {
        match self {
            MatchMode::Regex => 4,
            MatchMode::StartsWith | MatchMode::EndsWith => 3,
            MatchMode::Includes => 2,
            MatchMode::Exact => 0,
        }
    }
}

/// A `::pseudo` tag selecting a sub-part or theme variant of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pseudo {
    Before,
    After,
    Light,
    Dark,
}

impl Pseudo {
    pub const ALL: [Pseudo; 4] = [Pseudo::Before, Pseudo::After, Pseudo::Light, Pseudo::Dark];

    pub fn name(&self) -> &'static str {
        match self {
            Pseudo::Before => "before",
            Pseudo::After => "after",
            Pseudo::Light => "light",
            Pseudo::Dark => "dark",
        }
    }
}

impl FromStr for Pseudo {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|p| p.name() == s).ok_or(())
    }
}

/// The connector between a selector and the next one in its group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// `,` — starts an independent alternative.
    Comma,
    /// Whitespace — ancestor/descendant relation.
    Descendant,
    /// `>` — parent/child relation.
    Child,
}

impl Combinator {
    pub fn is_relational(self) -> bool {
        !matches!(self, Combinator::Comma)
    }
}

/// One parsed selector clause.
#[derive(Clone, Debug, Default)]
pub struct ParsedSelector {
    /// Name filter; empty means any name.
    pub name: String,
    /// Kind filters; `*` means any kind.
    pub kinds: Vec<String>,
    /// Modifier groups: OR within a group, AND across groups. The literal
    /// `none` requires a token with zero modifiers.
    pub modifier_groups: Vec<Vec<String>>,
    pub match_mode: MatchMode,
    /// Compiled pattern for [`MatchMode::Regex`].
    pub pattern: Option<Regex>,
    pub pseudo: Option<Pseudo>,
    /// `:not()` alternatives, each a full selector group.
    pub not_groups: Vec<Vec<ParsedSelector>>,
    /// The combinator that follows this selector, if any.
    pub combinator: Option<Combinator>,
    pub specificity: Specificity,
    pub invalid: bool,
}

impl ParsedSelector {
    fn invalid_with(combinator: Option<Combinator>) -> Self {
        Self {
            specificity: Specificity::INVALID,
            combinator,
            invalid: true,
            ..Default::default()
        }
    }

    pub fn matches_any_kind(&self) -> bool {
        self.kinds.iter().any(|k| k == "*")
    }
}

/// True if the group contains a structural (non-comma) combinator, which
/// forces the synthetic-tree matching path.
pub fn is_compound(selectors: &[ParsedSelector]) -> bool {
    selectors
        .iter()
        .any(|s| s.combinator.is_some_and(Combinator::is_relational))
}

/// Splits a raw selector-group string into clause/combinator pairs.
///
/// Clause boundaries respect `<...>`, `[...]`, `(...)` nesting and quoted
/// strings, so `:not(a b)` and `<^=foo bar>` stay single clauses.
fn scan_clauses(source: &str) -> Option<Vec<(String, Option<Combinator>)>> {
    let mut clauses: Vec<(String, Option<Combinator>)> = Vec::new();
    let mut current = String::new();
    let mut stack: Vec<char> = Vec::new();
    let mut in_quotes = false;

    let close = |current: &mut String, clauses: &mut Vec<(String, Option<Combinator>)>| {
        if !current.is_empty() {
            clauses.push((std::mem::take(current), None));
        }
    };

    for c in source.chars() {
        if in_quotes {
            current.push(c);
            in_quotes = c != '"';
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                current.push(c);
            }
            '<' | '[' | '(' => {
                stack.push(c);
                current.push(c);
            }
            '>' if stack.last() == Some(&'<') => {
                stack.pop();
                current.push(c);
            }
            ']' if stack.last() == Some(&'[') => {
                stack.pop();
                current.push(c);
            }
            ')' if stack.last() == Some(&'(') => {
                stack.pop();
                current.push(c);
            }
            _ if !stack.is_empty() => current.push(c),
            ',' => {
                close(&mut current, &mut clauses);
                match clauses.last_mut() {
                    // Comma beats an already-noted descendant separator.
                    Some((_, combinator)) => *combinator = Some(Combinator::Comma),
                    None => return None, // leading comma
                }
            }
            '>' => {
                close(&mut current, &mut clauses);
                match clauses.last_mut() {
                    Some((_, combinator @ (None | Some(Combinator::Descendant)))) => {
                        *combinator = Some(Combinator::Child)
                    }
                    _ => return None, // `>,` or leading `>`
                }
            }
            c if c.is_whitespace() => {
                close(&mut current, &mut clauses);
                if let Some((_, combinator @ None)) = clauses.last_mut() {
                    *combinator = Some(Combinator::Descendant);
                }
            }
            _ => current.push(c),
        }
    }
    close(&mut current, &mut clauses);

    // A trailing separator was recorded but nothing followed it.
    if let Some((_, combinator)) = clauses.last_mut() {
        if matches!(combinator, Some(Combinator::Descendant)) {
            *combinator = None;
        } else if combinator.is_some() {
            return None;
        }
    }
    Some(clauses)
}

/// Parses a selector-group string into its valid selectors.
///
/// Invalid clauses joined by commas are dropped individually; an invalid
/// clause adjacent to a structural combinator empties the whole group.
pub fn parse_selector_group(source: &str, base: Specificity) -> Vec<ParsedSelector> {
    let Some(clauses) = scan_clauses(source.trim()) else {
        return Vec::new();
    };

    let mut parsed_group: Vec<ParsedSelector> = Vec::new();
    let mut combined = base;

    for (clause, combinator) in clauses {
        let parsed = parse_single_selector(&clause, combined, combinator);

        let follows_structurally = parsed
            .combinator
            .is_some_and(Combinator::is_relational);
        let after_structural = parsed_group
            .last()
            .and_then(|prev| prev.combinator)
            .is_some_and(Combinator::is_relational);

        // A pseudo tag is only legal on the last selector of a chain, and
        // compound chains are atomic: one bad member poisons the group.
        if ((parsed.pseudo.is_some() || parsed.invalid) && follows_structurally)
            || (parsed.invalid && after_structural)
        {
            parsed_group.clear();
            break;
        }

        if parsed.invalid {
            combined = base;
            continue;
        }

        combined = if parsed.combinator == Some(Combinator::Comma) {
            base
        } else {
            combined.sum(parsed.specificity)
        };
        parsed_group.push(parsed);
    }
    parsed_group
}

static NOT_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r":not\(([^)]*)\)").expect("valid pattern"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").expect("valid pattern"));
static REGEX_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/.+/i?$").expect("valid pattern"));

/// Parses a single selector clause.
///
/// `base` is the accumulated specificity inherited from earlier selectors
/// in the compound chain; `combinator` is the connector that follows the
/// clause (already determined by the group scanner).
pub fn parse_single_selector(
    clause: &str,
    base: Specificity,
    combinator: Option<Combinator>,
) -> ParsedSelector {
    let invalid = || ParsedSelector::invalid_with(combinator);

    // The pseudo tag is stripped before everything else and reattached.
    let pseudo = Pseudo::ALL
        .iter()
        .copied()
        .find(|p| clause.contains(&format!("::{}", p.name())));
    let mut selector = match pseudo {
        Some(p) => clause.replace(&format!("::{}", p.name()), ""),
        None => clause.to_string(),
    };

    // Extract all :not() sub-clauses. One nesting level only: a nested
    // :not( inside the extracted text rejects the whole clause.
    let mut not_sources = Vec::new();
    while let Some(found) = NOT_CLAUSE.captures(&selector) {
        let whole = found.get(0).expect("group 0");
        let inner = found.get(1).map_or("", |m| m.as_str()).to_string();
        let range = whole.range();
        selector.replace_range(range, "");
        if !inner.is_empty() {
            not_sources.push(inner);
        }
    }

    let mut current = base;
    let mut not_groups = Vec::new();
    for source in &not_sources {
        if source.contains(":not(") {
            return invalid();
        }
        let group = parse_selector_group(source, current);
        // An invalid negated alternative invalidates the enclosing selector.
        if group.is_empty() {
            return invalid();
        }
        not_groups.push(group);
    }

    if let Some(strongest) = not_groups
        .iter()
        .flatten()
        .map(|s| s.specificity)
        .max()
    {
        // CSS semantics: :not() contributes its most specific alternative.
        current = current.sum(strongest);
    }

    let finish = |name: &str,
                  kinds: Vec<String>,
                  modifier_groups: Vec<Vec<String>>,
                  specificity: Specificity| ParsedSelector {
        name: name.to_string(),
        kinds,
        modifier_groups,
        match_mode: MatchMode::Exact,
        pattern: None,
        pseudo,
        not_groups: not_groups.clone(),
        combinator,
        specificity,
        invalid: false,
    };

    let any = || vec!["*".to_string()];

    // Universal: matches anything, adds nothing.
    if selector == "*" {
        return finish("", any(), Vec::new(), current);
    }

    // Bare identifier: name filter on any kind.
    if WORD.is_match(&selector) {
        return finish(&selector, any(), Vec::new(), current.sum(Specificity::new(1, 0, 0)));
    }

    // Single special leading character: #variable / .function shorthands.
    let mut chars = selector.chars();
    let head_char = chars.next();
    let rest = chars.as_str();
    if !rest.is_empty() && WORD.is_match(rest) && head_char != Some(':') {
        let kind = match head_char {
            Some('#') => "variable",
            Some('.') => "function",
            _ => return invalid(),
        };
        return finish(
            rest,
            vec![kind.to_string()],
            Vec::new(),
            current.sum(Specificity::new(1, 1, 0)),
        );
    }

    // Advanced matcher: <wildc*rd> | <^=prefix> | <"/RegEx/"> | <^=match=kind>
    if let Some(body) = selector.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        return parse_advanced_matcher(body, current, combinator, pseudo, not_groups);
    }

    // Pure kind filter: [kind] or [kind/other].
    if let Some(body) = selector.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if !body.contains(':') {
            return finish(
                "",
                split_list(body),
                Vec::new(),
                current.sum(Specificity::new(0, 1, 0)),
            );
        }
    }

    // Kind filter with modifiers: [kind]:mod1:mod2.
    if selector.starts_with('[') {
        let mut parts = selector.split(':');
        let head = parts.next().unwrap_or("");
        let groups: Vec<Vec<String>> = parts.filter(|m| !m.is_empty()).map(split_group).collect();
        let Some(kinds) = head.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
            return invalid();
        };
        if groups.is_empty() {
            return invalid();
        }
        let count = groups.len() as i32;
        return finish(
            "",
            split_list(kinds),
            groups,
            current.sum(Specificity::new(0, 1, count)),
        );
    }

    // Compound: name[kind]:mods.
    if selector.contains('[') && selector.contains(']') {
        if !selector.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return invalid();
        }
        let mut parts = selector.splitn(3, ['[', ']']);
        let name = parts.next().unwrap_or("");
        let Some(kinds) = parts.next().filter(|k| !k.is_empty()) else {
            return invalid();
        };
        let mods = parts.next().unwrap_or("");
        let groups: Vec<Vec<String>> = mods
            .split(':')
            .filter(|m| !m.is_empty())
            .map(split_group)
            .collect();
        let count = groups.len() as i32;
        return finish(
            name,
            split_list(kinds),
            groups,
            current.sum(Specificity::new(1, 1, count)),
        );
    }

    // A stray bracket half is never valid.
    if selector.contains('[') || selector.contains(']') {
        return invalid();
    }

    // Name (or nothing) with modifier groups: name:mod or :mod1:mod2.
    let mut parts = selector.split(':');
    let ident = parts.next().unwrap_or("");
    let groups: Vec<Vec<String>> = parts.filter(|m| !m.is_empty()).map(split_group).collect();
    let count = groups.len() as i32;

    if ident.is_empty() {
        if groups.is_empty() {
            return invalid();
        }
        return finish("", any(), groups, current.sum(Specificity::new(0, 0, count)));
    }
    // A clause with no modifier groups that fell through every form above
    // has nothing left to be; recursing on it would never terminate.
    if ident == "/" || groups.is_empty() {
        return invalid();
    }

    let head = parse_single_selector(ident, current, None);
    if head.invalid {
        return invalid();
    }
    ParsedSelector {
        modifier_groups: groups,
        pseudo,
        not_groups,
        combinator,
        specificity: head.specificity.sum(Specificity::new(0, 0, count)),
        ..head
    }
}

/// Parses the `<op=value=kind>` advanced matcher body.
fn parse_advanced_matcher(
    body: &str,
    current: Specificity,
    combinator: Option<Combinator>,
    pseudo: Option<Pseudo>,
    not_groups: Vec<Vec<ParsedSelector>>,
) -> ParsedSelector {
    let invalid = || ParsedSelector::invalid_with(combinator);

    let parts: Vec<String> = body.split('=').map(|s| unquote(s.trim())).collect();
    let (operator, value, sub_kind) = match parts.as_slice() {
        [single] => ("", single.as_str(), None),
        [op, value] => (op.as_str(), value.as_str(), None),
        [op, value, sub] => (op.as_str(), value.as_str(), Some(sub.as_str())),
        _ => return invalid(),
    };

    let mode = match operator {
        "^" => MatchMode::StartsWith,
        "*" => MatchMode::Includes,
        "$" => MatchMode::EndsWith,
        _ => MatchMode::Regex,
    };
    let value = if value.is_empty() { operator } else { value };
    // Without a recognized operator the value must be a wildcard pattern
    // or a /regex/ literal; a plain name belongs outside the brackets.
    if mode == MatchMode::Regex && !value.contains('*') && !REGEX_LITERAL.is_match(value) {
        return invalid();
    }

    let pattern = if mode == MatchMode::Regex {
        let insensitive = value.ends_with("/i");
        let source = if let Some(stripped) = value.strip_prefix('/') {
            stripped
                .trim_end_matches('i')
                .trim_end_matches('/')
                .to_string()
        } else {
            format!("^{}$", regex::escape(value).replace(r"\*", ".*"))
        };
        match RegexBuilder::new(&source).case_insensitive(insensitive).build() {
            Ok(re) => Some(re),
            Err(e) => {
                log::debug!("rejecting selector with bad pattern {value:?}: {e}");
                return invalid();
            }
        }
    } else {
        None
    };

    // The subtype is itself a bracketed kind selector, parsed recursively.
    let (kinds, modifier_groups, specificity) = match sub_kind {
        Some(sub) => {
            let wrapped = match sub.find(':') {
                Some(idx) => format!("[{}]{}", &sub[..idx], &sub[idx..]),
                None => format!("[{sub}]"),
            };
            let parsed = parse_single_selector(&wrapped, current, None);
            if parsed.invalid {
                return invalid();
            }
            (parsed.kinds, parsed.modifier_groups, parsed.specificity)
        }
        None => (vec!["*".to_string()], Vec::new(), current),
    };

    ParsedSelector {
        name: value.to_string(),
        kinds,
        modifier_groups,
        match_mode: mode,
        pattern,
        pseudo,
        not_groups,
        combinator,
        specificity: specificity.sum(Specificity::new(0, mode.class_weight(), 0)),
        invalid: false,
    }
}

fn split_list(body: &str) -> Vec<String> {
    body.split('/').map(|t| t.trim().to_string()).collect()
}

fn split_group(group: &str) -> Vec<String> {
    group.split('/').map(|t| t.trim().to_string()).collect()
}

fn unquote(s: &str) -> String {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}
