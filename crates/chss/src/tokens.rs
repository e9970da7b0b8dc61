//! Token and symbol inputs from the host analyzer.
//!
//! The engine consumes two collaborator-provided views of a file:
//!
//! - A flat, ordered list of semantic [`Token`]s, organized here as a
//!   [`TokenIndex`] (by kind, by name-range, and in emission order).
//! - On demand, a nested [`SymbolInfo`] outline used to build the synthetic
//!   tree for relational selectors.
//!
//! Hosts that expose tokens in the LSP delta-encoded integer form can use
//! [`decode_semantic_tokens`] to produce a `TokenIndex` directly. The
//! decoder also patches a provider gap: in some languages, property
//! accesses on untyped values never get a semantic token, so the space
//! between tokens is scanned for accessor chains and synthetic
//! `property`/`method` tokens are inserted.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::geometry::{LineMap, SourceRange, range_identifier};

/// A single classified lexical unit from a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// The token's text.
    pub name: String,
    /// The token's span in the source.
    pub range: SourceRange,
    /// Byte offset of the token start. Monotonically increasing in
    /// emission order.
    pub offset: u32,
    /// Semantic kind, e.g. `variable`, `function`, `property`.
    pub kind: String,
    /// Modifier names, e.g. `readonly`, `declaration`, `static`.
    pub modifiers: Vec<String>,
    /// Stable sequence index within one parse of the file.
    pub index: usize,
}

impl Token {
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// The flat token list of a file, organized for selector matching.
#[derive(Clone, Debug, Default)]
pub struct TokenIndex {
    /// All tokens in emission order.
    pub all: Vec<Token>,
    by_kind: HashMap<String, Vec<usize>>,
    by_range: HashMap<String, usize>,
}

impl TokenIndex {
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let mut index = Self::default();
        for token in tokens {
            index.push(token);
        }
        index
    }

    fn push(&mut self, mut token: Token) {
        token.index = self.all.len();
        self.by_kind
            .entry(token.kind.clone())
            .or_default()
            .push(token.index);
        self.by_range
            .insert(range_identifier(&token.range), token.index);
        self.all.push(token);
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.by_kind.contains_key(kind)
    }

    /// Tokens of one kind, in emission order.
    pub fn of_kind<'a>(&'a self, kind: &str) -> impl Iterator<Item = &'a Token> + 'a {
        self.by_kind
            .get(kind)
            .into_iter()
            .flatten()
            .map(|&i| &self.all[i])
    }

    /// Looks a token up by the identifier of its name range.
    pub fn by_range_identifier(&self, ident: &str) -> Option<&Token> {
        self.by_range.get(ident).map(|&i| &self.all[i])
    }
}

/// The legend describing how integer token kinds and modifier bits decode
/// into names.
#[derive(Clone, Debug, Default)]
pub struct TokenLegend {
    pub kinds: Vec<String>,
    pub modifiers: Vec<String>,
}

impl TokenLegend {
    pub fn new(kinds: Vec<String>, modifiers: Vec<String>) -> Self {
        Self { kinds, modifiers }
    }

    fn decode_modifiers(&self, bits: u32) -> Vec<String> {
        self.modifiers
            .iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

/// One entry of the file's nested symbol outline.
#[derive(Clone, Debug, Default)]
pub struct SymbolInfo {
    pub name: String,
    /// Lowercased symbol kind name, e.g. `class`, `method`, `variable`.
    pub kind: String,
    /// Full extent of the symbol, including its body.
    pub range: SourceRange,
    /// The span of just the symbol's name.
    pub selection_range: SourceRange,
    pub children: Vec<SymbolInfo>,
}

const TOKEN_RECORD_SIZE: usize = 5;

/// Minimum inter-token gap before property recovery is attempted.
const RECOVERY_MIN_GAP: u32 = 3;

static TS_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*[!?]?\.\s*)(\w+\(?)").expect("valid pattern"));
static JS_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*\??\.\s*)(\w+\(?)").expect("valid pattern"));

fn property_pattern(language: &str) -> Option<&'static Regex> {
    match language {
        "typescript" => Some(&TS_PROPERTY),
        "javascript" => Some(&JS_PROPERTY),
        _ => None,
    }
}

/// Kinds whose instances can carry fields (and therefore anchor an
/// accessor chain).
pub(crate) fn kind_has_fields(kind: &str) -> bool {
    matches!(kind, "class" | "property" | "variable" | "object" | "parameter")
}

/// Decodes an LSP-style semantic token stream into a [`TokenIndex`].
///
/// `data` is the flat quintuple array (delta line, delta start, length,
/// kind index, modifier bits); `text` is the file content the tokens were
/// produced for. `language` selects the property-recovery pattern; pass a
/// language without one to disable recovery.
pub fn decode_semantic_tokens(
    data: &[u32],
    legend: &TokenLegend,
    text: &str,
    language: &str,
) -> TokenIndex {
    let lines = LineMap::new(text);
    let mut index = TokenIndex::default();
    let mut line = 0u32;
    let mut column = 0u32;

    for record in data.chunks_exact(TOKEN_RECORD_SIZE) {
        let [delta_line, delta_column, length, kind_index, modifier_bits] = record else {
            unreachable!("chunks_exact yields full records");
        };
        let Some(kind) = legend.kinds.get(*kind_index as usize) else {
            log::debug!("token kind index {kind_index} outside legend, skipping");
            continue;
        };

        if *delta_line != 0 {
            column = 0;
        }
        line += delta_line;
        column += delta_column;

        let range = SourceRange::of(line, column, line, column + length);
        let start = lines.offset_at(range.start);
        let end = lines.offset_at(range.end);

        recover_missing_properties(&mut index, text, &lines, language, start as u32);

        index.push(Token {
            name: text[start..end].to_string(),
            range,
            offset: start as u32,
            kind: kind.clone(),
            modifiers: legend.decode_modifiers(*modifier_bits),
            index: 0,
        });
    }

    // Properties trailing the final provider token.
    recover_missing_properties(&mut index, text, &lines, language, text.len() as u32);
    index
}

/// Scans the gap before `upto` for accessor chains hanging off the last
/// decoded token, inserting synthetic `property`/`method` tokens.
fn recover_missing_properties(
    index: &mut TokenIndex,
    text: &str,
    lines: &LineMap<'_>,
    language: &str,
    upto: u32,
) {
    let Some(pattern) = property_pattern(language) else {
        return;
    };

    loop {
        let Some(last) = index.all.last() else {
            return;
        };
        if last.has_modifier("declaration") || !kind_has_fields(&last.kind) {
            return;
        }
        if upto.saturating_sub(last.offset) < RECOVERY_MIN_GAP {
            return;
        }

        let gap_start = last.offset as usize + last.name.len();
        // Tokens may overlap (offsets only guarantee monotone starts);
        // a next token starting inside the previous one leaves no gap.
        if gap_start >= upto as usize {
            return;
        }
        let gap = &text[gap_start.min(text.len())..(upto as usize).min(text.len())];
        let Some(captures) = pattern.captures(gap) else {
            return;
        };

        let accessor = captures.get(1).map_or("", |m| m.as_str());
        let word = captures.get(2).map_or("", |m| m.as_str());
        if word.is_empty() {
            return;
        }
        let is_method = word.ends_with('(');
        let name = word.trim_end_matches('(');
        let start = gap_start + accessor.len();
        let end = start + name.len();

        log::trace!("recovered missing {} token {name:?} at offset {start}",
            if is_method { "method" } else { "property" });

        index.push(Token {
            name: name.to_string(),
            range: SourceRange::new(lines.position_at(start), lines.position_at(end)),
            offset: start as u32,
            kind: if is_method { "method" } else { "property" }.to_string(),
            modifiers: Vec::new(),
            index: 0,
        });
        // A recovered property can itself anchor further accesses.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::geometry::Position;

    fn legend() -> TokenLegend {
        TokenLegend::new(
            vec!["variable".into(), "function".into(), "property".into()],
            vec!["declaration".into(), "readonly".into()],
        )
    }

    #[test]
    fn decodes_delta_encoded_records() {
        // "count" at 0:0, "count" at 2:4
        let text = "count\n\n    count";
        let data = [0, 0, 5, 0, 2, 2, 4, 5, 1, 0];
        let index = decode_semantic_tokens(&data, &legend(), text, "rust");

        assert_eq!(index.all.len(), 2);
        assert_eq!(index.all[0].name, "count");
        assert_eq!(index.all[0].kind, "variable");
        assert_eq!(index.all[0].modifiers, vec!["readonly".to_string()]);
        assert_eq!(index.all[1].kind, "function");
        assert_eq!(index.all[1].range, SourceRange::of(2, 4, 2, 9));
        assert!(index.all[0].offset < index.all[1].offset);
    }

    #[test]
    fn column_resets_on_new_line_only() {
        let text = "a b\nc";
        // Two tokens on line 0, one on line 1.
        let data = [0, 0, 1, 0, 0, 0, 2, 1, 0, 0, 1, 0, 1, 0, 0];
        let index = decode_semantic_tokens(&data, &legend(), text, "rust");
        assert_eq!(index.all[1].range.start.character, 2);
        assert_eq!(index.all[2].range.start, Position::new(1, 0));
    }

    #[test]
    fn multibyte_text_decodes_on_utf16_columns() {
        // '𝄞' is one char, two UTF-16 units, four bytes.
        let text = "𝄞ok";
        let index = decode_semantic_tokens(&[0, 2, 2, 0, 0], &legend(), text, "rust");
        assert_eq!(index.all.len(), 1);
        assert_eq!(index.all[0].name, "ok");
        assert_eq!(index.all[0].offset, 4);

        // A column past the line's units clamps instead of splitting '€'.
        let index = decode_semantic_tokens(&[0, 2, 1, 0, 0], &legend(), "€x", "rust");
        assert_eq!(index.all[0].name, "");
    }

    #[test]
    fn recovers_untyped_property_chain() {
        let text = "obj.alpha.beta()";
        // Only "obj" gets a provider token.
        let data = [0, 0, 3, 0, 0];
        let index = decode_semantic_tokens(&data, &legend(), text, "typescript");

        let names: Vec<_> = index.all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["obj", "alpha", "beta"]);
        assert_eq!(index.all[1].kind, "property");
        assert_eq!(index.all[2].kind, "method");
    }

    #[test]
    fn recovery_skips_declarations_and_unknown_languages() {
        let text = "obj.alpha";
        let data = [0, 0, 3, 0, 1]; // declaration modifier set
        let index = decode_semantic_tokens(&data, &legend(), text, "typescript");
        assert_eq!(index.all.len(), 1);

        let data = [0, 0, 3, 0, 0];
        let index = decode_semantic_tokens(&data, &legend(), text, "lua");
        assert_eq!(index.all.len(), 1);
    }

    #[test]
    fn recovery_ignores_overlapping_tokens() {
        // The second token starts inside the first; starts still increase,
        // so the record is valid, but there is no gap to scan.
        let text = "aaaa";
        let data = [0, 0, 4, 0, 0, 0, 3, 1, 0, 0];
        let index = decode_semantic_tokens(&data, &legend(), text, "typescript");
        assert_eq!(index.all.len(), 2);
    }

    #[test]
    fn index_lookups() {
        let text = "obj";
        let data = [0, 0, 3, 0, 0];
        let index = decode_semantic_tokens(&data, &legend(), text, "rust");
        assert!(index.has_kind("variable"));
        assert_eq!(index.of_kind("variable").count(), 1);
        assert!(index.by_range_identifier("0|0|0|3").is_some());
    }
}
