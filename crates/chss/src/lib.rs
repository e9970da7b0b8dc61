//! # CHSS - Code Highlighting Style Sheets
//!
//! A CSS-like rule language for decorating semantic tokens in source
//! code. Selectors address tokens by name, kind, modifiers and nesting;
//! declarations carry arbitrary style properties plus relative color
//! operations. This crate provides:
//!
//! - **Parsing**: Convert sheet text into [`Rule`](parser::sheet::Rule)s
//!   with parsed selectors and CSS-style specificity
//! - **Matching**: Resolve selectors against a file's token index, or
//!   against a synthetic tree built from the symbol outline when a
//!   selector nests
//! - **Cascade**: Fold overlapping matches into one style per token,
//!   higher specificity winning per property
//!
//! ## Quick Start
//!
//! ```rust
//! use chss::engine::ChssEngine;
//! use chss::parser::parse_sheet;
//! use chss::tokens::{Token, TokenIndex};
//! use chss::types::geometry::SourceRange;
//!
//! let rules = parse_sheet(
//!     r#"
//!     #count {
//!         color: #ff0000;
//!         font-weight: bold;
//!     }
//!     "#,
//! );
//!
//! let tokens = TokenIndex::from_tokens(vec![Token {
//!     name: "count".to_string(),
//!     range: SourceRange::of(0, 6, 0, 11),
//!     offset: 6,
//!     kind: "variable".to_string(),
//!     modifiers: Vec::new(),
//!     index: 0,
//! }]);
//!
//! let mut engine = ChssEngine::new(false);
//! let matches = engine.process(&rules, &tokens, None);
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].style["color"], "#ff0000");
//! assert_eq!(matches[0].style["fontWeight"], "bold");
//! ```
//!
//! ## Selector forms
//!
//! - Bare name: `count` (any kind)
//! - Shorthands: `#count` (variable), `.update` (function)
//! - Kind filters: `[variable]`, `[variable/property]`
//! - Modifiers: `[variable]:readonly`, `:static/declaration`, `:none`
//! - Advanced matchers: `<^=get>`, `<$=Factory>`, `<*part>`, `<wild*rd>`,
//!   `<"/^on[A-Z]/">`, with an optional kind: `<^=get=method>`
//! - Negation: `name:not([keyword])`
//! - Nesting: `class method`, `#obj > prop` (needs a [`engine::FileContext`])
//! - Pseudo tags: `::before`, `::after`, `::light`, `::dark`
//! - Scoping: `scope(src/**/*.ts) { ... }`

pub mod engine;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod tokens;
pub mod tree;
pub mod types;

pub use engine::{ChssEngine, DecorationGroup, FileContext, group_matches};
pub use error::ChssError;
pub use matcher::{MatchPair, match_direct};
pub use parser::{
    ChssMatch, Combinator, MatchMode, ParsedSelector, Pseudo, Rule, Specificity, parse_sheet,
    parse_sheet_file,
};
pub use tokens::{SymbolInfo, Token, TokenIndex, TokenLegend, decode_semantic_tokens};
pub use tree::{NestingPolicy, SynthTree};
pub use types::color::{Color, ColorAction, ColorParseError};
pub use types::geometry::{Position, SourceRange, identifier_to_range, range_identifier};
