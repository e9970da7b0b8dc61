//! CHSS parsing and cascade resolution.
//!
//! [`sheet`] turns rule-sheet text into [`sheet::Rule`]s, [`selector`]
//! parses the selector groups inside them, and [`cascade`] folds the
//! matches those rules produce into final per-token styles.

pub mod cascade;
pub mod selector;
pub mod sheet;

pub use cascade::{ChssMatch, MatchCandidate, resolve_cascade};
pub use selector::{
    Combinator, MatchMode, ParsedSelector, Pseudo, Specificity, is_compound, parse_selector_group,
    parse_single_selector,
};
pub use sheet::{Rule, parse_sheet, parse_sheet_file};
