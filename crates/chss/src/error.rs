use thiserror::Error;

use crate::types::color::ColorParseError;

/// Errors surfaced by the CHSS engine.
///
/// Selector and sheet parsing are deliberately infallible (broken input is
/// dropped locally), so errors only arise at the edges: loading sheets
/// from disk, malformed tree queries, and color values that cannot be
/// interpreted.
#[derive(Debug, Error)]
pub enum ChssError {
    #[error("invalid tree query: {0}")]
    InvalidQuery(String),

    #[error("invalid color value: {0}")]
    InvalidColor(#[from] ColorParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
