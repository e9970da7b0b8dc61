//! Core value types shared across the engine.
//!
//! - [`geometry`]: positions, source ranges, and the range-identifier codec
//! - [`color`]: RGBA colors and relative color actions

pub mod color;
pub mod geometry;

pub use color::{Color, ColorAction, ColorParseError};
pub use geometry::{Position, SourceRange, identifier_to_range, range_identifier};
