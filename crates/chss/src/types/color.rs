//! RGBA color parsing and relative transforms.
//!
//! CHSS declarations carry colors as plain strings; they only become typed
//! [`Color`] values when a relative color action (`darken(...)`,
//! `saturate(...)`, ...) has to be computed against an overridden rule's
//! resolved color. Transform semantics follow the usual HSL-based
//! conventions: amounts are percentages, `spin` takes degrees.
//!
//! ## Supported color formats
//!
//! - **Hex**: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`
//! - **RGB**: `rgb(r, g, b)`, `rgba(r, g, b, a)`
//! - **Named**: the common CSS color names (`red`, `coral`, `rebeccapurple`)

use std::fmt;
use std::str::FromStr;

use nom::{
    IResult,
    bytes::complete::tag_no_case,
    character::complete::{char, multispace0},
    number::complete::float,
    sequence::{delimited, preceded, tuple},
};

/// Error returned when color parsing fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorParseError {
    /// Human-readable description of the parsing error.
    pub message: String,
}

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ColorParseError {}

fn err(message: impl Into<String>) -> ColorParseError {
    ColorParseError {
        message: message.into(),
    }
}

/// The common CSS color names. Basic set plus the handful of extended names
/// that show up in real CHSS sheets.
static NAMED_COLORS: phf::Map<&'static str, (u8, u8, u8)> = phf::phf_map! {
    "black" => (0, 0, 0),
    "silver" => (192, 192, 192),
    "gray" => (128, 128, 128),
    "grey" => (128, 128, 128),
    "white" => (255, 255, 255),
    "maroon" => (128, 0, 0),
    "red" => (255, 0, 0),
    "purple" => (128, 0, 128),
    "fuchsia" => (255, 0, 255),
    "magenta" => (255, 0, 255),
    "green" => (0, 128, 0),
    "lime" => (0, 255, 0),
    "olive" => (128, 128, 0),
    "yellow" => (255, 255, 0),
    "navy" => (0, 0, 128),
    "blue" => (0, 0, 255),
    "teal" => (0, 128, 128),
    "aqua" => (0, 255, 255),
    "cyan" => (0, 255, 255),
    "orange" => (255, 165, 0),
    "coral" => (255, 127, 80),
    "crimson" => (220, 20, 60),
    "gold" => (255, 215, 0),
    "indigo" => (75, 0, 130),
    "ivory" => (255, 255, 240),
    "khaki" => (240, 230, 140),
    "lavender" => (230, 230, 250),
    "pink" => (255, 192, 203),
    "plum" => (221, 160, 221),
    "salmon" => (250, 128, 114),
    "sienna" => (160, 82, 45),
    "tan" => (210, 180, 140),
    "tomato" => (255, 99, 71),
    "turquoise" => (64, 224, 208),
    "violet" => (238, 130, 238),
    "rebeccapurple" => (102, 51, 153),
};

/// An RGBA color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red component (0-255).
    pub r: u8,
    /// Green component (0-255).
    pub g: u8,
    /// Blue component (0-255).
    pub b: u8,
    /// Alpha component (0.0 = transparent, 1.0 = opaque).
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 1.0,
        }
    }
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// A uniformly random opaque color.
    pub fn random() -> Self {
        Self::rgb(rand::random(), rand::random(), rand::random())
    }

    /// Parse a color string in various formats.
    ///
    /// Supported formats:
    /// - Hex: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`
    /// - RGB: `rgb(r,g,b)`, `rgba(r,g,b,a)`
    /// - Named: common CSS color names
    pub fn parse(input: &str) -> Result<Self, ColorParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(err("empty color string"));
        }

        if let Some(hex) = input.strip_prefix('#') {
            return Self::parse_hex(hex);
        }

        let lower = input.to_lowercase();
        if lower.starts_with("rgb") {
            return match parse_rgb_func(&lower) {
                Ok((rest, color)) if rest.trim().is_empty() => Ok(color),
                _ => Err(err(format!("invalid rgb() color: {input}"))),
            };
        }

        if let Some(&(r, g, b)) = NAMED_COLORS.get(lower.as_str()) {
            return Ok(Self::rgb(r, g, b));
        }

        Err(err(format!("unknown color: {input}")))
    }

    fn parse_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits: Vec<u8> = hex
            .chars()
            .map(parse_hex_digit)
            .collect::<Result<_, _>>()?;

        match digits.as_slice() {
            [r, g, b] => Ok(Self::rgb(r * 17, g * 17, b * 17)),
            [r, g, b, a] => Ok(Self::rgba(r * 17, g * 17, b * 17, (a * 17) as f32 / 255.0)),
            [r1, r2, g1, g2, b1, b2] => Ok(Self::rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
            [r1, r2, g1, g2, b1, b2, a1, a2] => Ok(Self::rgba(
                r1 * 16 + r2,
                g1 * 16 + g2,
                b1 * 16 + b2,
                (a1 * 16 + a2) as f32 / 255.0,
            )),
            _ => Err(err(format!("invalid hex color length: {}", digits.len()))),
        }
    }

    /// Normalized `#rrggbbaa` form used for resolved declaration values.
    pub fn to_hex8_string(&self) -> String {
        let alpha = (self.a.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, alpha)
    }

    fn to_hsl(&self) -> (f32, f32, f32) {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;

        if (max - min).abs() < f32::EPSILON {
            return (0.0, 0.0, l);
        }

        let delta = max - min;
        let s = if l > 0.5 {
            delta / (2.0 - max - min)
        } else {
            delta / (max + min)
        };

        let h = if (max - r).abs() < f32::EPSILON {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if (max - g).abs() < f32::EPSILON {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        (h * 60.0, s, l)
    }

    fn from_hsl(h: f32, s: f32, l: f32, a: f32) -> Self {
        let h = h.rem_euclid(360.0) / 360.0;

        if s <= 0.0 {
            let v = (l * 255.0).round() as u8;
            return Self::rgba(v, v, v, a);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        let hue = |t: f32| -> f32 {
            let t = t.rem_euclid(1.0);
            if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            }
        };

        Self::rgba(
            (hue(h + 1.0 / 3.0) * 255.0).round() as u8,
            (hue(h) * 255.0).round() as u8,
            (hue(h - 1.0 / 3.0) * 255.0).round() as u8,
            a,
        )
    }

    /// Increase luminosity by `amount` percent.
    pub fn lighten(&self, amount: f32) -> Self {
        let (h, s, l) = self.to_hsl();
        Self::from_hsl(h, s, (l + amount / 100.0).clamp(0.0, 1.0), self.a)
    }

    /// Decrease luminosity by `amount` percent.
    pub fn darken(&self, amount: f32) -> Self {
        let (h, s, l) = self.to_hsl();
        Self::from_hsl(h, s, (l - amount / 100.0).clamp(0.0, 1.0), self.a)
    }

    /// Add `amount` percent of full scale to every RGB channel.
    pub fn brighten(&self, amount: f32) -> Self {
        let delta = (255.0 * amount / 100.0).round();
        let bump = |c: u8| (c as f32 + delta).clamp(0.0, 255.0) as u8;
        Self::rgba(bump(self.r), bump(self.g), bump(self.b), self.a)
    }

    /// Increase saturation by `amount` percent.
    pub fn saturate(&self, amount: f32) -> Self {
        let (h, s, l) = self.to_hsl();
        Self::from_hsl(h, (s + amount / 100.0).clamp(0.0, 1.0), l, self.a)
    }

    /// Decrease saturation by `amount` percent.
    pub fn desaturate(&self, amount: f32) -> Self {
        let (h, s, l) = self.to_hsl();
        Self::from_hsl(h, (s - amount / 100.0).clamp(0.0, 1.0), l, self.a)
    }

    /// Rotate the hue by `degrees`.
    pub fn spin(&self, degrees: f32) -> Self {
        let (h, s, l) = self.to_hsl();
        Self::from_hsl(h + degrees, s, l, self.a)
    }

    /// Fully desaturate.
    pub fn greyscale(&self) -> Self {
        self.desaturate(100.0)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_rgb_func(input: &str) -> IResult<&str, Color> {
    let (input, _) = tag_no_case("rgb")(input)?;
    let (input, _) = nom::combinator::opt(char('a'))(input)?;

    fn component(i: &str) -> IResult<&str, f32> {
        delimited(multispace0, float, multispace0)(i)
    }
    let (input, (r, g, b)) = delimited(
        char('('),
        tuple((
            component,
            preceded(char(','), component),
            preceded(char(','), component),
        )),
        nom::combinator::peek(nom::branch::alt((char(','), char(')')))),
    )(input)?;

    let (input, alpha) = nom::combinator::opt(preceded(char(','), component))(input)?;
    let (input, _) = char(')')(input)?;

    let clamp = |v: f32| v.clamp(0.0, 255.0).round() as u8;
    Ok((
        input,
        Color::rgba(clamp(r), clamp(g), clamp(b), alpha.unwrap_or(1.0).clamp(0.0, 1.0)),
    ))
}

fn parse_hex_digit(c: char) -> Result<u8, ColorParseError> {
    c.to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| err(format!("invalid hex digit: {c}")))
}

/// A relative color operation attached to a declaration, e.g.
/// `color: darken(10);`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorAction {
    Lighten,
    Brighten,
    Darken,
    Desaturate,
    Saturate,
    Spin,
    Greyscale,
    Random,
}

impl ColorAction {
    pub const ALL: [ColorAction; 8] = [
        ColorAction::Lighten,
        ColorAction::Brighten,
        ColorAction::Darken,
        ColorAction::Desaturate,
        ColorAction::Saturate,
        ColorAction::Spin,
        ColorAction::Greyscale,
        ColorAction::Random,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorAction::Lighten => "lighten",
            ColorAction::Brighten => "brighten",
            ColorAction::Darken => "darken",
            ColorAction::Desaturate => "desaturate",
            ColorAction::Saturate => "saturate",
            ColorAction::Spin => "spin",
            ColorAction::Greyscale => "greyscale",
            ColorAction::Random => "random",
        }
    }

    /// Applies this action to a base color. `amount` falls back to the
    /// conventional defaults when the declaration carried no argument.
    pub fn apply(&self, base: &Color, amount: Option<f32>) -> Color {
        match self {
            ColorAction::Lighten => base.lighten(amount.unwrap_or(10.0)),
            ColorAction::Brighten => base.brighten(amount.unwrap_or(10.0)),
            ColorAction::Darken => base.darken(amount.unwrap_or(10.0)),
            ColorAction::Desaturate => base.desaturate(amount.unwrap_or(10.0)),
            ColorAction::Saturate => base.saturate(amount.unwrap_or(10.0)),
            ColorAction::Spin => base.spin(amount.unwrap_or(0.0)),
            ColorAction::Greyscale => base.greyscale(),
            ColorAction::Random => Color::random(),
        }
    }
}

impl FromStr for ColorAction {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| err(format!("unknown color action: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Color::parse("#f00").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(Color::parse("#ff0000").unwrap(), Color::rgb(255, 0, 0));
        let translucent = Color::parse("#ff000080").unwrap();
        assert_eq!((translucent.r, translucent.g, translucent.b), (255, 0, 0));
        assert!((translucent.a - 0.5).abs() < 0.01);
    }

    #[test]
    fn parses_rgb_functions() {
        assert_eq!(
            Color::parse("rgb(255, 127, 0)").unwrap(),
            Color::rgb(255, 127, 0)
        );
        let c = Color::parse("rgba(0, 0, 0, 0.5)").unwrap();
        assert!((c.a - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_named_colors() {
        assert_eq!(Color::parse("red").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(Color::parse("Coral").unwrap(), Color::rgb(255, 127, 80));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Color::parse("").is_err());
        assert!(Color::parse("#12345").is_err());
        assert!(Color::parse("notacolor").is_err());
    }

    #[test]
    fn hex8_is_normalized() {
        assert_eq!(Color::rgb(255, 0, 0).to_hex8_string(), "#ff0000ff");
        assert_eq!(Color::rgba(0, 0, 0, 0.0).to_hex8_string(), "#00000000");
    }

    #[test]
    fn darken_reduces_luminosity() {
        let base = Color::rgb(255, 0, 0);
        let darker = base.darken(10.0);
        assert!(darker.r < base.r);
        // Darkening is deterministic, so the cascade memo can rely on it.
        assert_eq!(darker, base.darken(10.0));
    }

    #[test]
    fn lighten_and_darken_are_inverse_directions() {
        let base = Color::rgb(100, 100, 100);
        assert!(base.lighten(10.0).r > base.r);
        assert!(base.darken(10.0).r < base.r);
    }

    #[test]
    fn greyscale_removes_saturation() {
        let grey = Color::rgb(255, 0, 0).greyscale();
        assert_eq!(grey.r, grey.g);
        assert_eq!(grey.g, grey.b);
    }

    #[test]
    fn spin_wraps_hue() {
        let base = Color::rgb(255, 0, 0);
        assert_eq!(base.spin(360.0), base);
    }

    #[test]
    fn action_names_round_trip() {
        for action in ColorAction::ALL {
            assert_eq!(action.name().parse::<ColorAction>().unwrap(), action);
        }
        assert!("blur".parse::<ColorAction>().is_err());
    }
}
