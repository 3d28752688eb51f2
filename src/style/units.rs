//! # Units
//!
//! A length is a number tagged with a unit. Absolute units convert to points
//! on their own; everything else needs a [`ResolutionContext`]: percentages
//! resolve against the container, viewport units against the page, and
//! font-relative units against the active font.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::font::FontMetrics;

pub const POINTS_PER_INCH: f64 = 72.0;
pub const POINTS_PER_MM: f64 = POINTS_PER_INCH / 25.4;
pub const POINTS_PER_PIXEL: f64 = POINTS_PER_INCH / 96.0;

/// The unit a length is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Pt,
    Mm,
    In,
    Px,
    Percent,
    /// Current font size.
    Em,
    /// Root font size.
    Rem,
    /// x-height of the active font.
    Ex,
    /// Advance of `0` in the active font.
    Ch,
    Vw,
    Vh,
    Vmin,
    Vmax,
}

impl UnitKind {
    fn suffix(self) -> &'static str {
        match self {
            UnitKind::Pt => "pt",
            UnitKind::Mm => "mm",
            UnitKind::In => "in",
            UnitKind::Px => "px",
            UnitKind::Percent => "%",
            UnitKind::Em => "em",
            UnitKind::Rem => "rem",
            UnitKind::Ex => "ex",
            UnitKind::Ch => "ch",
            UnitKind::Vw => "vw",
            UnitKind::Vh => "vh",
            UnitKind::Vmin => "vmin",
            UnitKind::Vmax => "vmax",
        }
    }

    // Longest suffixes first so "vmin" is not read as "in".
    const PARSE_ORDER: [UnitKind; 13] = [
        UnitKind::Vmin,
        UnitKind::Vmax,
        UnitKind::Rem,
        UnitKind::Pt,
        UnitKind::Mm,
        UnitKind::In,
        UnitKind::Px,
        UnitKind::Em,
        UnitKind::Ex,
        UnitKind::Ch,
        UnitKind::Vw,
        UnitKind::Vh,
        UnitKind::Percent,
    ];
}

/// Which dimension of the container a percentage refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// A numeric value tagged with a unit. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UnitRepr", into = "String")]
pub struct Unit {
    pub value: f64,
    pub kind: UnitKind,
}

/// What resolution needs to know about the surroundings of a value.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext {
    /// Page width and height; viewport units resolve against this at any depth.
    pub page_size: (f64, f64),
    /// Definite container width, if known.
    pub container_width: Option<f64>,
    /// Definite container height, if known.
    pub container_height: Option<f64>,
    /// Metrics of the currently active font.
    pub font: FontMetrics,
    pub root_font_size: f64,
}

impl ResolutionContext {
    pub fn new(page_size: (f64, f64), font: FontMetrics, root_font_size: f64) -> Self {
        Self {
            page_size,
            container_width: None,
            container_height: None,
            font,
            root_font_size,
        }
    }

    pub fn with_container(mut self, width: Option<f64>, height: Option<f64>) -> Self {
        self.container_width = width;
        self.container_height = height;
        self
    }
}

impl Unit {
    pub const ZERO: Unit = Unit {
        value: 0.0,
        kind: UnitKind::Pt,
    };

    pub const fn new(value: f64, kind: UnitKind) -> Self {
        Self { value, kind }
    }

    pub const fn pt(value: f64) -> Self {
        Self::new(value, UnitKind::Pt)
    }

    pub const fn percent(value: f64) -> Self {
        Self::new(value, UnitKind::Percent)
    }

    pub const fn em(value: f64) -> Self {
        Self::new(value, UnitKind::Em)
    }

    /// Units that convert to points without any context.
    pub fn is_absolute(&self) -> bool {
        matches!(
            self.kind,
            UnitKind::Pt | UnitKind::Mm | UnitKind::In | UnitKind::Px
        )
    }

    /// The value in points for absolute units.
    pub fn absolute_points(&self) -> Option<f64> {
        match self.kind {
            UnitKind::Pt => Some(self.value),
            UnitKind::Mm => Some(self.value * POINTS_PER_MM),
            UnitKind::In => Some(self.value * POINTS_PER_INCH),
            UnitKind::Px => Some(self.value * POINTS_PER_PIXEL),
            _ => None,
        }
    }

    /// Resolve to an absolute length in points.
    pub fn resolve(&self, axis: Axis, ctx: &ResolutionContext) -> Result<f64, LayoutError> {
        if let Some(points) = self.absolute_points() {
            return Ok(points);
        }
        let (page_w, page_h) = ctx.page_size;
        let v = self.value;
        let points = match self.kind {
            UnitKind::Percent => {
                let (reference, reason) = match axis {
                    Axis::Horizontal => (ctx.container_width, "no definite container width"),
                    Axis::Vertical => (ctx.container_height, "no definite container height"),
                };
                let reference = reference.ok_or_else(|| LayoutError::UnresolvedDimension {
                    unit: self.to_string(),
                    reason,
                })?;
                reference * v / 100.0
            }
            UnitKind::Em => v * ctx.font.size,
            UnitKind::Rem => v * ctx.root_font_size,
            UnitKind::Ex => v * ctx.font.ex_height,
            UnitKind::Ch => v * ctx.font.zero_width,
            UnitKind::Vw => v * page_w / 100.0,
            UnitKind::Vh => v * page_h / 100.0,
            UnitKind::Vmin => v * page_w.min(page_h) / 100.0,
            UnitKind::Vmax => v * page_w.max(page_h) / 100.0,
            UnitKind::Pt | UnitKind::Mm | UnitKind::In | UnitKind::Px => unreachable!(),
        };
        Ok(points)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Unit::ZERO
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.kind.suffix())
    }
}

/// Error produced when a string is not a recognised length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseUnitError(pub String);

impl fmt::Display for ParseUnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid length", self.0)
    }
}

impl std::error::Error for ParseUnitError {}

impl FromStr for Unit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseUnitError(s.to_string()));
        }
        let lower = trimmed.to_ascii_lowercase();
        let (number, kind) = UnitKind::PARSE_ORDER
            .iter()
            .find_map(|kind| {
                lower
                    .strip_suffix(kind.suffix())
                    .map(|number| (number, *kind))
            })
            .unwrap_or((lower.as_str(), UnitKind::Pt));
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| ParseUnitError(s.to_string()))?;
        if !value.is_finite() {
            return Err(ParseUnitError(s.to_string()));
        }
        Ok(Unit::new(value, kind))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnitRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<UnitRepr> for Unit {
    type Error = ParseUnitError;

    fn try_from(repr: UnitRepr) -> Result<Self, Self::Error> {
        match repr {
            UnitRepr::Number(v) => Ok(Unit::pt(v)),
            UnitRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ResolutionContext {
        ResolutionContext::new((600.0, 800.0), FontMetrics::fallback(10.0), 12.0)
    }

    #[test]
    fn parses_all_suffixes() {
        let cases = [
            ("12pt", Unit::new(12.0, UnitKind::Pt)),
            ("10mm", Unit::new(10.0, UnitKind::Mm)),
            ("1in", Unit::new(1.0, UnitKind::In)),
            ("96px", Unit::new(96.0, UnitKind::Px)),
            ("50%", Unit::new(50.0, UnitKind::Percent)),
            ("2em", Unit::new(2.0, UnitKind::Em)),
            ("1.5rem", Unit::new(1.5, UnitKind::Rem)),
            ("1ex", Unit::new(1.0, UnitKind::Ex)),
            ("2ch", Unit::new(2.0, UnitKind::Ch)),
            ("10vw", Unit::new(10.0, UnitKind::Vw)),
            ("10vh", Unit::new(10.0, UnitKind::Vh)),
            ("5vmin", Unit::new(5.0, UnitKind::Vmin)),
            ("5VMAX", Unit::new(5.0, UnitKind::Vmax)),
            ("42", Unit::new(42.0, UnitKind::Pt)),
        ];
        for (text, expected) in cases {
            assert_eq!(text.parse::<Unit>().unwrap(), expected, "parsing {text}");
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Unit>().is_err());
        assert!("abc".parse::<Unit>().is_err());
        assert!("12furlongs".parse::<Unit>().is_err());
    }

    #[test]
    fn absolute_conversions() {
        let c = ctx();
        assert_eq!(Unit::new(1.0, UnitKind::In).resolve(Axis::Horizontal, &c).unwrap(), 72.0);
        let mm = Unit::new(25.4, UnitKind::Mm).resolve(Axis::Horizontal, &c).unwrap();
        assert!((mm - 72.0).abs() < 1e-9);
        assert_eq!(Unit::new(96.0, UnitKind::Px).resolve(Axis::Vertical, &c).unwrap(), 72.0);
    }

    #[test]
    fn percent_needs_a_definite_container() {
        let c = ctx();
        let err = Unit::percent(50.0).resolve(Axis::Vertical, &c).unwrap_err();
        assert!(matches!(err, LayoutError::UnresolvedDimension { .. }));

        let c = c.with_container(Some(400.0), Some(300.0));
        assert_eq!(Unit::percent(50.0).resolve(Axis::Horizontal, &c).unwrap(), 200.0);
        assert_eq!(Unit::percent(50.0).resolve(Axis::Vertical, &c).unwrap(), 150.0);
    }

    #[test]
    fn viewport_units_use_the_page() {
        let c = ctx().with_container(Some(10.0), Some(10.0));
        assert_eq!(Unit::new(10.0, UnitKind::Vw).resolve(Axis::Vertical, &c).unwrap(), 60.0);
        assert_eq!(Unit::new(10.0, UnitKind::Vh).resolve(Axis::Horizontal, &c).unwrap(), 80.0);
        assert_eq!(Unit::new(10.0, UnitKind::Vmin).resolve(Axis::Horizontal, &c).unwrap(), 60.0);
        assert_eq!(Unit::new(10.0, UnitKind::Vmax).resolve(Axis::Horizontal, &c).unwrap(), 80.0);
    }

    #[test]
    fn font_relative_units() {
        let c = ctx();
        assert_eq!(Unit::em(2.0).resolve(Axis::Horizontal, &c).unwrap(), 20.0);
        assert_eq!(Unit::new(2.0, UnitKind::Rem).resolve(Axis::Horizontal, &c).unwrap(), 24.0);
        let ex = Unit::new(1.0, UnitKind::Ex).resolve(Axis::Vertical, &c).unwrap();
        assert!((ex - 5.23).abs() < 1e-9);
        let ch = Unit::new(1.0, UnitKind::Ch).resolve(Axis::Horizontal, &c).unwrap();
        assert!((ch - 5.56).abs() < 1e-9);
    }

    #[test]
    fn serde_accepts_numbers_and_strings() {
        let units: Vec<Unit> = serde_json::from_str(r#"[12, "50%", "2em"]"#).unwrap();
        assert_eq!(units[0], Unit::pt(12.0));
        assert_eq!(units[1], Unit::percent(50.0));
        assert_eq!(serde_json::to_string(&units[2]).unwrap(), "\"2em\"");
    }
}
