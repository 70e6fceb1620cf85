//! Unit conversion utilities.
//!
//! Every length written into a package goes through this module so that EMU
//! rounding and baseline-grid snapping happen in one place. [`Emu`] has no
//! public constructor; values come from the conversion functions below.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const EMUS_PER_INCH: i64 = 914_400;
pub const EMUS_PER_CM: i64 = 360_000;
pub const EMUS_PER_MM: i64 = 36_000;
pub const EMUS_PER_PT: i64 = 12_700;
pub const EMUS_PER_TWIP: i64 = 635;

/// Default baseline grid (0.01 cm).
pub const DEFAULT_BASELINE_GRID: i64 = 360;
pub const DEFAULT_DPI: u32 = 96;
pub const DEFAULT_BASE_POINTS: f64 = 12.0;

/// Errors produced while parsing size strings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("empty size value")]
    Empty,

    #[error("no numeric value found in '{0}'")]
    InvalidNumber(String),

    #[error("unknown length unit '{0}'")]
    UnknownUnit(String),
}

/// An integer number of English Metric Units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Emu(i64);

impl Emu {
    pub const ZERO: Emu = Emu(0);

    #[inline]
    pub fn value(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn to_points(self) -> f64 {
        self.0 as f64 / EMUS_PER_PT as f64
    }

    #[inline]
    pub fn to_inches(self) -> f64 {
        self.0 as f64 / EMUS_PER_INCH as f64
    }

    #[inline]
    pub fn to_pixels(self, dpi: u32) -> f64 {
        self.0 as f64 * dpi.max(1) as f64 / EMUS_PER_INCH as f64
    }

    /// Hundredths of a point, as used by DrawingML `sz` attributes.
    #[inline]
    pub fn to_centipoints(self) -> i64 {
        (self.to_points() * 100.0).round() as i64
    }

    /// Half points, as used by WordprocessingML `w:sz`.
    #[inline]
    pub fn to_half_points(self) -> i64 {
        (self.to_points() * 2.0).round() as i64
    }

    #[inline]
    pub fn to_twips(self) -> i64 {
        (self.0 as f64 / EMUS_PER_TWIP as f64).round() as i64
    }

    #[inline]
    pub fn saturating_add(self, other: Emu) -> Emu {
        Emu(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Emu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[inline]
fn round_emu(value: f64) -> Emu {
    Emu(value.round() as i64)
}

/// Wrap an EMU count read verbatim from a document.
#[inline]
pub fn raw_emu(value: i64) -> Emu {
    Emu(value)
}

#[inline]
pub fn points_to_emu(points: f64) -> Emu {
    round_emu(points * EMUS_PER_PT as f64)
}

#[inline]
pub fn pixels_to_emu(pixels: f64, dpi: u32) -> Emu {
    round_emu(pixels * EMUS_PER_INCH as f64 / dpi.max(1) as f64)
}

#[inline]
pub fn em_to_emu(em: f64, base_points: f64) -> Emu {
    points_to_emu(em * base_points)
}

#[inline]
pub fn inches_to_emu(inches: f64) -> Emu {
    round_emu(inches * EMUS_PER_INCH as f64)
}

#[inline]
pub fn twips_to_emu(twips: i64) -> Emu {
    Emu(twips.saturating_mul(EMUS_PER_TWIP))
}

/// Snap `emu` to the nearest multiple of `grid`; halfway values round away from zero.
///
/// A non-positive grid leaves the value unchanged.
pub fn align_to_baseline(emu: Emu, grid: i64) -> Emu {
    if grid <= 0 {
        return emu;
    }
    let (v, grid) = (i128::from(emu.0), i128::from(grid));
    let half = grid / 2;
    let mut snapped = if v >= 0 {
        (v + half) / grid * grid
    } else {
        -((-v + half) / grid * grid)
    };
    // Out-of-range results step back to the last representable grid line.
    if snapped > i128::from(i64::MAX) {
        snapped -= grid;
    } else if snapped < i128::from(i64::MIN) {
        snapped += grid;
    }
    Emu(snapped as i64)
}

/// Supported length units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    /// Point (1/72 inch)
    Point,
    /// Pixel at the configured DPI
    Pixel,
    /// Multiple of the base font size
    Em,
    /// Inch
    Inch,
    /// Percentage of the base font size
    Percent,
    /// English Metric Unit
    Emu,
    /// Centimeter
    Centimeter,
    /// Millimeter
    Millimeter,
}

impl LengthUnit {
    /// Get the unit abbreviation
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "pt",
            Self::Pixel => "px",
            Self::Em => "em",
            Self::Inch => "in",
            Self::Percent => "%",
            Self::Emu => "emu",
            Self::Centimeter => "cm",
            Self::Millimeter => "mm",
        }
    }

    fn from_str_internal(s: &str) -> Option<Self> {
        match s {
            "pt" => Some(Self::Point),
            "px" => Some(Self::Pixel),
            "em" | "rem" => Some(Self::Em),
            "in" | "inch" => Some(Self::Inch),
            "%" => Some(Self::Percent),
            "emu" => Some(Self::Emu),
            "cm" => Some(Self::Centimeter),
            "mm" => Some(Self::Millimeter),
            _ => None,
        }
    }

    /// Convert `value` expressed in this unit to EMU.
    pub fn to_emu(self, value: f64, base_points: f64, dpi: u32) -> Emu {
        match self {
            Self::Point => points_to_emu(value),
            Self::Pixel => pixels_to_emu(value, dpi),
            Self::Em => em_to_emu(value, base_points),
            Self::Inch => inches_to_emu(value),
            Self::Percent => points_to_emu(base_points * value / 100.0),
            Self::Emu => round_emu(value),
            Self::Centimeter => round_emu(value * EMUS_PER_CM as f64),
            Self::Millimeter => round_emu(value * EMUS_PER_MM as f64),
        }
    }

    /// Express `emu` in this unit.
    pub fn from_emu(self, emu: Emu, base_points: f64, dpi: u32) -> f64 {
        match self {
            Self::Point => emu.to_points(),
            Self::Pixel => emu.to_pixels(dpi),
            Self::Em => emu.to_points() / base_points,
            Self::Inch => emu.to_inches(),
            Self::Percent => emu.to_points() / base_points * 100.0,
            Self::Emu => emu.value() as f64,
            Self::Centimeter => emu.value() as f64 / EMUS_PER_CM as f64,
            Self::Millimeter => emu.value() as f64 / EMUS_PER_MM as f64,
        }
    }
}

impl FromStr for LengthUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, UnitError> {
        Self::from_str_internal(&s.to_ascii_lowercase())
            .ok_or_else(|| UnitError::UnknownUnit(s.to_string()))
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Split `"12.5pt"` into `(12.5, Some(Point))`. A bare number has no unit.
pub fn split_quantity(text: &str) -> Result<(f64, Option<LengthUnit>), UnitError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnitError::Empty);
    }

    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in text.char_indices() {
        let accept = c.is_ascii_digit()
            || (c == '.' && !seen_dot)
            || ((c == '-' || c == '+') && i == 0);
        if !accept {
            break;
        }
        if c == '.' {
            seen_dot = true;
        }
        end = i + c.len_utf8();
    }

    let (digits, suffix) = text.split_at(end);
    let value: f64 = digits
        .parse()
        .map_err(|_| UnitError::InvalidNumber(text.to_string()))?;

    let suffix = suffix.trim();
    if suffix.is_empty() {
        Ok((value, None))
    } else {
        Ok((value, Some(suffix.parse()?)))
    }
}

/// Parse a size such as `"12pt"`, `"16px"`, `"1.5em"`, `"0.5in"` or `"150%"`.
///
/// `em` and `%` are relative to `base_points`; a bare number is in points.
pub fn parse_size(text: &str, base_points: f64) -> Result<Emu, UnitError> {
    parse_size_with_dpi(text, base_points, DEFAULT_DPI)
}

pub fn parse_size_with_dpi(text: &str, base_points: f64, dpi: u32) -> Result<Emu, UnitError> {
    let (value, unit) = split_quantity(text)?;
    Ok(unit
        .unwrap_or(LengthUnit::Point)
        .to_emu(value, base_points, dpi))
}
