//! Resolved token values.

use crate::common::color::RGBColor;
use crate::common::unit::{self, Emu, LengthUnit, UnitError};
use crate::common::value::{Scalar, format_number};
use serde::{Serialize, Serializer};
use std::fmt;

/// A token value after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Number(f64),
    Dimension { value: f64, unit: LengthUnit },
    Color(RGBColor),
    Text(String),
}

impl TokenValue {
    /// Classify literal token text: `#hex`/`rgb()` colors, numbers with an
    /// optional length unit, and anything else as text.
    pub fn from_literal(text: &str) -> Self {
        let trimmed = text.trim();
        if (trimmed.starts_with('#') || trimmed.starts_with("rgb("))
            && let Some(color) = RGBColor::parse(trimmed)
        {
            return TokenValue::Color(color);
        }
        match unit::split_quantity(trimmed) {
            Ok((value, None)) => TokenValue::Number(value),
            Ok((value, Some(unit))) => TokenValue::Dimension { value, unit },
            Err(_) => TokenValue::Text(text.to_string()),
        }
    }

    pub fn from_scalar(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Int(i) => TokenValue::Number(*i as f64),
            Scalar::Float(f) => TokenValue::Number(*f),
            Scalar::String(s) => TokenValue::from_literal(s),
            other => TokenValue::Text(other.to_text()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TokenValue::Number(_) => "number",
            TokenValue::Dimension { .. } => "dimension",
            TokenValue::Color(_) => "color",
            TokenValue::Text(_) => "text",
        }
    }

    /// The value as a color; text is parsed with or without a leading `#`.
    pub fn as_color(&self) -> Option<RGBColor> {
        match self {
            TokenValue::Color(c) => Some(*c),
            TokenValue::Text(t) => RGBColor::parse(t),
            _ => None,
        }
    }

    /// The value as a length. Bare numbers are points.
    pub fn to_emu(&self, base_points: f64, dpi: u32) -> Result<Emu, UnitError> {
        match self {
            TokenValue::Number(n) => Ok(unit::points_to_emu(*n)),
            TokenValue::Dimension { value, unit } => Ok(unit.to_emu(*value, base_points, dpi)),
            TokenValue::Text(t) => unit::parse_size_with_dpi(t, base_points, dpi),
            TokenValue::Color(c) => Err(UnitError::InvalidNumber(c.to_string())),
        }
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::Number(n) => f.write_str(&format_number(*n)),
            TokenValue::Dimension { value, unit } => write!(f, "{}{}", format_number(*value), unit),
            TokenValue::Color(c) => write!(f, "{}", c),
            TokenValue::Text(t) => f.write_str(t),
        }
    }
}

impl Serialize for TokenValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            TokenValue::from_literal("16px"),
            TokenValue::Dimension {
                value: 16.0,
                unit: LengthUnit::Pixel
            }
        );
        assert_eq!(TokenValue::from_literal("1.5"), TokenValue::Number(1.5));
        assert_eq!(
            TokenValue::from_literal("#4472C4"),
            TokenValue::Color(RGBColor::new(0x44, 0x72, 0xC4))
        );
        assert_eq!(
            TokenValue::from_literal("Calibri Light"),
            TokenValue::Text("Calibri Light".into())
        );
        // Hex without '#' stays text until a color is needed.
        assert_eq!(TokenValue::from_literal("FF0000").as_color(), Some(RGBColor::new(255, 0, 0)));
    }

    #[test]
    fn test_display() {
        let v = TokenValue::Dimension {
            value: 32.0,
            unit: LengthUnit::Pixel,
        };
        assert_eq!(v.to_string(), "32px");
        assert_eq!(TokenValue::Color(RGBColor::new(1, 2, 3)).to_string(), "#010203");
    }

    #[test]
    fn test_to_emu() {
        assert_eq!(TokenValue::Number(12.0).to_emu(12.0, 96).unwrap().value(), 152_400);
        assert_eq!(TokenValue::from_literal("1in").to_emu(12.0, 96).unwrap().value(), 914_400);
        assert!(TokenValue::from_literal("#fff").to_emu(12.0, 96).is_err());
    }
}
