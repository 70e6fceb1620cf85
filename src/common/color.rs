//! Color values and the DrawingML color transforms.
//!
//! Transform amounts use the OOXML percentage unit: 100000 is 100%.
//! `tint` and `shade` mix in linear RGB the way Office renders
//! `<a:tint>`/`<a:shade>`; `lum_mod` and `lum_off` act on HSL luminance only.

use std::fmt;

/// 100% in OOXML thousandths of a percent.
pub const MAX_PERCENTAGE: i32 = 100_000;

/// RGB color representation.
///
/// Represents a color using red, green, and blue components, each in the range 0-255.
///
/// # Examples
///
/// ```rust
/// use kumquat::common::RGBColor;
///
/// let red = RGBColor::new(255, 0, 0);
/// let blue = RGBColor::from_hex("#0000FF").unwrap();
/// assert_eq!(blue.to_hex(), "0000FF");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RGBColor {
    /// Red component (0-255)
    pub r: u8,
    /// Green component (0-255)
    pub g: u8,
    /// Blue component (0-255)
    pub b: u8,
}

impl RGBColor {
    pub const WHITE: RGBColor = RGBColor::new(255, 255, 255);
    pub const BLACK: RGBColor = RGBColor::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create an RGB color from a hex string.
    ///
    /// Accepts `RRGGBB` and the short `RGB` form, with or without a leading `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::new(r, g, b))
            },
            3 => {
                let expand = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Self::new(expand(0)?, expand(1)?, expand(2)?))
            },
            _ => None,
        }
    }

    /// Parse `#RRGGBB`, `RRGGBB`, `#RGB` or `rgb(r, g, b)`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(inner) = text
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let mut parts = inner.split(',').map(|p| p.trim().parse::<u8>());
            let r = parts.next()?.ok()?;
            let g = parts.next()?.ok()?;
            let b = parts.next()?.ok()?;
            if parts.next().is_some() {
                return None;
            }
            return Some(Self::new(r, g, b));
        }
        Self::from_hex(text)
    }

    /// Convert to hex string (without # prefix), as written to `srgbClr/@val`.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn to_hsl(&self) -> Hsl {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let delta = max - min;

        if delta == 0.0 {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let s = if l > 0.5 {
            delta / (2.0 - max - min)
        } else {
            delta / (max + min)
        };
        let sector = if max == r {
            ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        Hsl { h: sector * 60.0, s, l }
    }
}

impl fmt::Display for RGBColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Hue in degrees, saturation and luminance in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    pub fn to_rgb(&self) -> RGBColor {
        let l = self.l.clamp(0.0, 1.0);
        let s = self.s.clamp(0.0, 1.0);
        if s == 0.0 {
            let v = channel(l);
            return RGBColor::new(v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let h = self.h.rem_euclid(360.0) / 360.0;

        RGBColor::new(
            channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
            channel(hue_to_rgb(p, q, h)),
            channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
        )
    }
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
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
}

#[inline]
fn channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn fraction(amount: i32) -> f64 {
    amount.clamp(0, MAX_PERCENTAGE) as f64 / MAX_PERCENTAGE as f64
}

fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(v: f64) -> u8 {
    let v = v.clamp(0.0, 1.0);
    let s = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    channel(s)
}

fn map_linear(color: RGBColor, f: impl Fn(f64) -> f64) -> RGBColor {
    RGBColor::new(
        linear_to_srgb(f(srgb_to_linear(color.r))),
        linear_to_srgb(f(srgb_to_linear(color.g))),
        linear_to_srgb(f(srgb_to_linear(color.b))),
    )
}

/// Mix toward white by `amount` (0 = unchanged, 100000 = white).
pub fn tint(color: RGBColor, amount: i32) -> RGBColor {
    if amount <= 0 {
        return color;
    }
    let t = fraction(amount);
    map_linear(color, |c| c + (1.0 - c) * t)
}

/// Mix toward black by `amount` (0 = unchanged, 100000 = black).
pub fn shade(color: RGBColor, amount: i32) -> RGBColor {
    if amount <= 0 {
        return color;
    }
    let t = fraction(amount);
    map_linear(color, |c| c * (1.0 - t))
}

/// Multiply HSL luminance by `amount / 100000`.
pub fn lum_mod(color: RGBColor, amount: i32) -> RGBColor {
    if amount == MAX_PERCENTAGE {
        return color;
    }
    let mut hsl = color.to_hsl();
    hsl.l = (hsl.l * amount.max(0) as f64 / MAX_PERCENTAGE as f64).clamp(0.0, 1.0);
    hsl.to_rgb()
}

/// Add `amount / 100000` to HSL luminance; negative amounts darken.
pub fn lum_off(color: RGBColor, amount: i32) -> RGBColor {
    if amount == 0 {
        return color;
    }
    let mut hsl = color.to_hsl();
    hsl.l = (hsl.l + amount as f64 / MAX_PERCENTAGE as f64).clamp(0.0, 1.0);
    hsl.to_rgb()
}

/// Office "Lighter N%": `lumMod(100% - N)` followed by `lumOff(N)`.
pub fn lighten(color: RGBColor, amount: i32) -> RGBColor {
    let amount = amount.clamp(0, MAX_PERCENTAGE);
    if amount == 0 {
        return color;
    }
    let mut hsl = color.to_hsl();
    let n = amount as f64 / MAX_PERCENTAGE as f64;
    hsl.l = (hsl.l * (1.0 - n) + n).clamp(0.0, 1.0);
    hsl.to_rgb()
}

/// Office "Darker N%": `lumMod(100% - N)`.
pub fn darken(color: RGBColor, amount: i32) -> RGBColor {
    let amount = amount.clamp(0, MAX_PERCENTAGE);
    lum_mod(color, MAX_PERCENTAGE - amount)
}

/// WCAG 2.x relative luminance.
pub fn relative_luminance(color: RGBColor) -> f64 {
    let lin = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.039_28 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * lin(color.r) + 0.7152 * lin(color.g) + 0.0722 * lin(color.b)
}

/// WCAG contrast ratio in `1.0..=21.0`.
pub fn contrast_ratio(fg: RGBColor, bg: RGBColor) -> f64 {
    let a = relative_luminance(fg);
    let b = relative_luminance(bg);
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    (hi + 0.05) / (lo + 0.05)
}
