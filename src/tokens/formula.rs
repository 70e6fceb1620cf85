//! Token formulas.
//!
//! A formula is arithmetic over numbers, lengths, colors and `{token.id}`
//! references, with color methods chained after a value:
//!
//! ```text
//! {spacing.base} * 2
//! ({spacing.base} + 4pt) / 2
//! {color.primary}.lighten(20%)
//! #4472C4.lumMod(75%).lumOff(10%)
//! ```

use super::value::TokenValue;
use crate::common::color::{self, MAX_PERCENTAGE, RGBColor};
use crate::common::unit::LengthUnit;
use memchr::memchr;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(TokenValue),
    Reference(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Method {
        target: Box<Expr>,
        name: String,
        argument: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Whether `text` contains a `{reference}`.
pub fn has_references(text: &str) -> bool {
    memchr(b'{', text.as_bytes()).is_some_and(|i| text[i..].contains('}'))
}

/// Referenced ids in order of first appearance.
pub fn references(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(open) = memchr(b'{', rest.as_bytes()) {
        let after = &rest[open + 1..];
        let Some(close) = memchr(b'}', after.as_bytes()) else {
            break;
        };
        let id = after[..close].trim();
        if is_token_id(id) && !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
        rest = &after[close + 1..];
    }
    out
}

/// Replace each `{id}` for which `lookup` has a value; the rest stay verbatim.
pub fn interpolate(text: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = memchr(b'{', rest.as_bytes()) {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = memchr(b'}', after.as_bytes()) else {
            out.push_str(&rest[open..]);
            return out;
        };
        let id = after[..close].trim();
        match lookup(id) {
            Some(value) if is_token_id(id) => out.push_str(&value),
            _ => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn is_token_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Number(f64, Option<LengthUnit>),
    Color(RGBColor),
    Reference(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Dot,
    LParen,
    RParen,
}

fn lex(text: &str) -> Result<Vec<Lexeme>, String> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'+' => {
                out.push(Lexeme::Plus);
                i += 1;
            },
            b'-' => {
                out.push(Lexeme::Minus);
                i += 1;
            },
            b'*' => {
                out.push(Lexeme::Star);
                i += 1;
            },
            b'/' => {
                out.push(Lexeme::Slash);
                i += 1;
            },
            b'(' => {
                out.push(Lexeme::LParen);
                i += 1;
            },
            b')' => {
                out.push(Lexeme::RParen);
                i += 1;
            },
            b'{' => {
                let close = memchr(b'}', &bytes[i..]).ok_or("unterminated reference")?;
                let id = text[i + 1..i + close].trim();
                if !is_token_id(id) {
                    return Err(format!("invalid reference '{{{}}}'", id));
                }
                out.push(Lexeme::Reference(id.to_string()));
                i += close + 1;
            },
            b'#' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
                    end += 1;
                }
                let hex = &text[start..end];
                let color = RGBColor::from_hex(hex).ok_or_else(|| format!("invalid color '#{}'", hex))?;
                out.push(Lexeme::Color(color));
                i = end;
            },
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i = lex_number(text, i, &mut out)?;
            },
            b'.' => {
                out.push(Lexeme::Dot);
                i += 1;
            },
            b'0'..=b'9' => {
                i = lex_number(text, i, &mut out)?;
            },
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                out.push(Lexeme::Ident(text[start..i].to_string()));
            },
            _ => {
                let ch = text[i..].chars().next().unwrap_or('?');
                return Err(format!("unexpected character '{}'", ch));
            },
        }
    }
    Ok(out)
}

fn lex_number(text: &str, start: usize, out: &mut Vec<Lexeme>) -> Result<usize, String> {
    let bytes = text.as_bytes();
    let mut i = start;
    let mut seen_dot = false;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => i += 1,
            b'.' if !seen_dot && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                seen_dot = true;
                i += 1;
            },
            _ => break,
        }
    }
    let value: f64 = text[start..i]
        .parse()
        .map_err(|_| format!("invalid number '{}'", &text[start..i]))?;

    let unit_start = i;
    if bytes.get(i) == Some(&b'%') {
        i += 1;
    } else {
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
    }
    let unit = if i > unit_start {
        let suffix = &text[unit_start..i];
        Some(
            suffix
                .parse::<LengthUnit>()
                .map_err(|_| format!("unknown unit '{}'", suffix))?,
        )
    } else {
        None
    };
    out.push(Lexeme::Number(value, unit));
    Ok(i)
}

/// Parse a formula. Text that is not a formula (for example
/// `"{font.family}, sans-serif"`) fails here and is interpolated instead.
pub fn parse(text: &str) -> Result<Expr, String> {
    let lexemes = lex(text)?;
    if lexemes.is_empty() {
        return Err("empty formula".to_string());
    }
    let mut parser = Parser { lexemes, pos: 0 };
    let expr = parser.expr()?;
    if parser.pos < parser.lexemes.len() {
        return Err(format!("unexpected {:?}", parser.lexemes[parser.pos]));
    }
    Ok(expr)
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        self.pos += 1;
        lexeme
    }

    fn expect(&mut self, want: Lexeme) -> Result<(), String> {
        match self.next() {
            Some(got) if got == want => Ok(()),
            Some(got) => Err(format!("expected {:?}, found {:?}", want, got)),
            None => Err(format!("expected {:?} at end of formula", want)),
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Lexeme::Plus) => BinaryOp::Add,
                Some(Lexeme::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Lexeme::Star) => BinaryOp::Mul,
                Some(Lexeme::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Lexeme::Minus) {
            self.pos += 1;
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut target = self.primary()?;
        while self.peek() == Some(&Lexeme::Dot) {
            self.pos += 1;
            let name = match self.next() {
                Some(Lexeme::Ident(name)) => name,
                other => return Err(format!("expected method name, found {:?}", other)),
            };
            self.expect(Lexeme::LParen)?;
            let argument = self.expr()?;
            self.expect(Lexeme::RParen)?;
            target = Expr::Method {
                target: Box::new(target),
                name,
                argument: Box::new(argument),
            };
        }
        Ok(target)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Lexeme::Number(value, None)) => Ok(Expr::Literal(TokenValue::Number(value))),
            Some(Lexeme::Number(value, Some(unit))) => {
                Ok(Expr::Literal(TokenValue::Dimension { value, unit }))
            },
            Some(Lexeme::Color(c)) => Ok(Expr::Literal(TokenValue::Color(c))),
            Some(Lexeme::Reference(id)) => Ok(Expr::Reference(id)),
            Some(Lexeme::LParen) => {
                let inner = self.expr()?;
                self.expect(Lexeme::RParen)?;
                Ok(inner)
            },
            Some(other) => Err(format!("unexpected {:?}", other)),
            None => Err("unexpected end of formula".to_string()),
        }
    }
}

/// Evaluates parsed formulas against already-resolved references.
pub struct Evaluator<'a> {
    pub values: &'a HashMap<String, TokenValue>,
    pub base_points: f64,
    pub dpi: u32,
}

impl Evaluator<'_> {
    pub fn evaluate(&self, expr: &Expr) -> Result<TokenValue, String> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Reference(id) => self
                .values
                .get(id)
                .cloned()
                .ok_or_else(|| format!("reference '{{{}}}' is not resolved", id)),
            Expr::Negate(inner) => match self.evaluate(inner)? {
                TokenValue::Number(n) => Ok(TokenValue::Number(-n)),
                TokenValue::Dimension { value, unit } => Ok(TokenValue::Dimension { value: -value, unit }),
                other => Err(format!("cannot negate a {}", other.type_name())),
            },
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate(lhs)?;
                let rhs = self.evaluate(rhs)?;
                self.binary(*op, lhs, rhs)
            },
            Expr::Method {
                target,
                name,
                argument,
            } => {
                let target = self.evaluate(target)?;
                let argument = self.evaluate(argument)?;
                self.method(target, name, argument)
            },
        }
    }

    fn convert(&self, value: f64, from: LengthUnit, to: LengthUnit) -> f64 {
        if from == to {
            return value;
        }
        let emu = from.to_emu(value, self.base_points, self.dpi);
        to.from_emu(emu, self.base_points, self.dpi)
    }

    fn binary(&self, op: BinaryOp, lhs: TokenValue, rhs: TokenValue) -> Result<TokenValue, String> {
        use TokenValue::{Dimension, Number};

        let dim = |value: f64, unit: LengthUnit| Dimension { value, unit };
        match (op, lhs, rhs) {
            (BinaryOp::Div, _, Number(d)) if d == 0.0 => Err("division by zero".to_string()),
            (BinaryOp::Add, Number(a), Number(b)) => Ok(Number(a + b)),
            (BinaryOp::Sub, Number(a), Number(b)) => Ok(Number(a - b)),
            (BinaryOp::Mul, Number(a), Number(b)) => Ok(Number(a * b)),
            (BinaryOp::Div, Number(a), Number(b)) => Ok(Number(a / b)),

            (BinaryOp::Mul, Dimension { value, unit }, Number(n))
            | (BinaryOp::Mul, Number(n), Dimension { value, unit }) => Ok(dim(value * n, unit)),
            (BinaryOp::Div, Dimension { value, unit }, Number(n)) => Ok(dim(value / n, unit)),

            // A bare number beside a length takes the length's unit.
            (BinaryOp::Add, Dimension { value, unit }, Number(n))
            | (BinaryOp::Add, Number(n), Dimension { value, unit }) => Ok(dim(value + n, unit)),
            (BinaryOp::Sub, Dimension { value, unit }, Number(n)) => Ok(dim(value - n, unit)),
            (BinaryOp::Sub, Number(n), Dimension { value, unit }) => Ok(dim(n - value, unit)),

            (op, Dimension { value: a, unit: ua }, Dimension { value: b, unit: ub }) => {
                let b = self.convert(b, ub, ua);
                match op {
                    BinaryOp::Add => Ok(dim(a + b, ua)),
                    BinaryOp::Sub => Ok(dim(a - b, ua)),
                    BinaryOp::Div if b == 0.0 => Err("division by zero".to_string()),
                    BinaryOp::Div => Ok(Number(a / b)),
                    BinaryOp::Mul => Err("cannot multiply two lengths".to_string()),
                }
            },
            (op, lhs, rhs) => Err(format!(
                "cannot apply {:?} to {} and {}",
                op,
                lhs.type_name(),
                rhs.type_name()
            )),
        }
    }

    fn method(&self, target: TokenValue, name: &str, argument: TokenValue) -> Result<TokenValue, String> {
        let color = target
            .as_color()
            .ok_or_else(|| format!(".{}() needs a color, found {}", name, target.type_name()))?;
        // 20% and 20 both mean twenty percent.
        let percent = match argument {
            TokenValue::Number(n) => n,
            TokenValue::Dimension {
                value,
                unit: LengthUnit::Percent,
            } => value,
            other => return Err(format!(".{}() needs a percentage, found {}", name, other)),
        };
        // Offsets may go negative; modulation may exceed 100%.
        let amount = (percent * 1000.0).round().clamp(-(MAX_PERCENTAGE as f64), MAX_PERCENTAGE as f64 * 10.0) as i32;
        let transformed = match name {
            "lighten" => color::lighten(color, amount),
            "darken" => color::darken(color, amount),
            "tint" => color::tint(color, amount),
            "shade" => color::shade(color, amount),
            "lumMod" | "lum_mod" => color::lum_mod(color, amount),
            "lumOff" | "lum_off" => color::lum_off(color, amount),
            other => return Err(format!("unknown color method '{}'", other)),
        };
        Ok(TokenValue::Color(transformed))
    }
}
