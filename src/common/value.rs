//! Structured values carried by patch documents and token layers.
//!
//! Values are classified once, at deserialization time, into scalars,
//! sequences and mappings. Mappings keep their source order.

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;
use std::fmt;

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::String(_) => "string",
        }
    }

    /// The text written into a document for this scalar.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => f.write_str(&format_number(*v)),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

/// Format a float without a trailing `.0` and with at most six decimals.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{:.6}", v);
    let s = match s.split_once('.') {
        Some((int, frac)) => match frac.trim_end_matches('0') {
            "" => int.to_string(),
            frac => format!("{}.{}", int, frac),
        },
        None => s,
    };
    if s == "-0" { "0".to_string() } else { s }
}

/// Tagged union of everything a patch `value` may hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    Scalar(Scalar),
    Sequence(Vec<PatchValue>),
    Mapping(IndexMap<String, PatchValue>),
}

impl PatchValue {
    #[inline]
    pub fn string(s: impl Into<String>) -> Self {
        PatchValue::Scalar(Scalar::String(s.into()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PatchValue::Scalar(s) => s.type_name(),
            PatchValue::Sequence(_) => "sequence",
            PatchValue::Mapping(_) => "mapping",
        }
    }

    #[inline]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            PatchValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    #[inline]
    pub fn as_sequence(&self) -> Option<&[PatchValue]> {
        match self {
            PatchValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn as_mapping(&self) -> Option<&IndexMap<String, PatchValue>> {
        match self {
            PatchValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` if this is a mapping.
    pub fn get(&self, key: &str) -> Option<&PatchValue> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PatchValue::Scalar(Scalar::Null))
    }

    /// Apply `f` to every string scalar, recursing through sequences and mappings.
    pub fn map_strings(&self, f: &mut impl FnMut(&str) -> String) -> PatchValue {
        match self {
            PatchValue::Scalar(Scalar::String(s)) => PatchValue::string(f(s)),
            PatchValue::Scalar(other) => PatchValue::Scalar(other.clone()),
            PatchValue::Sequence(items) => {
                PatchValue::Sequence(items.iter().map(|v| v.map_strings(f)).collect())
            },
            PatchValue::Mapping(map) => PatchValue::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.map_strings(f)))
                    .collect(),
            ),
        }
    }
}

impl From<Scalar> for PatchValue {
    fn from(s: Scalar) -> Self {
        PatchValue::Scalar(s)
    }
}

impl From<&str> for PatchValue {
    fn from(s: &str) -> Self {
        PatchValue::string(s)
    }
}

struct PatchValueVisitor;

impl<'de> Visitor<'de> for PatchValueVisitor {
    type Value = PatchValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar, sequence or mapping")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<PatchValue, E> {
        Ok(PatchValue::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PatchValue, E> {
        Ok(PatchValue::Scalar(Scalar::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PatchValue, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => PatchValue::Scalar(Scalar::Int(i)),
            Err(_) => PatchValue::Scalar(Scalar::Float(v as f64)),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<PatchValue, E> {
        Ok(PatchValue::Scalar(Scalar::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PatchValue, E> {
        Ok(PatchValue::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<PatchValue, E> {
        Ok(PatchValue::string(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<PatchValue, E> {
        Ok(PatchValue::Scalar(Scalar::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<PatchValue, E> {
        Ok(PatchValue::Scalar(Scalar::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<PatchValue, D::Error> {
        PatchValue::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PatchValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<PatchValue>()? {
            items.push(item);
        }
        Ok(PatchValue::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PatchValue, A::Error> {
        let mut out = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<PatchValue, PatchValue>()? {
            let key = match key {
                PatchValue::Scalar(s) => s.to_string(),
                other => {
                    return Err(de::Error::custom(format!(
                        "mapping keys must be scalars, found {}",
                        other.type_name()
                    )));
                },
            };
            out.insert(key, value);
        }
        Ok(PatchValue::Mapping(out))
    }
}

impl<'de> Deserialize<'de> for PatchValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PatchValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PatchValue::deserialize(deserializer)? {
            PatchValue::Scalar(s) => Ok(s),
            other => Err(de::Error::custom(format!(
                "expected a scalar, found {}",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(32.0), "32");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(-0.0000001), "0");
    }

    #[test]
    fn test_deserialize_yaml_structure() {
        let value: PatchValue = serde_saphyr::from_str("a: 1\nb: [x, true]\nc: {d: 2.5}\n").unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(map["a"], PatchValue::Scalar(Scalar::Int(1)));
        assert_eq!(map["b"].as_sequence().unwrap().len(), 2);
        assert_eq!(value.get("c").and_then(|c| c.get("d")), Some(&PatchValue::Scalar(Scalar::Float(2.5))));
    }

    #[test]
    fn test_map_strings_recurses() {
        let value: PatchValue = serde_saphyr::from_str("- a\n- {k: b}\n- 3\n").unwrap();
        let upper = value.map_strings(&mut |s| s.to_uppercase());
        let items = upper.as_sequence().unwrap();
        assert_eq!(items[0].as_str(), Some("A"));
        assert_eq!(items[1].get("k").and_then(PatchValue::as_str), Some("B"));
        assert_eq!(items[2], PatchValue::Scalar(Scalar::Int(3)));
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Bool(true).to_text(), "true");
        assert_eq!(Scalar::Float(2.0).to_text(), "2");
        assert_eq!(Scalar::Null.to_text(), "");
    }
}
