//! Typing of raw daemon strings.
use crate::nut::VariableSet;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static INT_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("valid regex"));
static FLOAT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+(?:[.,][0-9]*)?$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NormalizedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NormalizedValue::Int(i) => Some(*i as f64),
            NormalizedValue::Float(f) => Some(*f),
            NormalizedValue::Text(_) => None,
        }
    }

    /// Numeric value for a computed quantity; integral results stay integers.
    pub fn from_f64(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            NormalizedValue::Int(value as i64)
        } else {
            NormalizedValue::Float(value)
        }
    }

    /// Classification applied to a value that may already be typed.
    #[cfg(test)]
    fn renormalize(self) -> Self {
        match self {
            NormalizedValue::Text(raw) => classify(&raw),
            typed => typed,
        }
    }
}

/// Integer first, then float, otherwise the string unchanged.
pub fn classify(raw: &str) -> NormalizedValue {
    if let Some(i) = parse_int(raw) {
        NormalizedValue::Int(i)
    } else if let Some(f) = parse_float(raw) {
        NormalizedValue::Float(f)
    } else {
        NormalizedValue::Text(raw.to_string())
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    if !INT_SHAPE.is_match(raw) {
        return None;
    }
    let int: i64 = raw.parse().ok()?;
    let float: f64 = raw.parse().ok()?;
    (int as f64 == float).then_some(int)
}

fn parse_float(raw: &str) -> Option<f64> {
    if !FLOAT_SHAPE.is_match(raw) {
        return None;
    }
    // A comma ends the number: only the whole part before it is read.
    let number = raw.split_once(',').map_or(raw, |(whole, _)| whole);
    number.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn normalize_vars(raw: VariableSet) -> BTreeMap<String, NormalizedValue> {
    raw.into_iter().map(|(name, value)| (name, classify(&value))).collect()
}
