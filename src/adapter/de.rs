//! Lenient field decoders for venue JSON.
//!
//! Venues disagree on whether numbers are sent as JSON numbers or strings, and
//! OKX sends `""` for absent values. These decoders accept all of those and
//! fall back to zero.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decimal from a number or string; empty or null is zero.
pub fn decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_decimal(&value))
}

/// Integer from a number or string; empty or null is zero.
pub fn int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_int(&value))
}

/// Leverage-like small integers; fractional strings such as `"20.00"` truncate.
pub fn uint<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = parse_decimal(&value).trunc();
    Ok(u32::try_from(i64::try_from(n).unwrap_or(0)).unwrap_or(0))
}

/// String from a string or number; null is empty.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text(&value).unwrap_or_default())
}

#[must_use]
pub fn parse_decimal(value: &Value) -> Decimal {
    text(value)
        .and_then(|s| {
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        })
        .unwrap_or(Decimal::ZERO)
}

#[must_use]
pub fn parse_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        other => text(other)
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0),
    }
}
