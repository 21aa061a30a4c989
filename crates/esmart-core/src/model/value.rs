// ── Loose JSON value semantics ──
//
// The remote controller speaks JSON produced by a dynamically typed
// peer. These helpers reproduce its notion of "truthy" and its lenient
// integer parsing so the bridge accepts exactly what the peer would.

use serde_json::Value;

/// `false` for null, `false`, `0`, `NaN` and `""`; `true` otherwise.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse the leading integer of a string (`"80%"` -> 80, `" -5"` -> -5).
///
/// Returns `None` when no digits follow the optional sign.
pub fn leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);
    if digits.is_empty() {
        return None;
    }
    // Saturate on overflow; callers clamp anyway.
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Interpret a dimming value as a 0–100 percentage.
///
/// Strings use their leading integer, numbers are truncated, anything
/// unparsable reads as 0.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn percent(value: &Value) -> u8 {
    let raw = match value {
        Value::String(s) => leading_int(s).unwrap_or(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        _ => 0,
    };
    u8::try_from(raw.clamp(0, 100)).unwrap_or(0)
}
