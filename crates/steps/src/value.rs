//! Loose coercions for submitted values.
//!
//! Browser-side forms hand us strings, numbers, booleans, string arrays or
//! null, and saved workflows compare them the way a browser script would.
//! These helpers give every comparison and template one consistent set of
//! rules.  A missing field is `None`.

use serde_json::{Number, Value};

/// Render a value as text.
pub fn to_text(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_owned(),
        Some(v) => value_text(v),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => value_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_owned(),
    }
}

fn number_text(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) => float_text(f),
        None => n.to_string(),
    }
}

fn float_text(f: f64) -> String {
    if f == 0.0 {
        "0".to_owned()
    } else if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

/// Numeric reading of a value; `NaN` when it has none.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => parse_number(&value_text(single)),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    // Rust's float parser also accepts "inf"/"nan" spellings; keep to plain decimals.
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// True for absent, null, `false`, `0`, `NaN`, `""` and `[]`.
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f == 0.0 || f.is_nan()),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_rendering() {
        assert_eq!(to_text(Some(&json!("abc"))), "abc");
        assert_eq!(to_text(Some(&json!(25))), "25");
        assert_eq!(to_text(Some(&json!(2.5))), "2.5");
        assert_eq!(to_text(Some(&json!(3.0))), "3");
        assert_eq!(to_text(Some(&json!(true))), "true");
        assert_eq!(to_text(Some(&Value::Null)), "null");
        assert_eq!(to_text(None), "undefined");
        assert_eq!(to_text(Some(&json!(["a", null, "b"]))), "a,,b");
        assert_eq!(to_text(Some(&json!({"k": 1}))), "[object Object]");
    }

    #[test]
    fn numeric_reading() {
        assert_eq!(to_number(Some(&json!("25"))), 25.0);
        assert_eq!(to_number(Some(&json!("  7.5 "))), 7.5);
        assert_eq!(to_number(Some(&json!(""))), 0.0);
        assert_eq!(to_number(Some(&json!("0x10"))), 16.0);
        assert_eq!(to_number(Some(&json!(true))), 1.0);
        assert_eq!(to_number(Some(&json!(["4"]))), 4.0);
        assert!(to_number(Some(&json!("abc"))).is_nan());
        assert!(to_number(Some(&json!("inf"))).is_nan());
        assert!(to_number(None).is_nan());
    }

    #[test]
    fn emptiness() {
        assert!(is_empty(None));
        assert!(is_empty(Some(&json!(""))));
        assert!(is_empty(Some(&json!(0))));
        assert!(is_empty(Some(&json!(false))));
        assert!(is_empty(Some(&json!([]))));
        assert!(!is_empty(Some(&json!("x"))));
        assert!(!is_empty(Some(&json!(["a"]))));
        assert!(!is_empty(Some(&json!({}))));
    }
}
