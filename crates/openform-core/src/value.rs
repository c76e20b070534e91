//! Script-style coercions over JSON field values.
//!
//! Form definitions are authored for a browser runtime, and the rule language
//! relies on that runtime's loose conversions: `"42"` is numeric, `[]` is
//! empty, `"5"` compared with `"5"` is equal. The helpers here reproduce those
//! conversions over [`serde_json::Value`] so stored definitions keep their
//! meaning.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Read access to a set of named values (the form's value set or one table row).
pub trait ValueLookup {
    /// Returns the value stored under `id`, or `None` if there is none.
    fn lookup(&self, id: &str) -> Option<&Value>;
}

impl ValueLookup for Map<String, Value> {
    fn lookup(&self, id: &str) -> Option<&Value> {
        self.get(id)
    }
}

impl<S: BuildHasher> ValueLookup for HashMap<String, Value, S> {
    fn lookup(&self, id: &str) -> Option<&Value> {
        self.get(id)
    }
}

impl<S: BuildHasher> ValueLookup for IndexMap<String, Value, S> {
    fn lookup(&self, id: &str) -> Option<&Value> {
        self.get(id)
    }
}

impl ValueLookup for BTreeMap<String, Value> {
    fn lookup(&self, id: &str) -> Option<&Value> {
        self.get(id)
    }
}

/// A JSON object (such as a table row) is looked up by key; anything else holds no values.
impl ValueLookup for Value {
    fn lookup(&self, id: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(id))
    }
}

/// Returns `true` if the value counts as "empty" for validation purposes.
///
/// Null, whitespace-only strings and empty arrays are empty. Absent values are
/// represented as `Value::Null` by callers.
///
/// # Examples
///
/// ```
/// use openform_core::value::is_empty_value;
/// use serde_json::json;
///
/// assert!(is_empty_value(&json!(null)));
/// assert!(is_empty_value(&json!("   ")));
/// assert!(is_empty_value(&json!([])));
/// assert!(!is_empty_value(&json!(0)));
/// assert!(!is_empty_value(&json!(false)));
/// ```
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Coerces a value to a number the way the browser's `Number()` does.
///
/// Returns `f64::NAN` when the value has no numeric reading.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_number(s),
        Value::Array(_) => parse_number(&to_display_string(value)),
        Value::Object(_) => f64::NAN,
    }
}

/// Parses a string into a number with `Number()` string semantics.
///
/// Surrounding whitespace is ignored, the empty string is `0`, and
/// hexadecimal, octal and binary literals are accepted without a sign.
pub fn parse_number(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_radix(&s[2..], radix);
    }

    // Rust's float parser also accepts "inf" and "nan"; the browser does not.
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

#[allow(clippy::cast_precision_loss)]
fn parse_radix(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut acc = 0.0_f64;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => acc = acc.mul_add(f64::from(radix), f64::from(d)),
            None => return f64::NAN,
        }
    }
    acc
}

/// Formats a number the way the browser's `String()` does.
///
/// Whole numbers print without a fractional part, `NaN` and the infinities
/// print by name.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.abs() >= 1e21 {
        return format!("{n:e}").replace('e', "e+");
    }
    if n.fract() == 0.0 {
        return format!("{n:.0}");
    }
    n.to_string()
}

/// Stringifies a value the way the browser's `String()` does.
///
/// # Examples
///
/// ```
/// use openform_core::value::to_display_string;
/// use serde_json::json;
///
/// assert_eq!(to_display_string(&json!(3.0)), "3");
/// assert_eq!(to_display_string(&json!([1, "a", null])), "1,a,");
/// assert_eq!(to_display_string(&json!({"k": 1})), "[object Object]");
/// ```
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_f64() {
                format_number(n.as_f64().unwrap_or(f64::NAN))
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Returns the truthiness of a value.
///
/// `false`, `0`, `NaN`, `""` and `null` are falsy; everything else, including
/// empty arrays and objects, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Returns the length of a string in UTF-16 code units.
///
/// Stored rule strings were written against this count (`size:17` for a VIN),
/// so characters outside the basic plane count twice.
pub fn length(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Loose equality used for option matching: numbers compare numerically,
/// everything else by display string.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => to_display_string(a) == to_display_string(b),
    }
}
