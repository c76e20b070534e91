//! The validation engine.
//!
//! Rules are evaluated in declared order and the scan stops at the first
//! failing rule: one field surfaces at most one violation. Failures are
//! values ([`RuleFailure`]), never errors. Cross-field rules (`same`,
//! `confirmed`, `at_least_one`) read sibling values through [`ValueLookup`].
//!
//! Most rules are skipped for empty values (see
//! [`is_empty_value`](openform_core::value::is_empty_value)); only
//! `required`, `required_if`, `confirmed`, `same`, `at_least_one` and `in`
//! look at an empty value.

use std::fmt;
use std::sync::OnceLock;

use openform_core::value::{
    is_empty_value, is_truthy, length, parse_number, to_display_string, to_number,
};
pub use openform_core::value::ValueLookup;
use regex::Regex;
use serde_json::Value;

use crate::rules::{parse_rule_string, RuleKind, RuleToken};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// The first rule a value failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    /// The rule that failed.
    pub rule: RuleKind,
    /// The rule's raw parameter, for message formatting.
    pub param: Option<String>,
}

impl RuleFailure {
    /// Returns the name the failure is reported under (e.g. `"size"`).
    pub const fn name(&self) -> &'static str {
        self.rule.reported_name()
    }
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validates a value against a rule string.
///
/// Returns the first failing rule, or `None` if every rule passes.
///
/// # Examples
///
/// ```
/// use openform_rules::validate;
/// use serde_json::{json, Map};
///
/// let values = Map::new();
/// let rules = "required|size:17|regex:/^[A-HJ-NPR-Z0-9]+$/";
/// assert!(validate(rules, &json!("1HGCM82633A123456"), &values).is_none());
/// assert_eq!(validate(rules, &json!("SHORT"), &values).unwrap().name(), "size");
/// ```
pub fn validate<V: ValueLookup + ?Sized>(
    rule_string: &str,
    value: &Value,
    all_values: &V,
) -> Option<RuleFailure> {
    validate_tokens(&parse_rule_string(rule_string), value, all_values)
}

/// Validates a value against already-parsed tokens.
pub fn validate_tokens<V: ValueLookup + ?Sized>(
    tokens: &[RuleToken],
    value: &Value,
    all_values: &V,
) -> Option<RuleFailure> {
    tokens.iter().find_map(|token| check_token(token, value, all_values))
}

/// Evaluates every rule independently and returns all failures, in order.
///
/// The first element is always what [`validate_tokens`] reports.
pub fn failing_rules<V: ValueLookup + ?Sized>(
    tokens: &[RuleToken],
    value: &Value,
    all_values: &V,
) -> Vec<RuleFailure> {
    tokens
        .iter()
        .filter_map(|token| check_token(token, value, all_values))
        .collect()
}

fn check_token<V: ValueLookup + ?Sized>(
    token: &RuleToken,
    value: &Value,
    all_values: &V,
) -> Option<RuleFailure> {
    // Unknown rules are a forward-compatible no-op.
    let kind = token.kind()?;
    let param = token.param.as_deref();

    let failed = rule_fails(kind, param, value, all_values);
    tracing::trace!(rule = kind.as_str(), param, failed, "rule evaluated");

    failed.then(|| RuleFailure {
        rule: kind,
        param: token.param.clone(),
    })
}

/// Returns `true` if the value fails the rule.
fn rule_fails<V: ValueLookup + ?Sized>(
    kind: RuleKind,
    param: Option<&str>,
    value: &Value,
    all_values: &V,
) -> bool {
    let empty = is_empty_value(value);

    match kind {
        RuleKind::Nullable => false,
        RuleKind::Required | RuleKind::RequiredIf => empty,
        RuleKind::Email => !empty && !is_email(&rule_string(value)),
        RuleKind::Numeric => !empty && to_number(value).is_nan(),
        RuleKind::Integer => {
            if empty {
                return false;
            }
            let n = to_number(value);
            n.is_nan() || !n.is_finite() || n.fract() != 0.0
        }
        RuleKind::Digits | RuleKind::Size => {
            !empty && as_f64(length(&rule_string(value))) != param_number(param)
        }
        RuleKind::Min | RuleKind::Max => !empty && bound_fails(kind, param, value),
        RuleKind::Between => match param {
            Some(p) if !p.is_empty() && !empty => between_fails(p, value),
            _ => false,
        },
        RuleKind::Confirmed => {
            let other = lookup_or_null(all_values, param.unwrap_or(""));
            !strict_eq(value, other)
        }
        RuleKind::Same => match param {
            Some(p) if !p.is_empty() => !strict_eq(value, lookup_or_null(all_values, p)),
            _ => false,
        },
        RuleKind::AtLeastOne => match param {
            Some(p) if !p.is_empty() => !p
                .split(',')
                .any(|key| all_values.lookup(key).is_some_and(is_truthy)),
            _ => false,
        },
        RuleKind::Regex => match param {
            Some(p) if !p.is_empty() && !empty => regex_fails(p, &rule_string(value)),
            _ => false,
        },
        RuleKind::In => match param {
            Some(p) if !p.is_empty() => {
                let candidate = rule_string(value);
                !p.split(',').map(str::trim).any(|item| item == candidate)
            }
            _ => false,
        },
    }
}

// ============================================================
// Rule helpers
// ============================================================

/// Stringifies a value for string-based rules; null reads as "".
fn rule_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => to_display_string(other),
    }
}

fn lookup_or_null<'a, V: ValueLookup + ?Sized>(all_values: &'a V, id: &str) -> &'a Value {
    all_values.lookup(id).unwrap_or(&Value::Null)
}

/// A missing parameter reads as `0`, like `Number(null)`.
fn param_number(param: Option<&str>) -> f64 {
    param.map_or(0.0, parse_number)
}

#[allow(clippy::cast_precision_loss)]
const fn as_f64(n: usize) -> f64 {
    n as f64
}

fn bound_fails(kind: RuleKind, param: Option<&str>, value: &Value) -> bool {
    let bound = param_number(param);
    let param_is_numeric = param.is_some() && !bound.is_nan();

    let actual = if param_is_numeric {
        let n = to_number(value);
        if n.is_nan() {
            return true;
        }
        n
    } else {
        // Length mode; a non-numeric bound is NaN and never compares.
        as_f64(length(&rule_string(value)))
    };

    match kind {
        RuleKind::Min => actual < bound,
        _ => actual > bound,
    }
}

fn between_fails(param: &str, value: &Value) -> bool {
    let mut parts = param.split(',').map(str::trim);
    let lower = parts.next().map_or(f64::NAN, parse_number);
    let upper = parts.next().map_or(f64::NAN, parse_number);

    if !lower.is_nan() && !upper.is_nan() {
        let n = to_number(value);
        n.is_nan() || n < lower || n > upper
    } else {
        let len = as_f64(length(&rule_string(value)));
        len < lower || len > upper
    }
}

fn is_email(candidate: &str) -> bool {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .map_or(true, |re| re.is_match(candidate))
}

/// Equality for `same`/`confirmed`: no type coercion, numbers compare by value.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn regex_fails(param: &str, candidate: &str) -> bool {
    match compile_rule_regex(param) {
        Some(re) => !re.is_match(candidate),
        None => {
            tracing::debug!(pattern = param, "regex rule does not compile; treated as passing");
            false
        }
    }
}

/// Compiles a `regex:` parameter, honouring an optional `/pattern/flags` envelope.
///
/// Returns `None` for patterns that do not compile and for unsupported or
/// repeated flags; such rules pass.
pub(crate) fn compile_rule_regex(param: &str) -> Option<Regex> {
    let (pattern, flags) = match param.rfind('/') {
        Some(last) if param.starts_with('/') && last > 0 => (&param[1..last], &param[last + 1..]),
        _ => (param, ""),
    };

    let mut inline = String::new();
    let mut sticky = false;
    let mut seen = String::new();
    for flag in flags.chars() {
        if seen.contains(flag) {
            return None;
        }
        seen.push(flag);
        match flag {
            'i' | 'm' | 's' => inline.push(flag),
            'y' => sticky = true,
            'g' | 'u' | 'd' | 'v' => {}
            _ => return None,
        }
    }

    let mut source = String::new();
    if !inline.is_empty() {
        source.push_str("(?");
        source.push_str(&inline);
        source.push(')');
    }
    if sticky {
        source.push_str(r"\A(?:");
        source.push_str(pattern);
        source.push(')');
    } else {
        source.push_str(pattern);
    }

    Regex::new(&source).ok()
}
