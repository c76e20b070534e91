//! Expression evaluation.
//!
//! An [`Expr`] is evaluated against a [`ValueLookup`] context with
//! browser-style coercions (`"2" * 3` is `6`, `"a" + 1` is `"a1"`).
//!
//! Identifiers resolve against the context. The name `data` refers to the
//! context itself unless the context has a `data` entry, so both
//! `data.quantity` and `quantity` read the same value.
//!
//! Evaluation errors (reading a property of `undefined`, an unparsable
//! source) are contained: they are logged with `tracing::warn!` and the
//! result is `NaN`.

use std::cmp::Ordering;

use openform_core::error::FormError;
use openform_core::value::{format_number, parse_number, to_display_string, ValueLookup};
use serde_json::Value;

use crate::parser::{BinaryOp, Expr, Function, LogicalOp, Parser, UnaryOp, DEFAULT_MAX_DEPTH};

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    /// A missing value.
    Undefined,
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number; `NaN` is the failure sentinel.
    Number(f64),
    /// A string.
    String(String),
    /// An array or object from the context.
    Json(Value),
}

impl ExprValue {
    /// The value returned when evaluation fails.
    pub const NAN: Self = Self::Number(f64::NAN);

    /// Converts a context value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s.clone()),
            other => Self::Json(other.clone()),
        }
    }

    /// Converts back to JSON. `undefined` and non-finite numbers become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Undefined | Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Returns `true` if this is the `NaN` sentinel.
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Number(n) if n.is_nan())
    }

    /// Numeric coercion (`Number(x)`).
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_number(s),
            Self::Json(v) => openform_core::value::to_number(v),
        }
    }

    /// String coercion (`String(x)`).
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Json(v) => to_display_string(v),
        }
    }

    /// Boolean coercion (`Boolean(x)`).
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Json(_) => true,
        }
    }

    const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }
}

fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        #[allow(clippy::cast_possible_truncation)]
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// A parsed expression together with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    /// Parses an expression with the default nesting limit.
    pub fn parse(source: &str) -> Result<Self, FormError> {
        Self::parse_with_depth(source, DEFAULT_MAX_DEPTH)
    }

    /// Parses an expression with an explicit nesting limit.
    pub fn parse_with_depth(source: &str, max_depth: usize) -> Result<Self, FormError> {
        let ast = Parser::new(source, max_depth)?.parse_all()?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    /// Returns the source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parsed tree.
    pub const fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluates against a context; failures yield `NaN`.
    pub fn evaluate<C: ValueLookup + ?Sized>(&self, context: &C) -> ExprValue {
        match eval(&self.ast, context) {
            Ok(value) => value,
            Err(message) => {
                tracing::warn!(expression = %self.source, error = %message, "expression evaluation failed");
                ExprValue::NAN
            }
        }
    }
}

/// Evaluates a parsed tree against a context; failures yield `NaN`.
pub fn evaluate<C: ValueLookup + ?Sized>(expr: &Expr, context: &C) -> ExprValue {
    eval(expr, context).unwrap_or_else(|message| {
        tracing::warn!(error = %message, "expression evaluation failed");
        ExprValue::NAN
    })
}

/// Parses and evaluates in one step; parse and evaluation failures yield `NaN`.
pub fn evaluate_str<C: ValueLookup + ?Sized>(source: &str, context: &C, max_depth: usize) -> ExprValue {
    match Expression::parse_with_depth(source, max_depth) {
        Ok(expression) => expression.evaluate(context),
        Err(err) => {
            tracing::warn!(expression = source, error = %err, "expression does not parse");
            ExprValue::NAN
        }
    }
}

// ============================================================
// Tree walk
// ============================================================

type EvalResult = Result<ExprValue, String>;

/// Where a member access starts from.
enum Base<'a> {
    /// The context itself (`data`).
    Context,
    /// A concrete value.
    Value(ExprValue),
    /// A borrowed context entry.
    Borrowed(&'a Value),
}

fn eval<C: ValueLookup + ?Sized>(expr: &Expr, ctx: &C) -> EvalResult {
    Ok(match expr {
        Expr::Number(n) => ExprValue::Number(*n),
        Expr::Str(s) => ExprValue::String(s.clone()),
        Expr::Bool(b) => ExprValue::Bool(*b),
        Expr::Null => ExprValue::Null,
        Expr::Undefined => ExprValue::Undefined,
        Expr::Ident(_) | Expr::Member(..) | Expr::Index(..) => match resolve(expr, ctx)? {
            Base::Context => return Err("the data context is not a value".to_string()),
            Base::Value(v) => v,
            Base::Borrowed(v) => ExprValue::from_json(v),
        },
        Expr::Unary(op, operand) => {
            let v = eval(operand, ctx)?;
            match op {
                UnaryOp::Not => ExprValue::Bool(!v.is_truthy()),
                UnaryOp::Neg => ExprValue::Number(-v.to_number()),
                UnaryOp::Plus => ExprValue::Number(v.to_number()),
            }
        }
        Expr::Binary(op, left, right) => binary(*op, &eval(left, ctx)?, &eval(right, ctx)?),
        Expr::Logical(op, left, right) => {
            let l = eval(left, ctx)?;
            let take_left = match op {
                LogicalOp::And => !l.is_truthy(),
                LogicalOp::Or => l.is_truthy(),
                LogicalOp::Nullish => !l.is_nullish(),
            };
            if take_left {
                l
            } else {
                eval(right, ctx)?
            }
        }
        Expr::Conditional(test, then, otherwise) => {
            if eval(test, ctx)?.is_truthy() {
                eval(then, ctx)?
            } else {
                eval(otherwise, ctx)?
            }
        }
        Expr::Call(function, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, &values)
        }
    })
}

/// Resolves identifiers and property chains without cloning whole rows.
fn resolve<'a, C: ValueLookup + ?Sized>(expr: &Expr, ctx: &'a C) -> Result<Base<'a>, String> {
    match expr {
        Expr::Ident(name) => Ok(match ctx.lookup(name) {
            Some(v) => Base::Borrowed(v),
            None if name == "data" => Base::Context,
            None => Base::Value(ExprValue::Undefined),
        }),
        Expr::Member(object, name) => {
            let base = resolve(object, ctx)?;
            property(base, name, ctx)
        }
        Expr::Index(object, index) => {
            let base = resolve(object, ctx)?;
            let key = eval(index, ctx)?.to_display_string();
            property(base, &key, ctx)
        }
        other => Ok(Base::Value(eval(other, ctx)?)),
    }
}

fn property<'a, C: ValueLookup + ?Sized>(base: Base<'a>, name: &str, ctx: &'a C) -> Result<Base<'a>, String> {
    match base {
        Base::Context => Ok(ctx
            .lookup(name)
            .map_or(Base::Value(ExprValue::Undefined), Base::Borrowed)),
        Base::Borrowed(value) => Ok(match json_property(value, name)? {
            Some(found) => Base::Borrowed(found),
            None => Base::Value(builtin_property(value, name)),
        }),
        Base::Value(value) => match value {
            ExprValue::Undefined => Err(format!("cannot read property '{name}' of undefined")),
            ExprValue::Null => Err(format!("cannot read property '{name}' of null")),
            ExprValue::String(s) => Ok(Base::Value(builtin_property(&Value::String(s), name))),
            ExprValue::Json(v) => Ok(Base::Value(match json_property(&v, name)? {
                Some(found) => ExprValue::from_json(found),
                None => builtin_property(&v, name),
            })),
            ExprValue::Bool(_) | ExprValue::Number(_) => Ok(Base::Value(ExprValue::Undefined)),
        },
    }
}

fn json_property<'v>(value: &'v Value, name: &str) -> Result<Option<&'v Value>, String> {
    match value {
        Value::Null => Err(format!("cannot read property '{name}' of null")),
        Value::Object(map) => Ok(map.get(name)),
        Value::Array(items) => Ok(name.parse::<usize>().ok().and_then(|i| items.get(i))),
        _ => Ok(None),
    }
}

/// `length` of strings (UTF-16 units) and arrays; every other property is undefined.
fn builtin_property(value: &Value, name: &str) -> ExprValue {
    match (value, name) {
        (Value::String(s), "length") => ExprValue::Number(len_f64(s.encode_utf16().count())),
        (Value::Array(items), "length") => ExprValue::Number(len_f64(items.len())),
        _ => ExprValue::Undefined,
    }
}

#[allow(clippy::cast_precision_loss)]
const fn len_f64(n: usize) -> f64 {
    n as f64
}

fn binary(op: BinaryOp, l: &ExprValue, r: &ExprValue) -> ExprValue {
    match op {
        BinaryOp::Add => {
            if is_stringish(l) || is_stringish(r) {
                ExprValue::String(l.to_display_string() + &r.to_display_string())
            } else {
                ExprValue::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => ExprValue::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => ExprValue::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => ExprValue::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => ExprValue::Number(l.to_number() % r.to_number()),
        BinaryOp::LooseEq => ExprValue::Bool(loose_eq(l, r)),
        BinaryOp::LooseNe => ExprValue::Bool(!loose_eq(l, r)),
        BinaryOp::StrictEq => ExprValue::Bool(strict_eq(l, r)),
        BinaryOp::StrictNe => ExprValue::Bool(!strict_eq(l, r)),
        BinaryOp::Lt => ExprValue::Bool(compare(l, r) == Some(Ordering::Less)),
        BinaryOp::Le => ExprValue::Bool(matches!(compare(l, r), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Gt => ExprValue::Bool(compare(l, r) == Some(Ordering::Greater)),
        BinaryOp::Ge => ExprValue::Bool(matches!(compare(l, r), Some(Ordering::Greater | Ordering::Equal))),
    }
}

/// Arrays and objects convert to strings before `+`, like strings themselves.
const fn is_stringish(v: &ExprValue) -> bool {
    matches!(v, ExprValue::String(_) | ExprValue::Json(_))
}

fn compare(l: &ExprValue, r: &ExprValue) -> Option<Ordering> {
    if let (ExprValue::String(a), ExprValue::String(b)) = (l, r) {
        return Some(a.encode_utf16().cmp(b.encode_utf16()));
    }
    l.to_number().partial_cmp(&r.to_number())
}

fn strict_eq(l: &ExprValue, r: &ExprValue) -> bool {
    match (l, r) {
        (ExprValue::Number(a), ExprValue::Number(b)) => a == b,
        _ => l == r,
    }
}

fn loose_eq(l: &ExprValue, r: &ExprValue) -> bool {
    match (l, r) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (ExprValue::String(a), ExprValue::String(b)) => a == b,
        (ExprValue::Json(a), ExprValue::Json(b)) => a == b,
        (ExprValue::Json(_), other) | (other, ExprValue::Json(_)) if matches!(other, ExprValue::String(_)) => {
            l.to_display_string() == r.to_display_string()
        }
        _ => l.to_number() == r.to_number(),
    }
}

fn call(function: Function, args: &[ExprValue]) -> ExprValue {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(ExprValue::Undefined);
    let num = |i: usize| arg(i).to_number();

    match function {
        Function::Number => {
            if args.is_empty() {
                ExprValue::Number(0.0)
            } else {
                ExprValue::Number(num(0))
            }
        }
        Function::String => {
            if args.is_empty() {
                ExprValue::String(String::new())
            } else {
                ExprValue::String(arg(0).to_display_string())
            }
        }
        Function::Boolean => ExprValue::Bool(arg(0).is_truthy()),
        Function::ParseFloat => ExprValue::Number(parse_float_prefix(&arg(0).to_display_string())),
        Function::ParseInt => {
            let radix = args.get(1).map(ExprValue::to_number);
            ExprValue::Number(parse_int_prefix(&arg(0).to_display_string(), radix))
        }
        Function::IsNaN => ExprValue::Bool(num(0).is_nan()),
        // Rounds half towards positive infinity.
        Function::Round => ExprValue::Number((num(0) + 0.5).floor()),
        Function::Floor => ExprValue::Number(num(0).floor()),
        Function::Ceil => ExprValue::Number(num(0).ceil()),
        Function::Abs => ExprValue::Number(num(0).abs()),
        Function::Trunc => ExprValue::Number(num(0).trunc()),
        Function::Sqrt => ExprValue::Number(num(0).sqrt()),
        Function::Pow => ExprValue::Number(num(0).powf(num(1))),
        Function::Min => ExprValue::Number(fold_numbers(args, f64::INFINITY, f64::min)),
        Function::Max => ExprValue::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)),
        Function::ToFixed => {
            let n = num(0);
            let digits = args.get(1).map_or(0.0, ExprValue::to_number);
            if n.is_nan() || !(0.0..=100.0).contains(&digits) {
                return ExprValue::String(format_number(n));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let digits = digits.trunc() as usize;
            ExprValue::String(format!("{n:.digits$}"))
        }
    }
}

fn fold_numbers(args: &[ExprValue], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    for prefix in ["Infinity", "+Infinity", "-Infinity"] {
        if s.starts_with(prefix) {
            return if prefix.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
        }
    }
    // Longest prefix that parses as a decimal float.
    let candidate: String = s
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .collect();
    (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn parse_int_prefix(s: &str, radix: Option<f64>) -> f64 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    // A missing, NaN or zero radix means "decimal, unless prefixed with 0x".
    let radix = radix.filter(|r| !r.is_nan() && *r != 0.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut base = radix.map_or(10, |r| r.trunc() as u32);
    let mut digits = rest;
    let hex_prefixed = rest.starts_with("0x") || rest.starts_with("0X");
    if hex_prefixed && (radix.is_none() || base == 16) {
        base = 16;
        digits = &rest[2..];
    }
    if !(2..=36).contains(&base) {
        return f64::NAN;
    }

    let mut acc: Option<f64> = None;
    for c in digits.chars() {
        match c.to_digit(base) {
            Some(d) => acc = Some(acc.unwrap_or(0.0).mul_add(f64::from(base), f64::from(d))),
            None => break,
        }
    }
    acc.map_or(f64::NAN, |n| if negative { -n } else { n })
}
