//! Rule string parsing.
//!
//! The grammar is `rule(":"param)? ("|" rule(":"param)?)*`. Stored form
//! definitions embed these strings, so parsing must stay bit-exact:
//!
//! - the string is split on `|` and each token is trimmed;
//! - empty tokens are dropped;
//! - each token is split on its *first* `:` only, so parameters may contain
//!   further colons (`regex:/^\d{2}:\d{2}$/`).

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One parsed `(name, parameter)` pair from a rule string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleToken {
    /// The rule name, e.g. `"min"`.
    pub name: String,
    /// The raw parameter after the first `:`, if any.
    pub param: Option<String>,
}

impl RuleToken {
    /// Creates a token from a name and an optional parameter.
    pub fn new(name: impl Into<String>, param: Option<&str>) -> Self {
        Self {
            name: name.into(),
            param: param.map(String::from),
        }
    }

    /// Returns the recognized rule kind, or `None` for unknown rule names.
    pub fn kind(&self) -> Option<RuleKind> {
        RuleKind::from_name(&self.name)
    }

    /// Returns the parameter as a comma-separated list (not trimmed).
    pub fn param_list(&self) -> Vec<&str> {
        self.param
            .as_deref()
            .map(|p| p.split(',').collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for RuleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}:{param}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The rules understood by the validation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Never fails.
    Nullable,
    /// Fails on an empty value.
    Required,
    /// Same as [`Required`](Self::Required); the condition parameter is not interpreted.
    RequiredIf,
    /// A simple `local@domain.tld` shape.
    Email,
    /// Parses as a number.
    Numeric,
    /// Parses as a whole number.
    Integer,
    /// Exact string length.
    Digits,
    /// Exact string length.
    Size,
    /// Lower bound, numeric or by length.
    Min,
    /// Upper bound, numeric or by length.
    Max,
    /// Inclusive range, numeric or by length.
    Between,
    /// Equal to another field.
    Confirmed,
    /// Equal to another field.
    Same,
    /// At least one of the listed fields is truthy.
    AtLeastOne,
    /// Matches a `/pattern/flags` expression.
    Regex,
    /// One of the listed literals.
    In,
}

impl RuleKind {
    /// All rule kinds, in documentation order.
    pub const ALL: [Self; 16] = [
        Self::Nullable,
        Self::Required,
        Self::RequiredIf,
        Self::Email,
        Self::Numeric,
        Self::Integer,
        Self::Digits,
        Self::Size,
        Self::Min,
        Self::Max,
        Self::Between,
        Self::Confirmed,
        Self::Same,
        Self::AtLeastOne,
        Self::Regex,
        Self::In,
    ];

    /// Looks up a rule by its wire name. Names are case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Returns the wire name of the rule.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nullable => "nullable",
            Self::Required => "required",
            Self::RequiredIf => "required_if",
            Self::Email => "email",
            Self::Numeric => "numeric",
            Self::Integer => "integer",
            Self::Digits => "digits",
            Self::Size => "size",
            Self::Min => "min",
            Self::Max => "max",
            Self::Between => "between",
            Self::Confirmed => "confirmed",
            Self::Same => "same",
            Self::AtLeastOne => "at_least_one",
            Self::Regex => "regex",
            Self::In => "in",
        }
    }

    /// Returns the name a failure of this rule is reported under.
    ///
    /// `required_if` failures are reported as `required`.
    pub const fn reported_name(self) -> &'static str {
        match self {
            Self::RequiredIf => "required",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a pipe-delimited rule string into an ordered list of tokens.
///
/// # Examples
///
/// ```
/// use openform_rules::{parse_rule_string, RuleToken};
///
/// let tokens = parse_rule_string("required|min:2|same:ownerEmail");
/// assert_eq!(
///     tokens,
///     vec![
///         RuleToken::new("required", None),
///         RuleToken::new("min", Some("2")),
///         RuleToken::new("same", Some("ownerEmail")),
///     ]
/// );
/// ```
pub fn parse_rule_string(rule_string: &str) -> Vec<RuleToken> {
    rule_string
        .split('|')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once(':') {
            Some((name, param)) => RuleToken::new(name, Some(param)),
            None => RuleToken::new(token, None),
        })
        .collect()
}

/// The parsed rules of one field, in declared order.
///
/// A field may declare several rule strings (`validators: ["required",
/// "in:manual,automatic"]`); they behave as one string joined by `|`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    tokens: Vec<RuleToken>,
}

impl RuleSet {
    /// Parses a single rule string.
    pub fn parse(rule_string: &str) -> Self {
        Self {
            tokens: parse_rule_string(rule_string),
        }
    }

    /// Parses a list of rule strings as if they were joined by `|`.
    pub fn from_validators<I, S>(validators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: validators
                .into_iter()
                .flat_map(|v| parse_rule_string(v.as_ref()))
                .collect(),
        }
    }

    /// Returns the tokens in declared order.
    pub fn tokens(&self) -> &[RuleToken] {
        &self.tokens
    }

    /// Returns `true` if no rules are declared.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns `true` if any token is of the given kind.
    pub fn contains(&self, kind: RuleKind) -> bool {
        self.tokens.iter().any(|t| t.kind() == Some(kind))
    }

    /// Returns `true` if the field must hold a value.
    pub fn is_required(&self) -> bool {
        self.contains(RuleKind::Required) || self.contains(RuleKind::RequiredIf)
    }
}

impl FromStr for RuleSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .tokens
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|");
        f.write_str(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let tokens = parse_rule_string("required|min:2|same:ownerEmail");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], RuleToken::new("required", None));
        assert_eq!(tokens[1], RuleToken::new("min", Some("2")));
        assert_eq!(tokens[2], RuleToken::new("same", Some("ownerEmail")));
    }

    #[test]
    fn test_parse_trims_and_drops_empty_tokens() {
        let tokens = parse_rule_string("  required || max:60 |  ");
        assert_eq!(
            tokens,
            vec![RuleToken::new("required", None), RuleToken::new("max", Some("60"))]
        );
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let tokens = parse_rule_string(r"regex:/^\d{2}:\d{2}$/");
        assert_eq!(tokens[0].name, "regex");
        assert_eq!(tokens[0].param.as_deref(), Some(r"/^\d{2}:\d{2}$/"));
    }

    #[test]
    fn test_parse_trailing_colon_gives_empty_param() {
        let tokens = parse_rule_string("min:");
        assert_eq!(tokens[0].param.as_deref(), Some(""));
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(parse_rule_string("").is_empty());
        assert!(parse_rule_string(" | | ").is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let input = "required|between:1,5|in:a,b";
        assert_eq!(parse_rule_string(input), parse_rule_string(input));
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(RuleKind::from_name("at_least_one"), Some(RuleKind::AtLeastOne));
        assert_eq!(RuleKind::from_name("Required"), None);
        assert_eq!(RuleKind::from_name("date"), None);
        for kind in RuleKind::ALL {
            assert_eq!(RuleKind::from_name(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_required_if_reports_required() {
        assert_eq!(RuleKind::RequiredIf.reported_name(), "required");
        assert_eq!(RuleKind::Max.reported_name(), "max");
    }

    #[test]
    fn test_param_list() {
        let token = RuleToken::new("in", Some("petrol,diesel, hybrid"));
        assert_eq!(token.param_list(), vec!["petrol", "diesel", " hybrid"]);
        assert!(RuleToken::new("required", None).param_list().is_empty());
    }

    #[test]
    fn test_rule_set_from_validators_and_display() {
        let set = RuleSet::from_validators(["required", "in:manual,automatic"]);
        assert_eq!(set.tokens().len(), 2);
        assert!(set.is_required());
        assert!(set.contains(RuleKind::In));
        assert_eq!(set.to_string(), "required|in:manual,automatic");
    }

    #[test]
    fn test_rule_set_from_str() {
        let set: RuleSet = "nullable|regex:/^x$/".parse().unwrap();
        assert!(!set.is_required());
        assert!(!set.is_empty());
    }
}
