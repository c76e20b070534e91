//! # openform-rules
//!
//! The compact validator rule language used by openform definitions.
//!
//! A field declares its validators as pipe-delimited rule strings such as
//! `"required|min:2|max:60"`. This crate parses those strings into tokens and
//! evaluates them against a field value and the form's current value set.
//!
//! ## Modules
//!
//! - [`rules`] - Rule string parsing into [`RuleToken`]s
//! - [`validation`] - The short-circuiting validation engine
//! - [`messages`] - Turning a failed rule into a user-facing message
//!
//! ## Quick Start
//!
//! ```
//! use openform_rules::{validate, RuleKind};
//! use serde_json::{json, Map};
//!
//! let values = Map::new();
//! let failure = validate("required|size:17", &json!("SHORT"), &values).unwrap();
//! assert_eq!(failure.rule, RuleKind::Size);
//! ```

pub mod messages;
pub mod rules;
pub mod validation;

pub use messages::{ErrorFormatter, KeyFormatter, TemplateFormatter};
pub use rules::{parse_rule_string, RuleKind, RuleSet, RuleToken};
pub use validation::{failing_rules, validate, validate_tokens, RuleFailure, ValueLookup};
