//! # openform
//!
//! A declarative, data-driven form engine.
//!
//! This is the meta-crate that re-exports all sub-crates. Depend on
//! `openform` to get the whole engine, or on individual crates for
//! finer-grained control.
//!
//! ```
//! use std::sync::Arc;
//! use openform::forms::{EmptyLoader, FormDefinition, FormSession, Submitter};
//! use openform::core::{FormResult, Settings};
//! use openform::serde_json::{json, Map, Value};
//!
//! struct Discard;
//!
//! #[openform::async_trait::async_trait]
//! impl Submitter for Discard {
//!     async fn submit(&self, _values: Map<String, Value>, _button: &str) -> FormResult<Value> {
//!         Ok(Value::Null)
//!     }
//! }
//!
//! let definition = FormDefinition::from_value(json!({
//!     "fields": { "vin": { "type": "STRING", "validators": "required|size:17" } },
//!     "groups": { "vehicle": { "value": ["vin"] } }
//! })).unwrap();
//! let session = FormSession::new(&definition, Settings::default(), Arc::new(EmptyLoader), Arc::new(Discard)).unwrap();
//!
//! let errors = session.validate_all();
//! assert_eq!(errors["vin"], "vin.required");
//! ```

/// Errors, settings, logging and value coercion.
pub use openform_core as core;

/// Rule strings and the validation engine.
#[cfg(feature = "rules")]
pub use openform_rules as rules;

/// The expression language for derived values.
#[cfg(feature = "expr")]
pub use openform_expr as expr;

/// Signals for field, step and submission events.
#[cfg(feature = "signals")]
pub use openform_signals as signals;

/// Definitions, store, cascades, steps and sessions.
#[cfg(feature = "forms")]
pub use openform_forms as forms;

/// Scripted collaborators, fixtures and assertions for tests.
#[cfg(feature = "testing")]
pub use openform_test as test;

pub use async_trait;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use tracing_subscriber;
