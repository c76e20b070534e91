//! # openform-core
//!
//! Core types, settings, and error types for the openform engine.
//! This crate has no engine dependencies and provides the foundation for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Engine settings
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`checks`] - Diagnostic messages produced by definition checks
//! - [`value`] - Script-style coercions over JSON field values
//! - [`logging`] - Tracing-based logging integration

pub mod checks;
pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use checks::{CheckLevel, CheckMessage};
pub use error::{FieldErrors, FormError, FormResult};
pub use settings::Settings;
