//! Settings for the openform engine.
//!
//! This module provides the [`Settings`] struct, which holds all engine
//! configuration with sensible defaults. Settings are passed explicitly into
//! each form session; there is no process-wide instance.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cascade resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSettings {
    /// How long a single loader call may take, in milliseconds. `0` disables the timeout.
    pub loader_timeout_ms: u64,
    /// Maximum recursion depth of one cascade pass.
    pub max_depth: usize,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            loader_timeout_ms: 10_000,
            max_depth: 32,
        }
    }
}

/// Expression evaluator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionSettings {
    /// Maximum nesting depth accepted by the expression parser.
    pub max_depth: usize,
}

impl Default for ExpressionSettings {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Validation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// The button id that triggers full validation before submitting a
    /// single-page form. Other buttons submit without validating.
    pub submit_button: String,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            submit_button: "submit".to_string(),
        }
    }
}

/// Table field configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSettings {
    /// Row limit applied when a table does not declare `limit`. `0` means unlimited.
    pub max_rows: usize,
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use openform_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.cascade.max_depth, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log filter directive (e.g. "info", "openform_forms=debug").
    pub log_level: String,

    // ── Components ───────────────────────────────────────────────────

    /// Cascade resolver settings.
    pub cascade: CascadeSettings,
    /// Expression evaluator settings.
    pub expression: ExpressionSettings,
    /// Validation settings.
    pub validation: ValidationSettings,
    /// Table field settings.
    pub table: TableSettings,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings for the enclosing application.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            cascade: CascadeSettings::default(),
            expression: ExpressionSettings::default(),
            validation: ValidationSettings::default(),
            table: TableSettings::default(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns the loader timeout, or `None` when timeouts are disabled.
    pub const fn loader_timeout(&self) -> Option<Duration> {
        if self.cascade.loader_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.cascade.loader_timeout_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.log_level, "info");
        assert_eq!(s.cascade.loader_timeout_ms, 10_000);
        assert_eq!(s.cascade.max_depth, 32);
        assert_eq!(s.expression.max_depth, 64);
        assert_eq!(s.validation.submit_button, "submit");
        assert_eq!(s.table.max_rows, 0);
        assert!(s.extra.is_empty());
    }

    #[test]
    fn test_loader_timeout() {
        let mut s = Settings::default();
        assert_eq!(s.loader_timeout(), Some(Duration::from_secs(10)));
        s.cascade.loader_timeout_ms = 0;
        assert_eq!(s.loader_timeout(), None);
    }

    #[test]
    fn test_settings_serde_roundtrip_keeps_sections() {
        let s = Settings::default();
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("cascade").is_some());
        assert!(json.get("validation").is_some());
        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
