//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `OPENFORM_DEBUG` | `debug` |
//! | `OPENFORM_LOG_LEVEL` | `log_level` |
//! | `OPENFORM_LOADER_TIMEOUT_MS` | `cascade.loader_timeout_ms` |
//! | `OPENFORM_CASCADE_MAX_DEPTH` | `cascade.max_depth` |
//! | `OPENFORM_EXPRESSION_MAX_DEPTH` | `expression.max_depth` |
//! | `OPENFORM_SUBMIT_BUTTON` | `validation.submit_button` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use openform_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file("config/openform.toml").unwrap();
//! let settings = settings_loader::from_json_file_with_env("config/openform.json").unwrap();
//! ```

use std::path::Path;

use crate::error::FormError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any keys not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, FormError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| FormError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, FormError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FormError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// Numeric variables that fail to parse are ignored and the current value is kept.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("OPENFORM_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("OPENFORM_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(ms) = env_number("OPENFORM_LOADER_TIMEOUT_MS") {
        settings.cascade.loader_timeout_ms = ms;
    }

    if let Some(depth) = env_number("OPENFORM_CASCADE_MAX_DEPTH") {
        settings.cascade.max_depth = depth;
    }

    if let Some(depth) = env_number("OPENFORM_EXPRESSION_MAX_DEPTH") {
        settings.expression.max_depth = depth;
    }

    if let Ok(val) = std::env::var("OPENFORM_SUBMIT_BUTTON") {
        if !val.trim().is_empty() {
            settings.validation.submit_button = val.trim().to_string();
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn read_config(path: &Path, format: &str) -> Result<String, FormError> {
    std::fs::read_to_string(path).map_err(|e| {
        FormError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, FormError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        FormError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        FormError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            log_level = "openform_forms=debug"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "openform_forms=debug");
        // Defaults preserved
        assert_eq!(settings.cascade.max_depth, 32);
    }

    #[test]
    fn test_from_toml_str_nested_section_keeps_sibling_defaults() {
        let toml = r#"
            [cascade]
            loader_timeout_ms = 250
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.cascade.loader_timeout_ms, 250);
        assert_eq!(settings.cascade.max_depth, 32);
        assert_eq!(settings.validation.submit_button, "submit");
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = from_toml_str("[[invalid toml content");
        assert!(matches!(result, Err(FormError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let result = from_toml_str("debug = \"maybe\"");
        assert!(result.is_err());
    }

    // ── JSON loading ────────────────────────────────────────────────

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{
            "debug": false,
            "validation": {"submit_button": "finish"},
            "table": {"max_rows": 10}
        }"#;

        let settings = from_json_str(json).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.validation.submit_button, "finish");
        assert_eq!(settings.table.max_rows, 10);
        assert_eq!(settings.expression.max_depth, 64);
    }

    #[test]
    fn test_from_json_str_extra_passthrough() {
        let settings = from_json_str(r#"{"extra": {"tenant": "acme"}}"#).unwrap();
        assert_eq!(settings.extra.get("tenant"), Some(&serde_json::json!("acme")));
    }

    #[test]
    fn test_from_json_str_invalid() {
        let result = from_json_str("{invalid json");
        assert!(result.is_err());
    }

    // ── File loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_file() {
        let dir = std::env::temp_dir().join("openform_test_toml");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test_settings.toml");

        std::fs::write(&path, "debug = false\n[expression]\nmax_depth = 8\n").unwrap();

        let settings = from_toml_file(&path).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.expression.max_depth, 8);

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn test_from_json_file() {
        let dir = std::env::temp_dir().join("openform_test_json");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test_settings.json");

        std::fs::write(&path, r#"{"log_level": "warn"}"#).unwrap();

        let settings = from_json_file(&path).unwrap();
        assert_eq!(settings.log_level, "warn");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/path/openform.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = from_json_file("/nonexistent/path/openform.json");
        assert!(result.is_err());
    }

    // ── Environment variable overrides ──────────────────────────────
    // Each test owns distinct variables; tests run in parallel.

    #[test]
    fn test_apply_env_overrides_debug() {
        let mut settings = Settings::default();
        std::env::set_var("OPENFORM_DEBUG", "false");
        apply_env_overrides(&mut settings);
        assert!(!settings.debug);
        std::env::set_var("OPENFORM_DEBUG", "1");
        apply_env_overrides(&mut settings);
        assert!(settings.debug);
        std::env::remove_var("OPENFORM_DEBUG");
    }

    #[test]
    fn test_apply_env_overrides_timeout() {
        let mut settings = Settings::default();
        std::env::set_var("OPENFORM_LOADER_TIMEOUT_MS", "1500");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.cascade.loader_timeout_ms, 1500);
        std::env::remove_var("OPENFORM_LOADER_TIMEOUT_MS");
    }

    #[test]
    fn test_apply_env_overrides_invalid_depth_is_ignored() {
        let mut settings = Settings::default();
        std::env::set_var("OPENFORM_CASCADE_MAX_DEPTH", "deep");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.cascade.max_depth, 32);
        std::env::remove_var("OPENFORM_CASCADE_MAX_DEPTH");
    }

    #[test]
    fn test_apply_env_overrides_submit_button() {
        let mut settings = Settings::default();
        std::env::set_var("OPENFORM_SUBMIT_BUTTON", " send ");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.validation.submit_button, "send");
        std::env::remove_var("OPENFORM_SUBMIT_BUTTON");
    }

    #[test]
    fn test_from_env_expression_depth() {
        std::env::set_var("OPENFORM_EXPRESSION_MAX_DEPTH", "12");
        let settings = from_env();
        assert_eq!(settings.expression.max_depth, 12);
        std::env::remove_var("OPENFORM_EXPRESSION_MAX_DEPTH");
    }

    // ── merge_json helper ───────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"outer": {"a": 1, "b": 2}});
        let over = serde_json::json!({"outer": {"b": 3}});
        let merged = merge_json(base, over);
        assert_eq!(merged["outer"]["a"], 1);
        assert_eq!(merged["outer"]["b"], 3);
    }

    #[test]
    fn test_merge_json_array_override() {
        let base = serde_json::json!({"list": [1, 2, 3]});
        let over = serde_json::json!({"list": [4, 5]});
        let merged = merge_json(base, over);
        assert_eq!(merged["list"], serde_json::json!([4, 5]));
    }

    #[test]
    fn test_toml_to_json() {
        let toml_val: toml::Value = toml::from_str(
            r#"
            name = "test"
            count = 42
            flag = true
            items = [1, 2, 3]
            [nested]
            key = "value"
        "#,
        )
        .unwrap();

        let json = toml_to_json(toml_val);
        assert_eq!(json["name"], "test");
        assert_eq!(json["count"], 42);
        assert_eq!(json["flag"], true);
        assert_eq!(json["items"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["nested"]["key"], "value");
    }
}
