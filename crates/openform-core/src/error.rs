//! Core error types for the openform engine.
//!
//! This module provides [`FormError`], the error enum shared by every crate in
//! the workspace. Expected per-field validation failures are *not* errors at
//! the rule level; they only surface as [`FormError::Validation`] when an
//! operation (such as submitting) is blocked by them.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::checks::CheckMessage;

/// Per-field error messages, keyed by field id.
///
/// A `BTreeMap` keeps the reporting order stable regardless of the order in
/// which fields were checked.
pub type FieldErrors = BTreeMap<String, String>;

/// The primary error type for the openform engine.
///
/// # Examples
///
/// ```
/// use openform_core::error::FormError;
///
/// let err = FormError::UnknownField("vin".into());
/// assert_eq!(err.to_string(), "Unknown field: vin");
/// ```
#[derive(Error, Debug)]
pub enum FormError {
    // ── Definition ───────────────────────────────────────────────────

    /// The form definition failed its integrity checks.
    ///
    /// Carries every error-level message produced by the checks so the caller
    /// can show all of them at once.
    #[error("Improperly configured: {}", join_messages(.0))]
    ImproperlyConfigured(Vec<CheckMessage>),

    /// A settings value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Runtime ──────────────────────────────────────────────────────

    /// An operation referenced a field id that is not in the store.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A submission referenced a button id that the definition does not declare.
    #[error("Unknown button: {0}")]
    UnknownButton(String),

    /// A multi-step form was submitted before reaching the completed panel.
    #[error("Step {current} of {total} has not been completed")]
    StepNotCompleted {
        /// The navigator's current step index.
        current: usize,
        /// The number of steps in the form.
        total: usize,
    },

    /// One or more fields failed validation.
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),

    // ── Collaborators ────────────────────────────────────────────────

    /// The injected cascade loader reported a failure.
    #[error("Loader failed for '{target}': {message}")]
    LoaderFailed {
        /// The field whose options were being loaded.
        target: String,
        /// The loader's error message.
        message: String,
    },

    /// The injected cascade loader did not answer in time.
    #[error("Loader timed out for '{0}'")]
    LoaderTimeout(String),

    /// A table action or submit callback reported a failure.
    #[error("Action '{action}' failed: {message}")]
    ActionFailed {
        /// The action endpoint or button id.
        action: String,
        /// The collaborator's error message.
        message: String,
    },

    // ── Expressions ──────────────────────────────────────────────────

    /// A derived-value expression could not be parsed.
    #[error("Expression syntax error: {0}")]
    ExpressionSyntax(String),

    // ── Serialization / IO ───────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FormError {
    /// Returns `true` for errors the user can fix by editing input
    /// (as opposed to definition or collaborator problems).
    pub const fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::StepNotCompleted { .. }
        )
    }
}

impl From<serde_json::Error> for FormError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

fn join_messages(messages: &[CheckMessage]) -> String {
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A convenience type alias for `Result<T, FormError>`.
pub type FormResult<T> = Result<T, FormError>;
