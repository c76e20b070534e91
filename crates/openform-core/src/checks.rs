//! Diagnostic messages for form definition checks.
//!
//! Definition checks (run when a store is seeded from a definition) report
//! their findings as [`CheckMessage`]s. Error-level messages abort
//! initialization; lower levels are logged and otherwise ignored.
//!
//! ## Examples
//!
//! ```
//! use openform_core::checks::{CheckLevel, CheckMessage};
//!
//! let msg = CheckMessage::error(
//!     "group 'owner' references unknown field 'phone'",
//!     Some("Add the field to `fields` or remove it from the group."),
//!     Some("owner"),
//!     Some("groups.E001"),
//! );
//! assert!(msg.is_serious());
//! assert_eq!(msg.level, CheckLevel::Error);
//! ```

/// Severity level for a check message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckLevel {
    /// Debugging information.
    Debug = 0,
    /// Informational message.
    Info = 1,
    /// A potential problem.
    Warning = 2,
    /// A definite problem that prevents the definition from loading.
    Error = 3,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A diagnostic message produced by a definition check.
///
/// Each message has a severity level, a human-readable message, an optional hint,
/// the definition object (field, group or step id) it relates to, and an optional
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
    /// The severity level.
    pub level: CheckLevel,
    /// The human-readable message describing the issue.
    pub msg: String,
    /// An optional hint on how to fix the issue.
    pub hint: Option<String>,
    /// The definition object that has the issue.
    pub obj: Option<String>,
    /// A unique identifier for this check message (e.g. "groups.E001").
    pub id: Option<String>,
}

impl CheckMessage {
    /// Creates a new `CheckMessage` with the given level and details.
    pub fn new(
        level: CheckLevel,
        msg: impl Into<String>,
        hint: Option<&str>,
        obj: Option<&str>,
        id: Option<&str>,
    ) -> Self {
        Self {
            level,
            msg: msg.into(),
            hint: hint.map(String::from),
            obj: obj.map(String::from),
            id: id.map(String::from),
        }
    }

    /// Creates a warning-level message.
    pub fn warning(msg: impl Into<String>, hint: Option<&str>, obj: Option<&str>, id: Option<&str>) -> Self {
        Self::new(CheckLevel::Warning, msg, hint, obj, id)
    }

    /// Creates an error-level message.
    pub fn error(msg: impl Into<String>, hint: Option<&str>, obj: Option<&str>, id: Option<&str>) -> Self {
        Self::new(CheckLevel::Error, msg, hint, obj, id)
    }

    /// Returns `true` if this is a warning or higher severity.
    pub fn is_serious(&self) -> bool {
        self.level >= CheckLevel::Warning
    }

    /// Returns `true` if this message must abort definition loading.
    pub fn is_error(&self) -> bool {
        self.level >= CheckLevel::Error
    }
}

impl std::fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.id {
            write!(f, "({id}) ")?;
        }
        write!(f, "{}: {}", self.level, self.msg)?;
        if let Some(ref hint) = self.hint {
            write!(f, "\n\tHINT: {hint}")?;
        }
        Ok(())
    }
}

/// Splits check messages into (errors, everything else).
pub fn partition_errors(messages: Vec<CheckMessage>) -> (Vec<CheckMessage>, Vec<CheckMessage>) {
    messages.into_iter().partition(CheckMessage::is_error)
}
