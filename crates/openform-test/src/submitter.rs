//! Recording collaborators for submissions and table rows.
//!
//! [`RecordingSubmitter`] captures every payload a session submits, the same
//! way an in-memory mail outbox captures sent messages. [`RecordingTableAction`]
//! plays the server side of TABLE fields with `config.action`.
//!
//! ## Example
//!
//! ```
//! use openform_forms::session::Submitter;
//! use openform_test::submitter::RecordingSubmitter;
//! use serde_json::{json, Map};
//!
//! let outbox = RecordingSubmitter::new();
//! let mut values = Map::new();
//! values.insert("plate".into(), json!("9AB1234"));
//!
//! tokio_test::block_on(outbox.submit(values, "save")).unwrap();
//! outbox.assert_count(1);
//! assert_eq!(outbox.last().unwrap().values["plate"], "9AB1234");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use openform_core::error::{FormError, FormResult};
use openform_forms::session::Submitter;
use openform_forms::table::{upsert_row, RowRequest, TableAction};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A captured submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// The button the payload was submitted for.
    pub button: String,
    /// The payload.
    pub values: Map<String, Value>,
}

#[derive(Debug, Default)]
struct Outbox {
    submissions: Vec<Submission>,
    failure: Option<String>,
}

/// A [`Submitter`] that records every submission. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSubmitter {
    outbox: Arc<Mutex<Outbox>>,
}

impl RecordingSubmitter {
    /// Creates an empty recorder that accepts every submission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder that records, then fails, every submission.
    pub fn failing(message: impl Into<String>) -> Self {
        let recorder = Self::new();
        lock(&recorder.outbox).failure = Some(message.into());
        recorder
    }

    /// Returns all submissions so far.
    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.outbox).submissions.clone()
    }

    /// Returns the most recent submission.
    pub fn last(&self) -> Option<Submission> {
        lock(&self.outbox).submissions.last().cloned()
    }

    /// Returns the number of submissions.
    pub fn len(&self) -> usize {
        lock(&self.outbox).submissions.len()
    }

    /// Returns `true` if nothing was submitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears the record.
    pub fn clear(&self) {
        lock(&self.outbox).submissions.clear();
    }

    /// Asserts the number of submissions.
    ///
    /// # Panics
    ///
    /// Panics if the count does not match.
    pub fn assert_count(&self, expected: usize) {
        let actual = self.len();
        assert_eq!(
            actual, expected,
            "Expected {expected} submission(s), but {actual} were made"
        );
    }

    /// Asserts that at least one submission was made for `button`.
    ///
    /// # Panics
    ///
    /// Panics if none was.
    pub fn assert_submitted(&self, button: &str) {
        let buttons: Vec<String> = self.submissions().into_iter().map(|s| s.button).collect();
        assert!(
            buttons.iter().any(|b| b == button),
            "Expected a submission for '{button}'. Submitted: {buttons:?}"
        );
    }
}

#[async_trait]
impl Submitter for RecordingSubmitter {
    async fn submit(&self, values: Map<String, Value>, button: &str) -> FormResult<Value> {
        let mut outbox = lock(&self.outbox);
        outbox.submissions.push(Submission {
            button: button.to_string(),
            values,
        });
        match &outbox.failure {
            Some(message) => Err(FormError::ActionFailed {
                action: button.to_string(),
                message: message.clone(),
            }),
            None => Ok(json!({ "status": "ok", "button": button })),
        }
    }
}

#[derive(Debug, Default)]
struct Server {
    requests: Vec<RowRequest>,
    tables: HashMap<String, Vec<Value>>,
    failure: Option<String>,
}

/// A [`TableAction`] that keeps each table's rows server side.
///
/// A saved row is upserted by `id` into the stored rows of its field, and the
/// whole list is returned.
#[derive(Debug, Clone, Default)]
pub struct RecordingTableAction {
    server: Arc<Mutex<Server>>,
}

impl RecordingTableAction {
    /// Creates a server with no stored rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the stored rows of `field`.
    pub fn with_rows(self, field: &str, rows: Vec<Value>) -> Self {
        lock(&self.server).tables.insert(field.to_string(), rows);
        self
    }

    /// Makes every later request fail.
    pub fn fail(&self, message: impl Into<String>) {
        lock(&self.server).failure = Some(message.into());
    }

    /// Returns all requests so far.
    pub fn requests(&self) -> Vec<RowRequest> {
        lock(&self.server).requests.clone()
    }

    /// Returns the stored rows of `field`.
    pub fn rows(&self, field: &str) -> Vec<Value> {
        lock(&self.server).tables.get(field).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TableAction for RecordingTableAction {
    async fn persist(&self, request: RowRequest) -> FormResult<Vec<Value>> {
        let mut server = lock(&self.server);
        server.requests.push(request.clone());
        if let Some(message) = &server.failure {
            return Err(FormError::ActionFailed {
                action: request.action,
                message: message.clone(),
            });
        }
        let rows = server.tables.entry(request.field).or_default();
        upsert_row(rows, request.row, 0);
        Ok(rows.clone())
    }
}
