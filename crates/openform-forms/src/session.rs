//! Form sessions.
//!
//! A [`FormSession`] owns everything one open form needs: the store, the
//! cascade resolver, the step navigator of a step form and the injected
//! collaborators. It is created from a definition and dropped when the form
//! is closed; nothing is shared between sessions.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use openform_core::{FormResult, Settings};
//! use openform_forms::cascade::EmptyLoader;
//! use openform_forms::definition::FormDefinition;
//! use openform_forms::session::{FormSession, Submitter};
//! use serde_json::{json, Map, Value};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Submitter for Echo {
//!     async fn submit(&self, values: Map<String, Value>, _button: &str) -> FormResult<Value> {
//!         Ok(Value::Object(values))
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let definition = FormDefinition::from_value(json!({
//!     "fields": { "plate": { "type": "TEXT", "validators": "required" } },
//!     "groups": { "incident": { "value": ["plate"] } },
//!     "buttons": [{ "id": "submit", "value": "Submit" }]
//! })).unwrap();
//!
//! let session = FormSession::new(&definition, Settings::default(), Arc::new(EmptyLoader), Arc::new(Echo)).unwrap();
//! assert!(session.submit("submit").await.is_err());
//!
//! session.set_value("plate", json!("9AB1234")).await.unwrap();
//! let sent = session.submit("submit").await.unwrap();
//! assert_eq!(sent["plate"], "9AB1234");
//! # });
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::Instrument;

use openform_core::error::{FieldErrors, FormError, FormResult};
use openform_core::logging::session_span;
use openform_core::settings::Settings;
use openform_core::value::{is_truthy, loose_eq};
use openform_rules::{ErrorFormatter, KeyFormatter};
use openform_signals::{FormSignals, Submitted};

use crate::cascade::{CascadeLoader, CascadeResolver};
use crate::definition::{FieldState, FieldType, FormDefinition, GroupState};
use crate::input::{accept_input, InputDecision};
use crate::props::{display_value, field_props, FieldProps};
use crate::steps::{StepNavigator, StepOutcome};
use crate::store::{FormStore, StoreHandle};
use crate::table::{self, RowRequest, TableAction};
use crate::validation::validate_fields;

/// Receives the payload when a button is pressed.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submits `values` on behalf of `button` and returns the collaborator's answer.
    async fn submit(&self, values: Map<String, Value>, button: &str) -> FormResult<Value>;
}

/// One open form.
pub struct FormSession {
    id: String,
    created_at: DateTime<Utc>,
    store: StoreHandle,
    settings: Settings,
    resolver: CascadeResolver,
    submitter: Arc<dyn Submitter>,
    table_action: Option<Arc<dyn TableAction>>,
    navigator: Option<Mutex<StepNavigator>>,
    formatter: Arc<dyn ErrorFormatter>,
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("navigator", &self.navigator)
            .finish_non_exhaustive()
    }
}

impl FormSession {
    /// Opens a session over `definition`.
    ///
    /// Fails with [`FormError::ImproperlyConfigured`] when the definition does
    /// not pass its integrity checks.
    pub fn new(
        definition: &FormDefinition,
        settings: Settings,
        loader: Arc<dyn CascadeLoader>,
        submitter: Arc<dyn Submitter>,
    ) -> FormResult<Self> {
        let id = format!("{:016x}", rand::random::<u64>());
        let span = session_span(&id);
        let _guard = span.enter();

        let store = StoreHandle::with_signals(
            FormStore::from_definition(definition)?,
            Arc::new(FormSignals::new()),
        );
        let resolver = CascadeResolver::new(store.clone(), loader, &settings);
        let navigator = definition
            .is_step_form()
            .then(|| Mutex::new(StepNavigator::new(&definition.steps)));

        tracing::info!(
            fields = definition.fields.len(),
            steps = definition.steps.len(),
            "form session opened"
        );

        Ok(Self {
            id,
            created_at: Utc::now(),
            store,
            settings,
            resolver,
            submitter,
            table_action: None,
            navigator,
            formatter: Arc::new(KeyFormatter),
        })
    }

    /// Sets the collaborator that persists rows of tables with `config.action`.
    #[must_use]
    pub fn with_table_action(mut self, action: Arc<dyn TableAction>) -> Self {
        self.table_action = Some(action);
        self
    }

    /// Replaces the formatter used for validation messages.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn ErrorFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// The session id (random, for log correlation).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was opened.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The shared store.
    pub const fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// The session's signals.
    pub fn signals(&self) -> &Arc<FormSignals> {
        self.store.signals()
    }

    /// The session's settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The cascade resolver.
    pub const fn resolver(&self) -> &CascadeResolver {
        &self.resolver
    }

    /// The anti-forgery token, if the definition has a `csrf_token` field.
    pub fn csrf_token(&self) -> Option<String> {
        self.store.read().csrf_token().map(String::from)
    }

    // ── Input ────────────────────────────────────────────────────────

    /// Offers user input to a field.
    ///
    /// Returns `Ok(false)` when the field's input rules reject the value and
    /// `Ok(true)` otherwise. Storing the value the field already holds does
    /// nothing. Dependent fields are resolved before this returns.
    pub async fn set_value(&self, id: &str, value: Value) -> FormResult<bool> {
        self.set_value_inner(id, value)
            .instrument(session_span(&self.id))
            .await
    }

    async fn set_value_inner(&self, id: &str, value: Value) -> FormResult<bool> {
        let field = self
            .store
            .field(id)
            .ok_or_else(|| FormError::UnknownField(id.to_string()))?;

        let value = match accept_input(&field, value) {
            InputDecision::Accept(value) => value,
            InputDecision::Reject(reason) => {
                tracing::debug!(field = id, reason, "input rejected");
                return Ok(false);
            }
        };
        if field.value == value {
            return Ok(true);
        }

        self.store.batch(|store, changed| {
            store.set_value(id, value.clone());
            changed.push(id.to_string());

            if field.field_type == FieldType::Boolean {
                let state = if is_truthy(&value) {
                    GroupState::Hidden
                } else {
                    GroupState::Editable
                };
                for group_id in &field.config.hides {
                    if store.set_group_state(group_id, state) {
                        if let Some(group) = store.get_group(group_id) {
                            changed.extend(group.value.field_ids().into_iter().map(String::from));
                        }
                    }
                }
            }

            if field.field_type == FieldType::Select {
                let chosen = field
                    .config
                    .data
                    .iter()
                    .find(|option| loose_eq(&option.value, &value))
                    .and_then(|option| option.data.as_ref());
                for (target, data) in chosen.into_iter().flatten() {
                    store.set_value(target, data.clone());
                    changed.push(target.clone());
                }
            }
        });

        if !field.config.load_data.is_empty() {
            self.resolver.on_change(id, &value).await;
        }
        Ok(true)
    }

    // ── Steps ────────────────────────────────────────────────────────

    fn navigator(&self) -> FormResult<MutexGuard<'_, StepNavigator>> {
        self.navigator
            .as_ref()
            .map(|nav| nav.lock().unwrap_or_else(PoisonError::into_inner))
            .ok_or_else(|| FormError::ConfigurationError("form has no steps".to_string()))
    }

    /// Validates the current step and advances when it passes.
    pub fn next(&self) -> FormResult<StepOutcome> {
        let mut nav = self.navigator()?;
        Ok(nav.next(&self.store, self.formatter.as_ref()))
    }

    /// Moves back one step. Returns the new index.
    pub fn previous(&self) -> FormResult<usize> {
        let mut nav = self.navigator()?;
        Ok(nav.previous(&self.store))
    }

    /// The current step index, `None` for a single-page form.
    pub fn current_step(&self) -> Option<usize> {
        self.navigator().ok().map(|nav| nav.current())
    }

    /// Returns `true` once a step form reached its completed panel.
    /// Single-page forms are always complete.
    pub fn is_completed(&self) -> bool {
        self.navigator().map_or(true, |nav| nav.is_completed())
    }

    // ── Values / validation ──────────────────────────────────────────

    /// The submission payload.
    ///
    /// HIDDEN fields are left out, VIEWONLY fields contribute their derived
    /// value and TABLE fields their rows with computed columns.
    pub fn values(&self) -> Map<String, Value> {
        let store = self.store.read();
        let max_depth = self.settings.expression.max_depth;
        store
            .fields()
            .iter()
            .filter(|(_, field)| !field.is_hidden())
            .map(|(id, field)| {
                let value = if field.field_type == FieldType::Table {
                    Value::Array(table::computed_rows(field, max_depth))
                } else if field.state == FieldState::Viewonly {
                    display_value(&store, field)
                } else {
                    field.value.clone()
                };
                (id.clone(), value)
            })
            .collect()
    }

    /// Validates every visible field, recording the errors on the fields.
    pub fn validate_all(&self) -> FieldErrors {
        let formatter = self.formatter.as_ref();
        self.store.batch(|store, changed| {
            let ids = store.visible_field_ids();
            changed.extend(store.clear_errors(ids.iter().map(String::as_str)));
            let errors = validate_fields(store, &ids, formatter);
            changed.extend(errors.keys().cloned());
            errors
        })
    }

    /// Renderer props of one field.
    pub fn props(&self, id: &str) -> FieldProps {
        field_props(&self.store.read(), id)
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Submits the payload on behalf of `button`.
    ///
    /// The configured submit button requires a completed step form, or a
    /// single-page form whose visible fields all validate. Any other declared
    /// button submits as is.
    pub async fn submit(&self, button: &str) -> FormResult<Value> {
        self.submit_inner(button)
            .instrument(session_span(&self.id))
            .await
    }

    async fn submit_inner(&self, button: &str) -> FormResult<Value> {
        let is_submit = button == self.settings.validation.submit_button;
        let declared = self.store.read().buttons().iter().any(|b| b.id == button);
        if !declared && !is_submit {
            return Err(FormError::UnknownButton(button.to_string()));
        }

        if is_submit {
            if let Some(nav) = &self.navigator {
                let nav = nav.lock().unwrap_or_else(PoisonError::into_inner);
                if !nav.is_completed() {
                    return Err(FormError::StepNotCompleted {
                        current: nav.current(),
                        total: nav.total(),
                    });
                }
            } else {
                let errors = self.validate_all();
                if !errors.is_empty() {
                    tracing::info!(button, failed = errors.len(), "submission blocked by validation");
                    return Err(FormError::Validation(errors));
                }
            }
        }

        let values = self.values();
        let response = self.submitter.submit(values.clone(), button).await?;
        tracing::info!(button, fields = values.len(), "form submitted");
        self.signals().submitted.send(&Submitted {
            button: button.to_string(),
            values,
        });
        Ok(response)
    }

    // ── Tables ───────────────────────────────────────────────────────

    fn table_field(&self, id: &str) -> FormResult<crate::definition::FieldDefinition> {
        let field = self
            .store
            .field(id)
            .ok_or_else(|| FormError::UnknownField(id.to_string()))?;
        if field.field_type != FieldType::Table {
            return Err(FormError::ConfigurationError(format!(
                "field '{id}' is not a table"
            )));
        }
        Ok(field)
    }

    /// A fresh row for a TABLE field.
    pub fn new_row(&self, id: &str) -> FormResult<Value> {
        Ok(table::new_row(&self.table_field(id)?))
    }

    /// Saves a row of a TABLE field.
    ///
    /// Tables with `config.action` hand the row to the session's
    /// [`TableAction`]; the rows it returns replace the value. Returns
    /// `Ok(false)` when the row limit is reached or the action fails; the
    /// value is unchanged in both cases.
    pub async fn save_row(&self, id: &str, row: Value) -> FormResult<bool> {
        let field = self.table_field(id)?;

        if let (Some(action), Some(persist)) = (&field.config.action, &self.table_action) {
            let request = RowRequest {
                action: action.clone(),
                field: id.to_string(),
                row,
            };
            return match persist.persist(request).await {
                Ok(rows) => {
                    self.store.set_value(id, Value::Array(rows));
                    Ok(true)
                }
                Err(err) => {
                    tracing::warn!(field = id, error = %err, "table action failed");
                    Ok(false)
                }
            };
        }
        if field.config.action.is_some() {
            tracing::warn!(field = id, "table has an action but no table action is set; saving locally");
        }

        let limit = field.config.limit.unwrap_or(self.settings.table.max_rows);
        let mut rows = table::rows(&field);
        if !table::upsert_row(&mut rows, row, limit) {
            return Ok(false);
        }
        self.store.set_value(id, Value::Array(rows));
        Ok(true)
    }

    /// Removes a row of a TABLE field by its `id`.
    pub fn delete_row(&self, id: &str, row_id: &Value) -> FormResult<bool> {
        let field = self.table_field(id)?;
        let mut rows = table::rows(&field);
        if !table::remove_row(&mut rows, row_id) {
            return Ok(false);
        }
        self.store.set_value(id, Value::Array(rows));
        Ok(true)
    }
}
