//! The field/group/step store.
//!
//! [`FormStore`] holds the runtime records of one form: every field (with its
//! current value, error and loading flag), the groups, the steps and the
//! buttons. It is plain data; [`StoreHandle`] shares one store between the
//! components of a session and notifies [`FormSignals`] receivers after each
//! committed mutation.
//!
//! Reads never fail: a missing field or step is reported as `None`, and the
//! value set treats a missing field as `null`.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use openform_core::checks::partition_errors;
use openform_core::error::{FieldErrors, FormError, FormResult};
use openform_core::value::ValueLookup;
use openform_signals::FormSignals;

use crate::checks::check_definition;
use crate::definition::{
    Button, FieldConfig, FieldDefinition, FieldState, FieldType, FormDefinition, GroupDefinition,
    GroupState, SelectOption, StepMap, TableColumn,
};

/// The id of the field whose value is the anti-forgery token.
pub const CSRF_FIELD: &str = "csrf_token";

static NULL: Value = Value::Null;

/// A partial set of field attributes, merged by [`FormStore::update_field`].
///
/// # Examples
///
/// ```
/// use openform_forms::store::{FieldPatch, FormStore};
/// use serde_json::json;
///
/// let mut store = FormStore::new();
/// store.update_field("x", FieldPatch::new().error("e"));
/// store.update_field("x", FieldPatch::new().value(json!(1)));
///
/// let field = store.get_field("x").unwrap();
/// assert_eq!(field.error, "e");
/// assert_eq!(field.value, json!(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    /// Only used when the patch creates the field.
    pub field_type: Option<FieldType>,
    /// New state.
    pub state: Option<FieldState>,
    /// New value.
    pub value: Option<Value>,
    /// Replacement rule strings.
    pub validators: Option<Vec<String>>,
    /// New error message (empty clears it).
    pub error: Option<String>,
    /// New derived-value expression.
    pub expression: Option<String>,
    /// New loading flag.
    pub loading: Option<bool>,
}

impl FieldPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the type used if the field has to be created.
    #[must_use]
    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Sets the state.
    #[must_use]
    pub fn state(mut self, state: FieldState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the value.
    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Replaces the validators.
    #[must_use]
    pub fn validators(mut self, validators: Vec<String>) -> Self {
        self.validators = Some(validators);
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Sets the expression.
    #[must_use]
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Sets the loading flag.
    #[must_use]
    pub fn loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }

    fn apply(self, field: &mut FieldDefinition) {
        if let Some(state) = self.state {
            field.state = state;
        }
        if let Some(value) = self.value {
            field.value = value;
        }
        if let Some(validators) = self.validators {
            field.validators = validators;
        }
        if let Some(error) = self.error {
            field.error = error;
        }
        if let Some(expression) = self.expression {
            field.expression = Some(expression);
        }
        if let Some(loading) = self.loading {
            field.loading = loading;
        }
    }
}

/// A partial field configuration, merged by [`FormStore::update_field_config`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    /// Replacement option list.
    pub data: Option<Vec<SelectOption>>,
    /// Replacement dependent-field list.
    pub load_data: Option<Vec<String>>,
    /// Replacement hide-target list.
    pub hides: Option<Vec<String>>,
    /// New lower bound.
    pub min: Option<f64>,
    /// New upper bound.
    pub max: Option<f64>,
    /// New table action endpoint.
    pub action: Option<String>,
    /// Replacement table columns.
    pub cols: Option<Vec<TableColumn>>,
    /// New table row limit.
    pub limit: Option<usize>,
    /// Uninterpreted keys, merged key by key.
    pub extra: Map<String, Value>,
}

impl ConfigPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the option list.
    #[must_use]
    pub fn data(mut self, data: Vec<SelectOption>) -> Self {
        self.data = Some(data);
        self
    }

    /// Replaces the dependent-field list.
    #[must_use]
    pub fn load_data(mut self, load_data: Vec<String>) -> Self {
        self.load_data = Some(load_data);
        self
    }

    /// Sets one uninterpreted key.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn apply(self, config: &mut FieldConfig) {
        if let Some(data) = self.data {
            config.data = data;
        }
        if let Some(load_data) = self.load_data {
            config.load_data = load_data;
        }
        if let Some(hides) = self.hides {
            config.hides = hides;
        }
        if self.min.is_some() {
            config.min = self.min;
        }
        if self.max.is_some() {
            config.max = self.max;
        }
        if self.action.is_some() {
            config.action = self.action;
        }
        if let Some(cols) = self.cols {
            config.cols = cols;
        }
        if self.limit.is_some() {
            config.limit = self.limit;
        }
        config.extra.extend(self.extra);
    }
}

/// The canonical state of one form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormStore {
    fields: IndexMap<String, FieldDefinition>,
    groups: IndexMap<String, GroupDefinition>,
    steps: StepMap,
    buttons: Vec<Button>,
    csrf_token: Option<String>,
}

impl FormStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store initialized from a definition.
    pub fn from_definition(definition: &FormDefinition) -> FormResult<Self> {
        let mut store = Self::new();
        store.initialize_from(definition)?;
        Ok(store)
    }

    /// Replaces the whole store with the contents of `definition`.
    ///
    /// The definition is checked first; if any error-level check fails the
    /// store is left untouched and [`FormError::ImproperlyConfigured`] is
    /// returned. Warnings are logged. Calling this twice with the same
    /// definition yields the same state.
    pub fn initialize_from(&mut self, definition: &FormDefinition) -> FormResult<()> {
        let (errors, rest) = partition_errors(check_definition(definition));
        for message in rest.iter().filter(|m| m.is_serious()) {
            tracing::warn!(check = %message, "form definition warning");
        }
        if !errors.is_empty() {
            return Err(FormError::ImproperlyConfigured(errors));
        }

        let mut fields = definition.fields.clone();
        for (key, field) in &mut fields {
            if field.id.is_empty() {
                field.id.clone_from(key);
            }
        }

        self.csrf_token = fields
            .get(CSRF_FIELD)
            .map(|field| match &field.value {
                Value::String(token) => token.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            });
        self.fields = fields;
        self.groups = definition.groups.clone();
        self.steps = definition.steps.clone();
        self.buttons = definition.buttons.clone();

        tracing::debug!(
            fields = self.fields.len(),
            groups = self.groups.len(),
            steps = self.steps.len(),
            "store initialized"
        );
        Ok(())
    }

    // ── Fields ───────────────────────────────────────────────────────

    /// Merges `patch` into the field, creating the field if it does not exist.
    pub fn update_field(&mut self, id: &str, patch: FieldPatch) {
        if let Some(field) = self.fields.get_mut(id) {
            patch.apply(field);
        } else {
            let mut field = FieldDefinition::new(id, patch.field_type.unwrap_or_default());
            patch.apply(&mut field);
            tracing::trace!(field = id, "field created by update");
            self.fields.insert(id.to_string(), field);
        }
    }

    /// Merges `patch` into the field's config.
    ///
    /// Returns `false` (and does nothing) if the field does not exist.
    pub fn update_field_config(&mut self, id: &str, patch: ConfigPatch) -> bool {
        match self.fields.get_mut(id) {
            Some(field) => {
                patch.apply(&mut field.config);
                true
            }
            None => false,
        }
    }

    /// Returns the field record.
    pub fn get_field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.get(id)
    }

    /// Returns all field records in definition order.
    pub const fn fields(&self) -> &IndexMap<String, FieldDefinition> {
        &self.fields
    }

    /// Returns the current value of a field, `null` if it does not exist.
    pub fn value(&self, id: &str) -> &Value {
        self.fields.get(id).map_or(&NULL, |field| &field.value)
    }

    /// Stores a value, creating the field if needed.
    ///
    /// Returns `false` if the field already held an equal value.
    pub fn set_value(&mut self, id: &str, value: Value) -> bool {
        if self.fields.get(id).is_some_and(|field| field.value == value) {
            return false;
        }
        self.update_field(id, FieldPatch::new().value(value));
        true
    }

    /// Returns the value set: every field that holds user data.
    ///
    /// VIEWONLY fields are excluded; their value is derived, not entered.
    pub fn values(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(_, field)| field.state != FieldState::Viewonly)
            .map(|(id, field)| (id.clone(), field.value.clone()))
            .collect()
    }

    /// Returns every non-empty field error.
    pub fn errors(&self) -> FieldErrors {
        self.fields
            .iter()
            .filter(|(_, field)| !field.error.is_empty())
            .map(|(id, field)| (id.clone(), field.error.clone()))
            .collect()
    }

    /// Sets a field's error message. Returns `false` if the field does not exist.
    pub fn set_error(&mut self, id: &str, message: impl Into<String>) -> bool {
        match self.fields.get_mut(id) {
            Some(field) => {
                field.error = message.into();
                true
            }
            None => false,
        }
    }

    /// Clears the errors of the given fields; returns the ids that had one.
    pub fn clear_errors<'a, I>(&mut self, ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut cleared = Vec::new();
        for id in ids {
            if let Some(field) = self.fields.get_mut(id) {
                if !field.error.is_empty() {
                    field.error.clear();
                    cleared.push(id.to_string());
                }
            }
        }
        cleared
    }

    /// Returns the value of the `csrf_token` field, if the definition has one.
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    // ── Groups / steps / buttons ─────────────────────────────────────

    /// Returns the group.
    pub fn get_group(&self, id: &str) -> Option<&GroupDefinition> {
        self.groups.get(id)
    }

    /// Returns all groups in display order.
    pub const fn groups(&self) -> &IndexMap<String, GroupDefinition> {
        &self.groups
    }

    /// Changes a group's visibility. Returns `true` if the state changed.
    pub fn set_group_state(&mut self, id: &str, state: GroupState) -> bool {
        match self.groups.get_mut(id) {
            Some(group) if group.state != state => {
                group.state = state;
                true
            }
            _ => false,
        }
    }

    /// Returns the group ids of a step.
    pub fn get_step(&self, key: &str) -> Option<&[String]> {
        self.steps.get(key).map(Vec::as_slice)
    }

    /// Returns all steps in navigation order.
    pub const fn steps(&self) -> &StepMap {
        &self.steps
    }

    /// Returns the buttons.
    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    /// Returns the field ids of the given groups, skipping hidden and unknown
    /// groups and flattening tabs.
    pub fn fields_of_groups<'a, I>(&self, group_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        group_ids
            .into_iter()
            .filter_map(|id| self.groups.get(id))
            .filter(|group| !group.is_hidden())
            .flat_map(|group| group.value.field_ids())
            .map(String::from)
            .collect()
    }

    /// Returns the ids of every field that is shown: members of visible
    /// groups, plus fields no group mentions.
    pub fn visible_field_ids(&self) -> Vec<String> {
        let mut grouped: HashSet<&str> = HashSet::new();
        for group in self.groups.values() {
            grouped.extend(group.value.field_ids());
        }

        let mut ids = self.fields_of_groups(self.groups.keys());
        ids.extend(
            self.fields
                .keys()
                .filter(|id| !grouped.contains(id.as_str()))
                .cloned(),
        );
        ids
    }
}

/// The value set seen by rules and expressions. VIEWONLY fields are left out.
impl ValueLookup for FormStore {
    fn lookup(&self, id: &str) -> Option<&Value> {
        self.fields
            .get(id)
            .filter(|field| field.state != FieldState::Viewonly)
            .map(|field| &field.value)
    }
}

/// A shared, lock-protected store with change notifications.
///
/// Locks are only held inside the handle's methods, never across an await.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<FormStore>>,
    signals: Arc<FormSignals>,
}

impl StoreHandle {
    /// Wraps a store with a fresh signal bundle.
    pub fn new(store: FormStore) -> Self {
        Self::with_signals(store, Arc::new(FormSignals::new()))
    }

    /// Wraps a store, notifying the given signals.
    pub fn with_signals(store: FormStore, signals: Arc<FormSignals>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
            signals,
        }
    }

    /// Returns the signals notified by this handle.
    pub const fn signals(&self) -> &Arc<FormSignals> {
        &self.signals
    }

    /// Acquires a read guard. Do not hold it across an await.
    pub fn read(&self) -> RwLockReadGuard<'_, FormStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> FormStore {
        self.read().clone()
    }

    /// Returns a copy of one field record.
    pub fn field(&self, id: &str) -> Option<FieldDefinition> {
        self.read().get_field(id).cloned()
    }

    /// Returns a copy of a field's current value.
    pub fn value(&self, id: &str) -> Value {
        self.read().value(id).clone()
    }

    /// Runs several mutations as one commit.
    ///
    /// The closure records the ids of the fields it changed; receivers are
    /// notified once per id after the lock is released, so no reader can
    /// observe a half-applied batch.
    pub fn batch<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut FormStore, &mut Vec<String>) -> R,
    {
        let mut changed = Vec::new();
        let result = {
            let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut store, &mut changed)
        };

        let mut seen = HashSet::new();
        for id in changed {
            if seen.insert(id.clone()) {
                self.signals.notify_field(&id);
            }
        }
        result
    }

    /// Replaces the store from a definition (see [`FormStore::initialize_from`]).
    pub fn initialize_from(&self, definition: &FormDefinition) -> FormResult<()> {
        self.batch(|store, changed| {
            store.initialize_from(definition)?;
            changed.extend(store.fields.keys().cloned());
            Ok(())
        })
    }

    /// See [`FormStore::update_field`].
    pub fn update_field(&self, id: &str, patch: FieldPatch) {
        self.batch(|store, changed| {
            store.update_field(id, patch);
            changed.push(id.to_string());
        });
    }

    /// See [`FormStore::update_field_config`].
    pub fn update_field_config(&self, id: &str, patch: ConfigPatch) -> bool {
        self.batch(|store, changed| {
            let applied = store.update_field_config(id, patch);
            if applied {
                changed.push(id.to_string());
            }
            applied
        })
    }

    /// See [`FormStore::set_value`].
    pub fn set_value(&self, id: &str, value: Value) -> bool {
        self.batch(|store, changed| {
            let applied = store.set_value(id, value);
            if applied {
                changed.push(id.to_string());
            }
            applied
        })
    }

    /// See [`FormStore::set_group_state`]. Members of the group are notified.
    pub fn set_group_state(&self, id: &str, state: GroupState) -> bool {
        self.batch(|store, changed| {
            let applied = store.set_group_state(id, state);
            if applied {
                if let Some(group) = store.get_group(id) {
                    changed.extend(group.value.field_ids().into_iter().map(String::from));
                }
            }
            applied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::GroupValue;
    use openform_signals::FieldChanged;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn definition() -> FormDefinition {
        FormDefinition::from_value(json!({
            "fields": {
                "csrf_token": { "type": "STRING", "state": "HIDDEN", "value": "tok-1" },
                "plate": { "type": "STRING", "value": "9AB1234" },
                "total": { "type": "NUMBER", "state": "VIEWONLY", "value": 5, "expression": "1 + 1" },
                "loose": { "type": "STRING" }
            },
            "groups": {
                "main": { "type": "GROUP", "value": ["plate", "total"] },
                "secret": { "type": "GROUP", "state": "HIDDEN", "value": ["csrf_token"] }
            },
            "steps": { "one": ["main"], "two": ["secret"] },
            "buttons": [{ "id": "save", "value": "Save" }]
        }))
        .unwrap()
    }

    #[test]
    fn test_upsert_preserves_error() {
        let mut store = FormStore::new();
        store.update_field("x", FieldPatch::new().error("e"));
        let created = store.get_field("x").unwrap();
        assert_eq!(created.error, "e");
        assert_eq!(created.value, Value::Null);

        store.update_field("x", FieldPatch::new().value(json!(1)));
        let field = store.get_field("x").unwrap();
        assert_eq!(field.error, "e");
        assert_eq!(field.value, json!(1));
    }

    #[test]
    fn test_update_never_changes_type() {
        let mut store = FormStore::new();
        store.update_field("n", FieldPatch::new().field_type(FieldType::Number));
        store.update_field("n", FieldPatch::new().field_type(FieldType::Select));
        assert_eq!(store.get_field("n").unwrap().field_type, FieldType::Number);
    }

    #[test]
    fn test_update_config_is_not_upsert() {
        let mut store = FormStore::new();
        assert!(!store.update_field_config("missing", ConfigPatch::new().data(vec![])));
        assert!(store.get_field("missing").is_none());

        store.update_field("present", FieldPatch::new());
        let patch = ConfigPatch::new()
            .data(vec![SelectOption::new("a", "A")])
            .extra("title", json!("Brand"));
        assert!(store.update_field_config("present", patch));
        let config = &store.get_field("present").unwrap().config;
        assert_eq!(config.data.len(), 1);
        assert_eq!(config.extra["title"], json!("Brand"));
    }

    #[test]
    fn test_missing_reads() {
        let store = FormStore::new();
        assert!(store.get_field("nope").is_none());
        assert!(store.get_step("nope").is_none());
        assert_eq!(store.value("nope"), &Value::Null);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let definition = definition();
        let mut once = FormStore::new();
        once.initialize_from(&definition).unwrap();
        let mut twice = FormStore::new();
        twice.initialize_from(&definition).unwrap();
        twice.initialize_from(&definition).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_initialize_replaces_wholesale() {
        let mut store = FormStore::new();
        store.update_field("stale", FieldPatch::new().value(json!(1)));
        store.initialize_from(&definition()).unwrap();
        assert!(store.get_field("stale").is_none());
        assert_eq!(store.csrf_token(), Some("tok-1"));
        assert_eq!(store.get_step("one").unwrap(), ["main".to_string()]);
        assert_eq!(store.buttons()[0].id, "save");
    }

    #[test]
    fn test_initialize_rejects_broken_definition() {
        let mut store = FormStore::new();
        store.update_field("kept", FieldPatch::new());
        let mut broken = definition();
        broken
            .groups
            .insert("bad".into(), GroupDefinition::fields(["ghost"]));

        let err = store.initialize_from(&broken).unwrap_err();
        assert!(matches!(err, FormError::ImproperlyConfigured(ref m) if m.len() == 1));
        assert!(store.get_field("kept").is_some());
    }

    #[test]
    fn test_values_exclude_viewonly() {
        let store = FormStore::from_definition(&definition()).unwrap();
        let values = store.values();
        assert_eq!(values["plate"], json!("9AB1234"));
        assert!(!values.contains_key("total"));
        assert_eq!(store.lookup("total"), None);
        assert_eq!(store.lookup("plate"), Some(&json!("9AB1234")));
    }

    #[test]
    fn test_set_value_reports_change() {
        let mut store = FormStore::from_definition(&definition()).unwrap();
        assert!(!store.set_value("plate", json!("9AB1234")));
        assert!(store.set_value("plate", json!("1XY9999")));
        assert!(store.set_value("new", json!(true)));
    }

    #[test]
    fn test_errors_and_clear() {
        let mut store = FormStore::from_definition(&definition()).unwrap();
        assert!(store.set_error("plate", "plate.required"));
        assert!(!store.set_error("ghost", "x"));
        assert_eq!(store.errors().len(), 1);

        let cleared = store.clear_errors(["plate", "loose"]);
        assert_eq!(cleared, vec!["plate"]);
        assert!(store.errors().is_empty());
    }

    #[test]
    fn test_visible_field_ids() {
        let mut store = FormStore::from_definition(&definition()).unwrap();
        assert_eq!(store.visible_field_ids(), vec!["plate", "total", "loose"]);

        store.set_group_state("secret", GroupState::Editable);
        assert_eq!(
            store.visible_field_ids(),
            vec!["plate", "total", "csrf_token", "loose"]
        );
    }

    #[test]
    fn test_fields_of_groups_flattens_tabs() {
        let mut definition = definition();
        let mut tabs = IndexMap::new();
        tabs.insert("a".to_string(), vec!["plate".to_string()]);
        tabs.insert("b".to_string(), vec!["loose".to_string()]);
        definition.groups.insert(
            "tabbed".into(),
            GroupDefinition {
                value: GroupValue::Tabs(tabs),
                ..GroupDefinition::default()
            },
        );
        definition.groups.shift_remove("main");
        definition.steps.insert("three".into(), vec!["tabbed".into()]);
        definition.steps.shift_remove("one");

        let store = FormStore::from_definition(&definition).unwrap();
        let ids = store.fields_of_groups(store.get_step("three").unwrap());
        assert_eq!(ids, vec!["plate", "loose"]);
    }

    #[test]
    fn test_handle_notifies_after_commit() {
        let handle = StoreHandle::new(FormStore::from_definition(&definition()).unwrap());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        handle.signals().field_changed.connect(
            "counter",
            Arc::new(move |_: &FieldChanged| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(!handle.set_value("plate", json!("9AB1234")));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert!(handle.set_value("plate", json!("1XY9999")));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.batch(|store, changed| {
            store.update_field("plate", FieldPatch::new().loading(true));
            store.update_field("plate", FieldPatch::new().loading(false));
            changed.push("plate".into());
            changed.push("plate".into());
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handle_receiver_can_read_store() {
        let handle = StoreHandle::new(FormStore::from_definition(&definition()).unwrap());
        let reader = handle.clone();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        handle.signals().field_changed.connect(
            "reader",
            Arc::new(move |event: &FieldChanged| {
                s.lock().unwrap().push(reader.value(&event.id));
            }),
        );

        handle.set_value("plate", json!("NEW"));
        assert_eq!(*seen.lock().unwrap(), vec![json!("NEW")]);
    }
}
