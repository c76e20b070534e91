//! Assertion helpers for form state.
//!
//! Each helper panics with a message that names the field and shows what the
//! store actually holds.

use serde_json::Value;

use openform_forms::store::StoreHandle;

/// Asserts that `field` currently shows `expected` as its error.
///
/// # Panics
///
/// Panics if the field is missing or its error differs.
pub fn assert_field_error(store: &StoreHandle, field: &str, expected: &str) {
    let Some(record) = store.field(field) else {
        panic!("Field '{field}' does not exist");
    };
    assert_eq!(
        record.error, expected,
        "Field '{field}' error: expected '{expected}', got '{}'",
        record.error
    );
}

/// Asserts that no field shows an error.
///
/// # Panics
///
/// Panics listing the errors that are set.
pub fn assert_no_errors(store: &StoreHandle) {
    let errors = store.read().errors();
    assert!(errors.is_empty(), "Expected no field errors, got {errors:?}");
}

/// Asserts the stored value of `field`.
///
/// # Panics
///
/// Panics if the value differs.
pub fn assert_value(store: &StoreHandle, field: &str, expected: &Value) {
    let actual = store.value(field);
    assert_eq!(
        &actual, expected,
        "Field '{field}' value: expected {expected}, got {actual}"
    );
}

/// Asserts the option values of a SELECT field, in order.
///
/// # Panics
///
/// Panics if the field is missing or its options differ.
pub fn assert_options(store: &StoreHandle, field: &str, expected: &[&str]) {
    let Some(record) = store.field(field) else {
        panic!("Field '{field}' does not exist");
    };
    let actual: Vec<String> = record
        .config
        .data
        .iter()
        .map(|option| match &option.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    assert_eq!(actual, expected, "Field '{field}' options differ");
}

/// Asserts whether `field` is waiting on a cascade load.
///
/// # Panics
///
/// Panics if the field is missing or the flag differs.
pub fn assert_loading(store: &StoreHandle, field: &str, expected: bool) {
    let Some(record) = store.field(field) else {
        panic!("Field '{field}' does not exist");
    };
    assert_eq!(
        record.loading, expected,
        "Field '{field}' loading: expected {expected}"
    );
}
