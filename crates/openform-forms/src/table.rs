//! TABLE fields.
//!
//! A TABLE field's value is a list of row objects, each carrying a numeric
//! `id`. Columns are declared in `config.cols`; VIEWONLY columns with an
//! expression are computed per row, with the row as the evaluation context.
//!
//! Rows are edited locally unless the field declares `config.action`, in which
//! case a saved row is handed to an injected [`TableAction`] and the list it
//! returns becomes the new value.

use std::collections::HashSet;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use openform_core::error::FormResult;
use openform_core::value::{loose_eq, to_number};
use openform_expr::Expression;

use crate::definition::FieldDefinition;

/// Row ids are drawn from `0..ROW_ID_RANGE`.
pub const ROW_ID_RANGE: u64 = 1_000_000;

/// Random draws before a new row falls back to the largest used id plus one.
const ROW_ID_ATTEMPTS: usize = 64;

/// A row handed to a remote [`TableAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRequest {
    /// The endpoint from `config.action`.
    pub action: String,
    /// The TABLE field.
    pub field: String,
    /// The row being saved.
    pub row: Value,
}

/// Persists table rows remotely.
#[async_trait]
pub trait TableAction: Send + Sync {
    /// Saves `request.row` and returns the table's complete row list.
    async fn persist(&self, request: RowRequest) -> FormResult<Vec<Value>>;
}

/// The rows of a TABLE field; anything that is not a list has no rows.
pub fn rows(field: &FieldDefinition) -> Vec<Value> {
    match &field.value {
        Value::Array(rows) => rows.clone(),
        _ => Vec::new(),
    }
}

/// A new row: column defaults (or `""`) and a fresh unused id.
pub fn new_row(field: &FieldDefinition) -> Value {
    new_row_with_rng(field, &mut rand::thread_rng())
}

/// [`new_row`] with an explicit random source.
pub fn new_row_with_rng<R: Rng>(field: &FieldDefinition, rng: &mut R) -> Value {
    let mut row: Map<String, Value> = field
        .config
        .cols
        .iter()
        .map(|col| {
            (
                col.id.clone(),
                col.default.clone().unwrap_or_else(|| Value::String(String::new())),
            )
        })
        .collect();

    let used: HashSet<u64> = rows(field)
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_u64))
        .collect();
    let id = (0..ROW_ID_ATTEMPTS)
        .map(|_| rng.gen_range(0..ROW_ID_RANGE))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| used.iter().max().map_or(0, |max| max + 1));
    row.insert("id".to_string(), Value::from(id));
    Value::Object(row)
}

/// Replaces the row with the same `id`, or appends `row` as a new one.
///
/// Returns `false` (and leaves `rows` unchanged) when appending would exceed
/// `limit`. A limit of `0` is unlimited.
pub fn upsert_row(rows: &mut Vec<Value>, row: Value, limit: usize) -> bool {
    let id = row.get("id").cloned().unwrap_or(Value::Null);
    if let Some(existing) = rows
        .iter_mut()
        .find(|r| r.get("id").is_some_and(|rid| loose_eq(rid, &id)))
    {
        *existing = row;
        return true;
    }
    if limit != 0 && rows.len() >= limit {
        tracing::debug!(limit, "table row limit reached");
        return false;
    }
    rows.push(row);
    true
}

/// Removes the row with the given `id`. Returns `true` if one was removed.
pub fn remove_row(rows: &mut Vec<Value>, id: &Value) -> bool {
    let before = rows.len();
    rows.retain(|r| !r.get("id").is_some_and(|rid| loose_eq(rid, id)));
    rows.len() != before
}

/// The rows with every computed column filled in.
pub fn computed_rows(field: &FieldDefinition, max_depth: usize) -> Vec<Value> {
    let computed: Vec<(&str, Expression)> = field
        .config
        .cols
        .iter()
        .filter(|col| col.is_computed())
        .filter_map(|col| {
            let source = col.expression.as_deref()?;
            match Expression::parse_with_depth(source, max_depth) {
                Ok(expression) => Some((col.id.as_str(), expression)),
                Err(err) => {
                    tracing::warn!(column = %col.id, error = %err, "column expression does not parse");
                    None
                }
            }
        })
        .collect();

    rows(field)
        .into_iter()
        .map(|mut row| {
            let values: Vec<(String, Value)> = computed
                .iter()
                .map(|(id, expression)| ((*id).to_string(), expression.evaluate(&row).to_json()))
                .collect();
            if let Value::Object(map) = &mut row {
                map.extend(values);
            }
            row
        })
        .collect()
}

/// Column totals for every column marked `aggregate`.
///
/// Values that do not coerce to a finite number are skipped.
pub fn aggregate(field: &FieldDefinition, rows: &[Value]) -> Map<String, Value> {
    field
        .config
        .cols
        .iter()
        .filter(|col| col.aggregate)
        .map(|col| {
            let total: f64 = rows
                .iter()
                .filter_map(|row| row.get(&col.id))
                .map(to_number)
                .filter(|n| n.is_finite())
                .sum();
            (col.id.clone(), Value::from(total))
        })
        .collect()
}
