//! Definition integrity checks.
//!
//! Run by [`FormStore::initialize_from`](crate::store::FormStore::initialize_from)
//! before a definition is accepted. Error-level messages abort loading;
//! warnings are logged and the definition is used as is.
//!
//! | Id | Level | Problem |
//! |---|---|---|
//! | `groups.E001` | error | group references an unknown field |
//! | `groups.E002` | error | field listed by more than one group |
//! | `steps.E001` | error | step references an unknown group |
//! | `steps.E002` | error | group listed by more than one step |
//! | `fields.E001` | error | `loadData` references an unknown field |
//! | `fields.E002` | error | `loadData` dependency cycle |
//! | `fields.E003` | error | `hides` references an unknown group |
//! | `fields.E004` | error | field `id` differs from its key |
//! | `fields.W001` | warning | VIEWONLY expression does not parse |
//! | `fields.W002` | warning | table column expression does not parse |
//! | `fields.W003` | warning | expression on a field that is not VIEWONLY |

use std::collections::HashMap;

use openform_core::checks::CheckMessage;
use openform_expr::Expression;

use crate::definition::{FieldState, FormDefinition};

/// Runs every check and returns the messages in a stable order.
pub fn check_definition(definition: &FormDefinition) -> Vec<CheckMessage> {
    let mut messages = Vec::new();
    check_groups(definition, &mut messages);
    check_steps(definition, &mut messages);
    check_fields(definition, &mut messages);
    check_load_data_cycles(definition, &mut messages);
    check_expressions(definition, &mut messages);
    messages
}

fn check_groups(definition: &FormDefinition, messages: &mut Vec<CheckMessage>) {
    let mut owner: HashMap<&str, &str> = HashMap::new();

    for (group_id, group) in &definition.groups {
        for field_id in group.value.field_ids() {
            if !definition.fields.contains_key(field_id) {
                messages.push(CheckMessage::error(
                    format!("Group '{group_id}' references unknown field '{field_id}'."),
                    Some("Add the field to 'fields' or remove it from the group."),
                    Some(group_id.as_str()),
                    Some("groups.E001"),
                ));
                continue;
            }
            if let Some(first) = owner.insert(field_id, group_id) {
                if first != group_id.as_str() {
                    messages.push(CheckMessage::error(
                        format!(
                            "Field '{field_id}' is listed by groups '{first}' and '{group_id}'."
                        ),
                        Some("A field may belong to at most one group."),
                        Some(field_id),
                        Some("groups.E002"),
                    ));
                }
            }
        }
    }
}

fn check_steps(definition: &FormDefinition, messages: &mut Vec<CheckMessage>) {
    let mut owner: HashMap<&str, &str> = HashMap::new();

    for (step_key, group_ids) in &definition.steps {
        for group_id in group_ids {
            if !definition.groups.contains_key(group_id) {
                messages.push(CheckMessage::error(
                    format!("Step '{step_key}' references unknown group '{group_id}'."),
                    None,
                    Some(step_key.as_str()),
                    Some("steps.E001"),
                ));
                continue;
            }
            if let Some(first) = owner.insert(group_id, step_key) {
                if first != step_key.as_str() {
                    messages.push(CheckMessage::error(
                        format!("Group '{group_id}' is listed by steps '{first}' and '{step_key}'."),
                        Some("A group may belong to at most one step."),
                        Some(group_id.as_str()),
                        Some("steps.E002"),
                    ));
                }
            }
        }
    }
}

fn check_fields(definition: &FormDefinition, messages: &mut Vec<CheckMessage>) {
    for (key, field) in &definition.fields {
        if !field.id.is_empty() && field.id != *key {
            messages.push(CheckMessage::error(
                format!("Field '{key}' declares id '{}'.", field.id),
                Some("Omit 'id' or make it equal to the key."),
                Some(key.as_str()),
                Some("fields.E004"),
            ));
        }

        for child in &field.config.load_data {
            if !definition.fields.contains_key(child) {
                messages.push(CheckMessage::error(
                    format!("Field '{key}' loads unknown field '{child}'."),
                    None,
                    Some(key.as_str()),
                    Some("fields.E001"),
                ));
            }
        }

        for group_id in &field.config.hides {
            if !definition.groups.contains_key(group_id) {
                messages.push(CheckMessage::error(
                    format!("Field '{key}' hides unknown group '{group_id}'."),
                    None,
                    Some(key.as_str()),
                    Some("fields.E003"),
                ));
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

fn check_load_data_cycles(definition: &FormDefinition, messages: &mut Vec<CheckMessage>) {
    let mut marks: HashMap<&str, Mark> = definition
        .fields
        .keys()
        .map(|id| (id.as_str(), Mark::Unvisited))
        .collect();
    let mut path = Vec::new();

    for id in definition.fields.keys() {
        if marks.get(id.as_str()) == Some(&Mark::Unvisited) {
            visit(definition, id, &mut marks, &mut path, messages);
        }
    }
}

fn visit<'a>(
    definition: &'a FormDefinition,
    id: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    messages: &mut Vec<CheckMessage>,
) {
    marks.insert(id, Mark::OnPath);
    path.push(id);

    if let Some(field) = definition.fields.get(id) {
        for child in &field.config.load_data {
            match marks.get(child.as_str()).copied() {
                Some(Mark::Unvisited) => visit(definition, child, marks, path, messages),
                Some(Mark::OnPath) => {
                    let start = path.iter().position(|p| *p == child.as_str()).unwrap_or(0);
                    let mut cycle: Vec<&str> = path[start..].to_vec();
                    cycle.push(child.as_str());
                    messages.push(CheckMessage::error(
                        format!("loadData dependency cycle: {}.", cycle.join(" -> ")),
                        Some("A cascade would never settle; break the cycle."),
                        Some(child.as_str()),
                        Some("fields.E002"),
                    ));
                }
                // Done, or unknown (reported as fields.E001).
                _ => {}
            }
        }
    }

    path.pop();
    marks.insert(id, Mark::Done);
}

fn check_expressions(definition: &FormDefinition, messages: &mut Vec<CheckMessage>) {
    for (key, field) in &definition.fields {
        if let Some(source) = &field.expression {
            if field.state == FieldState::Viewonly {
                if let Err(err) = Expression::parse(source) {
                    messages.push(CheckMessage::warning(
                        format!("Expression of field '{key}' does not parse: {err}"),
                        Some("The field will display no value."),
                        Some(key.as_str()),
                        Some("fields.W001"),
                    ));
                }
            } else {
                messages.push(CheckMessage::warning(
                    format!("Field '{key}' has an expression but is not VIEWONLY."),
                    Some("The expression is ignored."),
                    Some(key.as_str()),
                    Some("fields.W003"),
                ));
            }
        }

        for column in &field.config.cols {
            let Some(source) = &column.expression else {
                continue;
            };
            if let Err(err) = Expression::parse(source) {
                messages.push(CheckMessage::warning(
                    format!(
                        "Expression of column '{}' in table '{key}' does not parse: {err}",
                        column.id
                    ),
                    None,
                    Some(key.as_str()),
                    Some("fields.W002"),
                ));
            }
        }
    }
}
