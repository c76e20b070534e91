//! Multi-step navigation.
//!
//! A step form moves through its steps in declaration order. Index `total()`
//! is the completed panel, the only place from which the form may be
//! submitted. Moving forward validates every visible field of the current
//! step; moving back never validates.

use openform_core::error::FieldErrors;
use openform_rules::ErrorFormatter;
use openform_signals::StepChanged;

use crate::definition::StepMap;
use crate::store::StoreHandle;
use crate::validation::validate_fields;

/// The result of [`StepNavigator::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The navigator moved forward.
    Advanced {
        /// The previous index.
        from: usize,
        /// The new index.
        to: usize,
    },
    /// Validation failed; the index is unchanged.
    Blocked(FieldErrors),
    /// Already on the completed panel.
    Stayed(usize),
}

/// Step state machine over the step keys of one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNavigator {
    keys: Vec<String>,
    current: usize,
}

impl StepNavigator {
    /// Creates a navigator positioned on the first step.
    pub fn new(steps: &StepMap) -> Self {
        Self {
            keys: steps.keys().cloned().collect(),
            current: 0,
        }
    }

    /// The current index; equals [`total`](Self::total) once completed.
    pub const fn current(&self) -> usize {
        self.current
    }

    /// The number of steps.
    pub fn total(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` on the completed panel.
    pub fn is_completed(&self) -> bool {
        self.current >= self.keys.len()
    }

    /// The key of the current step, `None` once completed.
    pub fn current_key(&self) -> Option<&str> {
        self.keys.get(self.current).map(String::as_str)
    }

    /// Validates the current step and advances when every field passes.
    ///
    /// Every field of the step's visible groups is checked; each failure is
    /// recorded on its field. Errors of fields on other steps are untouched.
    pub fn next<F>(&mut self, store: &StoreHandle, formatter: &F) -> StepOutcome
    where
        F: ErrorFormatter + ?Sized,
    {
        let Some(key) = self.keys.get(self.current).cloned() else {
            return StepOutcome::Stayed(self.current);
        };

        let errors = store.batch(|store, changed| {
            let ids = store
                .get_step(&key)
                .map(|groups| store.fields_of_groups(groups))
                .unwrap_or_default();
            let cleared = store.clear_errors(ids.iter().map(String::as_str));
            changed.extend(cleared);
            let errors = validate_fields(store, &ids, formatter);
            changed.extend(errors.keys().cloned());
            errors
        });

        if !errors.is_empty() {
            tracing::debug!(step = %key, failed = errors.len(), "step blocked by validation");
            return StepOutcome::Blocked(errors);
        }

        let from = self.current;
        self.current = (self.current + 1).min(self.total());
        self.announce(store, from);
        StepOutcome::Advanced {
            from,
            to: self.current,
        }
    }

    /// Moves back one step, stopping at the first. Returns the new index.
    pub fn previous(&mut self, store: &StoreHandle) -> usize {
        let from = self.current;
        self.current = self.current.saturating_sub(1);
        if from != self.current {
            self.announce(store, from);
        }
        self.current
    }

    fn announce(&self, store: &StoreHandle, from: usize) {
        tracing::debug!(from, to = self.current, "step changed");
        store.signals().step_changed.send(&StepChanged {
            from,
            to: self.current,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FormDefinition, GroupState};
    use crate::store::FormStore;
    use openform_rules::KeyFormatter;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn store() -> StoreHandle {
        let definition = FormDefinition::from_value(json!({
            "fields": {
                "name": { "validators": "required|min:2" },
                "email": { "validators": ["required", "email"], "value": "nope" },
                "extra": { "validators": "required" },
                "vin": { "validators": "required|size:17" }
            },
            "groups": {
                "owner": { "value": ["name", "email"] },
                "optional": { "value": ["extra"] },
                "vehicle": { "value": ["vin"] }
            },
            "steps": { "one": ["owner", "optional"], "two": ["vehicle"] }
        }))
        .unwrap();
        StoreHandle::new(FormStore::from_definition(&definition).unwrap())
    }

    #[test]
    fn test_exhaustive_step_gating() {
        let store = store();
        store.set_group_state("optional", GroupState::Hidden);
        let mut nav = StepNavigator::new(store.read().steps());

        let outcome = nav.next(&store, &KeyFormatter);

        let StepOutcome::Blocked(errors) = outcome else {
            panic!("expected the step to be blocked");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["name"], "name.required");
        assert_eq!(errors["email"], "email.email");
        assert_eq!(nav.current(), 0);
        // Hidden group is not validated.
        assert_eq!(store.field("extra").unwrap().error, "");
    }

    #[test]
    fn test_advance_to_completed_and_back() {
        let store = store();
        store.set_group_state("optional", GroupState::Hidden);
        store.set_value("name", json!("Jo"));
        store.set_value("email", json!("jo@example.com"));
        store.set_value("vin", json!("1HGCM82633A123456"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.signals().step_changed.connect(
            "test",
            Arc::new(move |event: &StepChanged| sink.lock().unwrap().push((event.from, event.to))),
        );

        let mut nav = StepNavigator::new(store.read().steps());
        assert_eq!(nav.current_key(), Some("one"));
        assert_eq!(nav.next(&store, &KeyFormatter), StepOutcome::Advanced { from: 0, to: 1 });
        assert_eq!(nav.next(&store, &KeyFormatter), StepOutcome::Advanced { from: 1, to: 2 });
        assert!(nav.is_completed());
        assert_eq!(nav.current_key(), None);
        assert_eq!(nav.next(&store, &KeyFormatter), StepOutcome::Stayed(2));

        assert_eq!(nav.previous(&store), 1);
        assert_eq!(nav.previous(&store), 0);
        assert_eq!(nav.previous(&store), 0);

        assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (1, 2), (2, 1), (1, 0)]);
    }

    #[test]
    fn test_fixed_errors_are_cleared_on_retry() {
        let store = store();
        store.set_group_state("optional", GroupState::Hidden);
        let mut nav = StepNavigator::new(store.read().steps());
        assert!(matches!(nav.next(&store, &KeyFormatter), StepOutcome::Blocked(_)));

        store.set_value("name", json!("Jo"));
        store.set_value("email", json!("jo@example.com"));
        assert!(matches!(nav.next(&store, &KeyFormatter), StepOutcome::Advanced { .. }));
        assert!(store.read().errors().is_empty());
    }

    #[test]
    fn test_empty_steps() {
        let nav = StepNavigator::new(&StepMap::new());
        assert_eq!(nav.total(), 0);
        assert!(nav.is_completed());
    }
}
