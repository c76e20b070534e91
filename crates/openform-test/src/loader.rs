//! A scripted cascade loader.
//!
//! [`ScriptedLoader`] answers cascade loads from responses registered by the
//! test, records every request, and can fail, delay or hold individual
//! targets so that error, timeout and race paths can be driven
//! deterministically.
//!
//! ## Example
//!
//! ```
//! use openform_forms::cascade::{CascadeLoader, LoadRequest};
//! use openform_test::loader::ScriptedLoader;
//! use serde_json::json;
//!
//! let loader = ScriptedLoader::new();
//! loader.respond("model", &[("x5", "X5")]);
//!
//! let options = tokio_test::block_on(loader.load(LoadRequest::new("model", "brand", json!("bmw")))).unwrap();
//! assert_eq!(options.len(), 1);
//! loader.assert_called("model", 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use openform_core::error::{FormError, FormResult};
use openform_core::value::to_display_string;
use openform_forms::cascade::{CascadeLoader, LoadRequest};
use openform_forms::definition::SelectOption;

#[derive(Debug, Default)]
struct Script {
    by_target: HashMap<String, Vec<SelectOption>>,
    by_value: HashMap<(String, String), Vec<SelectOption>>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    gates: HashMap<(String, String), Arc<Notify>>,
    released: HashSet<(String, String)>,
    calls: Vec<LoadRequest>,
}

/// A [`CascadeLoader`] driven by a script. Clones share the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoader {
    script: Arc<Mutex<Script>>,
}

/// Builds options from `(value, label)` pairs.
pub fn options(pairs: &[(&str, &str)]) -> Vec<SelectOption> {
    pairs
        .iter()
        .map(|(value, label)| SelectOption::new(*value, *label))
        .collect()
}

impl ScriptedLoader {
    /// Creates a loader with an empty script. Unscripted targets get no options.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answers every load of `target` with these `(value, label)` options.
    pub fn respond(&self, target: &str, pairs: &[(&str, &str)]) -> &Self {
        self.respond_with(target, options(pairs))
    }

    /// Answers every load of `target` with these options.
    pub fn respond_with(&self, target: &str, options: Vec<SelectOption>) -> &Self {
        self.script().by_target.insert(target.to_string(), options);
        self
    }

    /// Answers loads of `target` whose parent value is `value`.
    ///
    /// Takes precedence over [`respond`](Self::respond).
    pub fn respond_for(&self, target: &str, value: &Value, pairs: &[(&str, &str)]) -> &Self {
        self.script()
            .by_value
            .insert((target.to_string(), to_display_string(value)), options(pairs));
        self
    }

    /// Makes every load of `target` fail.
    pub fn fail(&self, target: &str, message: &str) -> &Self {
        self.script()
            .failures
            .insert(target.to_string(), message.to_string());
        self
    }

    /// Delays every load of `target`.
    pub fn delay(&self, target: &str, delay: Duration) -> &Self {
        self.script().delays.insert(target.to_string(), delay);
        self
    }

    /// Holds loads of `target` for parent `value` until [`release`](Self::release).
    pub fn hold(&self, target: &str, value: &Value) -> &Self {
        let key = (target.to_string(), to_display_string(value));
        let mut script = self.script();
        script.released.remove(&key);
        script.gates.insert(key, Arc::new(Notify::new()));
        self
    }

    /// Lets a held load of `target` for `value` answer.
    pub fn release(&self, target: &str, value: &Value) {
        let key = (target.to_string(), to_display_string(value));
        let mut script = self.script();
        if let Some(gate) = script.gates.get(&key) {
            gate.notify_one();
        }
        script.released.insert(key);
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<LoadRequest> {
        self.script().calls.clone()
    }

    /// The requests received for `target`.
    pub fn calls_for(&self, target: &str) -> Vec<LoadRequest> {
        self.script()
            .calls
            .iter()
            .filter(|call| call.target == target)
            .cloned()
            .collect()
    }

    /// Forgets the recorded requests.
    pub fn clear_calls(&self) {
        self.script().calls.clear();
    }

    /// Yields to the runtime until at least `count` requests were received.
    ///
    /// # Panics
    ///
    /// Panics if they do not arrive within a bounded number of yields.
    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..10_000 {
            if self.script().calls.len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "Expected {count} loader call(s), but {} arrived",
            self.script().calls.len()
        );
    }

    /// Asserts that `target` was loaded exactly `expected` times.
    ///
    /// # Panics
    ///
    /// Panics if the count does not match.
    pub fn assert_called(&self, target: &str, expected: usize) {
        let actual = self.calls_for(target).len();
        assert_eq!(
            actual, expected,
            "Expected {expected} load(s) of '{target}', but {actual} were made"
        );
    }
}

#[async_trait]
impl CascadeLoader for ScriptedLoader {
    async fn load(&self, request: LoadRequest) -> FormResult<Vec<SelectOption>> {
        let value_key = (request.target.clone(), to_display_string(&request.value));
        let (gate, delay) = {
            let mut script = self.script();
            script.calls.push(request.clone());
            let gate = if script.released.contains(&value_key) {
                None
            } else {
                script.gates.get(&value_key).cloned()
            };
            (gate, script.delays.get(&request.target).copied())
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.script();
        if let Some(message) = script.failures.get(&request.target) {
            return Err(FormError::LoaderFailed {
                target: request.target,
                message: message.clone(),
            });
        }
        Ok(script
            .by_value
            .get(&value_key)
            .or_else(|| script.by_target.get(&request.target))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_value_specific_response_wins() {
        let loader = ScriptedLoader::new();
        loader
            .respond("model", &[("a", "A"), ("b", "B")])
            .respond_for("model", &json!("bmw"), &[("x5", "X5")]);

        let bmw = loader.load(LoadRequest::new("model", "brand", json!("bmw"))).await.unwrap();
        let audi = loader.load(LoadRequest::new("model", "brand", json!("audi"))).await.unwrap();
        let trim = loader.load(LoadRequest::new("trim", "model", json!("x5"))).await.unwrap();

        assert_eq!(bmw.len(), 1);
        assert_eq!(audi.len(), 2);
        assert!(trim.is_empty());
        assert_eq!(loader.calls().len(), 3);
        loader.assert_called("model", 2);
    }

    #[tokio::test]
    async fn test_failure() {
        let loader = ScriptedLoader::new();
        loader.fail("model", "boom");
        let err = loader
            .load(LoadRequest::new("model", "brand", json!("bmw")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Loader failed for 'model': boom");
    }

    #[tokio::test]
    async fn test_hold_and_release() {
        let loader = ScriptedLoader::new();
        loader.respond("model", &[("x5", "X5")]).hold("model", &json!("bmw"));

        let held = loader.clone();
        let task = tokio::spawn(async move {
            held.load(LoadRequest::new("model", "brand", json!("bmw"))).await
        });

        loader.wait_for_calls(1).await;
        assert!(!task.is_finished());

        loader.release("model", &json!("bmw"));
        assert_eq!(task.await.unwrap().unwrap().len(), 1);
    }
}
