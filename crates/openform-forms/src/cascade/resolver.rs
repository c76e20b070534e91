//! The cascade resolver.
//!
//! One pass starts at a changed parent and walks the `loadData` graph:
//!
//! 1. The target and every field below it are marked loading and emptied,
//!    and each of them gets a new request token.
//! 2. The loader is awaited with no store lock held.
//! 3. The response is committed only if the target's token is still the one
//!    issued in step 1. A newer pass from any ancestor replaces it, so late
//!    responses for the old parent value are dropped at every depth.
//! 4. The target's dependents are resolved with its new value.
//!
//! A field reached twice along the same path is skipped, so a malformed graph
//! cannot recurse forever. Reaching the same field through two different
//! parents is allowed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::Instrument;

use openform_core::error::{FormError, FormResult};
use openform_core::logging::cascade_span;
use openform_core::settings::Settings;
use openform_core::value::is_empty_value;

use crate::cascade::loader::{CascadeLoader, LoadRequest};
use crate::definition::SelectOption;
use crate::store::{ConfigPatch, FieldPatch, FormStore, StoreHandle};

type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Drives cascades over a shared store.
pub struct CascadeResolver {
    store: StoreHandle,
    loader: Arc<dyn CascadeLoader>,
    timeout: Option<Duration>,
    max_depth: usize,
    tokens: Mutex<HashMap<String, u64>>,
}

impl fmt::Debug for CascadeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeResolver")
            .field("timeout", &self.timeout)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl CascadeResolver {
    /// Creates a resolver using the cascade section of `settings`.
    pub fn new(store: StoreHandle, loader: Arc<dyn CascadeLoader>, settings: &Settings) -> Self {
        Self {
            store,
            loader,
            timeout: settings.loader_timeout(),
            max_depth: settings.cascade.max_depth,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves every dependent of `source` after it changed to `value`.
    ///
    /// Dependents are resolved one after another, in declaration order.
    pub async fn on_change(&self, source: &str, value: &Value) {
        let children = self
            .store
            .field(source)
            .map(|field| field.config.load_data)
            .unwrap_or_default();

        for child in children {
            self.resolve(child, source.to_string(), value.clone(), 0, vec![source.to_string()])
                .await;
        }
    }

    /// Resolves a single dependent `target` of `source`.
    pub async fn cascade(&self, target: &str, source: &str, value: &Value) {
        self.resolve(
            target.to_string(),
            source.to_string(),
            value.clone(),
            0,
            vec![source.to_string()],
        )
        .await;
    }

    /// Returns the id of the newest request issued for `target` (0 if none).
    pub fn current_token(&self, target: &str) -> u64 {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .copied()
            .unwrap_or(0)
    }

    fn bump_token(&self, target: &str) -> u64 {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        let token = tokens.entry(target.to_string()).or_insert(0);
        *token += 1;
        *token
    }

    /// Invalidates every request in flight for `target` and the fields below
    /// it. Returns the target's new token.
    fn bump_subtree(&self, target: &str, subtree: &[String]) -> u64 {
        for id in subtree {
            self.bump_token(id);
        }
        self.bump_token(target)
    }

    fn resolve(
        &self,
        target: String,
        source: String,
        value: Value,
        depth: usize,
        path: Vec<String>,
    ) -> BoxFuture<'_> {
        let span = cascade_span(&target, &source);
        Box::pin(
            async move {
                if depth >= self.max_depth {
                    tracing::warn!(max_depth = self.max_depth, "cascade depth limit reached");
                    return;
                }
                if path.contains(&target) {
                    tracing::warn!(path = %path.join(" -> "), "cascade cycle skipped");
                    return;
                }
                if self.store.field(&target).is_none() {
                    tracing::debug!("cascade target does not exist");
                    return;
                }

                let subtree = descendants(&self.store.read(), &target);

                if is_empty_value(&value) {
                    // Parent cleared: abandon in-flight requests and stop spinners.
                    self.bump_subtree(&target, &subtree);
                    self.store.batch(|store, changed| {
                        for id in std::iter::once(&target).chain(&subtree) {
                            store.update_field(id, FieldPatch::new().loading(false));
                            changed.push(id.clone());
                        }
                    });
                    return;
                }

                let token = self.bump_subtree(&target, &subtree);
                self.store.batch(|store, changed| {
                    for id in std::iter::once(&target).chain(&subtree) {
                        store.update_field(id, FieldPatch::new().loading(true).value(Value::Null));
                        store.update_field_config(id, ConfigPatch::new().data(Vec::new()));
                        changed.push(id.clone());
                    }
                });

                let request = LoadRequest::new(target.clone(), source.clone(), value);
                let result = self.load(request).await;

                let committed = self.store.batch(|store, changed| {
                    if self.current_token(&target) != token {
                        tracing::debug!(token, "stale loader response discarded");
                        return None;
                    }
                    let next = commit(store, &target, result);
                    for id in &subtree {
                        store.update_field(id, FieldPatch::new().loading(false));
                        changed.push(id.clone());
                    }
                    changed.push(target.clone());
                    Some(next)
                });

                let Some(next_value) = committed else {
                    return;
                };

                let children = self
                    .store
                    .field(&target)
                    .map(|field| field.config.load_data)
                    .unwrap_or_default();
                let mut child_path = path;
                child_path.push(target.clone());
                for child in children {
                    self.resolve(
                        child,
                        target.clone(),
                        next_value.clone(),
                        depth + 1,
                        child_path.clone(),
                    )
                    .await;
                }
            }
            .instrument(span),
        )
    }

    async fn load(&self, request: LoadRequest) -> FormResult<Vec<SelectOption>> {
        let target = request.target.clone();
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.loader.load(request))
                .await
                .unwrap_or_else(|_| Err(FormError::LoaderTimeout(target))),
            None => self.loader.load(request).await,
        }
    }
}

/// Writes a loader result into the target. Returns the target's new value.
fn commit(store: &mut FormStore, target: &str, result: FormResult<Vec<SelectOption>>) -> Value {
    match result {
        Ok(options) => {
            let selected = match options.as_slice() {
                [only] => only.value.clone(),
                _ => Value::Null,
            };
            tracing::debug!(options = options.len(), "options loaded");
            store.update_field_config(target, ConfigPatch::new().data(options));
            store.update_field(
                target,
                FieldPatch::new().value(selected.clone()).loading(false),
            );
            selected
        }
        Err(err) => {
            tracing::warn!(error = %err, "loader failed; options cleared");
            store.update_field_config(target, ConfigPatch::new().data(Vec::new()));
            store.update_field(target, FieldPatch::new().value(Value::Null).loading(false));
            Value::Null
        }
    }
}

/// Every field reachable from `root` through `loadData`, excluding `root`.
fn descendants(store: &FormStore, root: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::from([root.to_string()]);
    let mut queue: VecDeque<String> = VecDeque::from([root.to_string()]);
    let mut out = Vec::new();

    while let Some(id) = queue.pop_front() {
        let Some(field) = store.get_field(&id) else {
            continue;
        };
        for child in &field.config.load_data {
            if seen.insert(child.clone()) {
                out.push(child.clone());
                queue.push_back(child.clone());
            }
        }
    }
    out
}
