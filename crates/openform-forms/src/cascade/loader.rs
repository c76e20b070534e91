//! The cascade loader seam.
//!
//! The resolver asks an injected [`CascadeLoader`] for the options of a
//! dependent field whenever its parent changes. Applications typically back it
//! with an HTTP call; tests use a scripted implementation.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use openform_core::error::FormResult;

use crate::definition::SelectOption;

/// One load: the options of `target` for `source` = `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// The dependent field whose options are requested.
    pub target: String,
    /// The parent field that changed.
    pub source: String,
    /// The parent's new value.
    pub value: Value,
}

impl LoadRequest {
    /// Creates a request.
    pub fn new(target: impl Into<String>, source: impl Into<String>, value: Value) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
            value,
        }
    }
}

/// Supplies option lists for dependent SELECT fields.
///
/// May be called repeatedly for the same target. Errors are contained by the
/// resolver: the target is left with no options and no value.
#[async_trait]
pub trait CascadeLoader: Send + Sync {
    /// Loads the options for `request.target`.
    async fn load(&self, request: LoadRequest) -> FormResult<Vec<SelectOption>>;
}

/// A loader that never returns options. Used when a form has no remote data.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyLoader;

#[async_trait]
impl CascadeLoader for EmptyLoader {
    async fn load(&self, _request: LoadRequest) -> FormResult<Vec<SelectOption>> {
        Ok(Vec::new())
    }
}

/// Adapts an async closure into a [`CascadeLoader`].
///
/// # Examples
///
/// ```
/// use openform_core::error::FormError;
/// use openform_forms::cascade::{CascadeLoader, FnLoader, LoadRequest};
/// use openform_forms::definition::SelectOption;
/// use serde_json::json;
///
/// let loader = FnLoader::new(|request: LoadRequest| async move {
///     let value = format!("{}-1", request.value.as_str().unwrap_or(""));
///     Ok::<_, FormError>(vec![SelectOption::new(value, "First")])
/// });
///
/// let options = tokio_test_block_on(loader.load(LoadRequest::new("model", "brand", json!("bmw"))));
/// assert_eq!(options.unwrap()[0].value, json!("bmw-1"));
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct FnLoader<F> {
    func: F,
}

impl<F> FnLoader<F> {
    /// Wraps the closure.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> CascadeLoader for FnLoader<F>
where
    F: Fn(LoadRequest) -> Fut + Send + Sync,
    Fut: Future<Output = FormResult<Vec<SelectOption>>> + Send,
{
    async fn load(&self, request: LoadRequest) -> FormResult<Vec<SelectOption>> {
        (self.func)(request).await
    }
}
