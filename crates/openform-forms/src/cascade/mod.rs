//! Cascading SELECT fields.
//!
//! A SELECT field may list dependent fields in `config.loadData`. When its
//! value changes, each dependent field's options are fetched from an injected
//! loader, the field's value is reset (or auto-selected when exactly one
//! option comes back), and the change propagates to that field's own
//! dependents.
//!
//! - [`loader`] - The [`CascadeLoader`] seam and simple implementations
//! - [`resolver`] - The [`CascadeResolver`] that drives one cascade pass

pub mod loader;
pub mod resolver;

pub use loader::{CascadeLoader, EmptyLoader, FnLoader, LoadRequest};
pub use resolver::CascadeResolver;
