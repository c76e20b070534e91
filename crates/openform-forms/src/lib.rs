//! # openform-forms
//!
//! The runtime of an openform form: definitions, the store, cascading
//! selects, step navigation and the session that ties them together.
//!
//! ## Modules
//!
//! - [`definition`] - The serializable form definition model
//! - [`checks`] - Integrity checks run when a definition is loaded
//! - [`store`] - The field/group/step store and its shared handle
//! - [`validation`] - Validating store fields with the rule engine
//! - [`cascade`] - Loading dependent SELECT options
//! - [`steps`] - The step navigator
//! - [`input`] - Per-type input acceptance
//! - [`props`] - Renderer-facing field props
//! - [`table`] - TABLE field rows and computed columns
//! - [`renderer`] - The renderer registry
//! - [`session`] - One open form and its collaborators
//!
//! ## Quick Start
//!
//! ```
//! use openform_forms::definition::FormDefinition;
//! use openform_forms::store::{FormStore, StoreHandle};
//! use openform_forms::steps::{StepNavigator, StepOutcome};
//! use openform_rules::KeyFormatter;
//! use serde_json::json;
//!
//! let definition = FormDefinition::from_value(json!({
//!     "fields": { "vin": { "type": "STRING", "value": "SHORT", "validators": "required|size:17" } },
//!     "groups": { "vehicle": { "value": ["vin"] } },
//!     "steps": { "vehicle": ["vehicle"] }
//! })).unwrap();
//!
//! let store = StoreHandle::new(FormStore::from_definition(&definition).unwrap());
//! let mut navigator = StepNavigator::new(&definition.steps);
//!
//! let StepOutcome::Blocked(errors) = navigator.next(&store, &KeyFormatter) else { unreachable!() };
//! assert_eq!(errors["vin"], "vin.size");
//! ```

pub mod cascade;
pub mod checks;
pub mod definition;
pub mod input;
pub mod props;
pub mod renderer;
pub mod session;
pub mod steps;
pub mod store;
pub mod table;
pub mod validation;

pub use cascade::{CascadeLoader, CascadeResolver, EmptyLoader, FnLoader, LoadRequest};
pub use definition::{
    Button, FieldConfig, FieldDefinition, FieldState, FieldType, FormDefinition, GroupDefinition,
    GroupState, GroupType, GroupValue, SelectOption, StepMap, TableColumn,
};
pub use props::{field_props, FieldProps};
pub use renderer::{FieldKind, FieldRenderer, RendererRegistry};
pub use session::{FormSession, Submitter};
pub use steps::{StepNavigator, StepOutcome};
pub use store::{ConfigPatch, FieldPatch, FormStore, StoreHandle};
pub use table::{RowRequest, TableAction};
