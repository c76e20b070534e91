//! # openform-test
//!
//! Test support for openform. Provides scripted and recording stand-ins for
//! the collaborators a [`FormSession`](openform_forms::FormSession) is given,
//! shared form fixtures, and assertion helpers for store state.
//!
//! ## Modules
//!
//! - [`loader`] - A scripted cascade loader
//! - [`submitter`] - Recording submitter and table action
//! - [`fixtures`] - Shared form definitions
//! - [`assertions`] - Store assertions
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use openform_core::Settings;
//! use openform_forms::FormSession;
//! use openform_test::{fixtures, ScriptedLoader, RecordingSubmitter};
//!
//! let loader = ScriptedLoader::new();
//! let outbox = RecordingSubmitter::new();
//! let session = FormSession::new(
//!     &fixtures::claim_form().unwrap(),
//!     Settings::default(),
//!     Arc::new(loader.clone()),
//!     Arc::new(outbox.clone()),
//! ).unwrap();
//!
//! tokio_test::block_on(session.submit("save")).unwrap();
//! outbox.assert_submitted("save");
//! ```

pub mod assertions;
pub mod fixtures;
pub mod loader;
pub mod submitter;

pub use loader::ScriptedLoader;
pub use submitter::{RecordingSubmitter, RecordingTableAction, Submission};

use std::sync::Arc;

use openform_core::error::FormResult;
use openform_core::settings::Settings;
use openform_forms::definition::FormDefinition;
use openform_forms::session::FormSession;

/// A session over `definition` wired to the given test collaborators.
pub fn session_with(
    definition: &FormDefinition,
    settings: Settings,
    loader: &ScriptedLoader,
    outbox: &RecordingSubmitter,
) -> FormResult<FormSession> {
    FormSession::new(
        definition,
        settings,
        Arc::new(loader.clone()),
        Arc::new(outbox.clone()),
    )
}
