//! Logging integration for the openform engine.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating spans around a
//! form session and a cascade pass.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info",
/// "openform_forms=trace"). In debug mode a pretty, human-readable format is
/// used; otherwise a structured JSON format is used. Calling this more than
/// once is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one form session.
///
/// # Examples
///
/// ```
/// use openform_core::logging::session_span;
///
/// let span = session_span("claim-42");
/// let _guard = span.enter();
/// tracing::info!("form loaded");
/// ```
pub fn session_span(form_id: &str) -> tracing::Span {
    tracing::info_span!("form_session", form = form_id)
}

/// Creates a tracing span for one cascade step (a parent feeding a child).
pub fn cascade_span(target: &str, source: &str) -> tracing::Span {
    tracing::debug_span!("cascade", target = target, source = source)
}
