//! # openform-signals
//!
//! Signal dispatcher for openform sessions. A form session owns one
//! [`FormSignals`] bundle; the store, the step navigator and the submit path
//! send typed events through it so that renderers can refresh without the
//! engine knowing who is listening.
//!
//! ## Usage
//!
//! ```
//! use openform_signals::{FieldChanged, FormSignals};
//! use std::sync::Arc;
//!
//! let signals = FormSignals::new();
//!
//! signals.field_changed.connect("renderer", Arc::new(|event: &FieldChanged| {
//!     println!("re-render {}", event.id);
//! }));
//!
//! let delivered = signals.field_changed.send(&FieldChanged::new("brand"));
//! assert_eq!(delivered, 1);
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::{Map, Value};

/// The type signature for a signal receiver callback.
///
/// Receivers must be `Send + Sync` so that a session can be driven from any
/// task of a multi-threaded runtime.
pub type SignalReceiver<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A signal that can be connected to and dispatched.
///
/// Each signal carries a payload type `T`. Receivers are called in the order
/// they were connected.
///
/// # Examples
///
/// ```
/// use openform_signals::Signal;
/// use std::sync::Arc;
///
/// let signal: Signal<String> = Signal::new();
///
/// signal.connect("logger", Arc::new(|msg: &String| {
///     println!("Received: {msg}");
/// }));
///
/// signal.send(&"hello".to_string());
/// ```
pub struct Signal<T: 'static> {
    receivers: RwLock<Vec<(String, SignalReceiver<T>)>>,
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("receivers", &self.receiver_ids())
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    /// Creates a new signal with no connected receivers.
    pub fn new() -> Self {
        Self {
            receivers: RwLock::new(Vec::new()),
        }
    }

    /// Connects a receiver to this signal.
    ///
    /// If a receiver with the same ID is already connected, it is replaced in
    /// place and keeps its position in the dispatch order.
    pub fn connect(&self, receiver_id: impl Into<String>, callback: SignalReceiver<T>) {
        let id = receiver_id.into();
        let mut receivers = self
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = receivers.iter_mut().find(|(rid, _)| *rid == id) {
            entry.1 = callback;
        } else {
            receivers.push((id, callback));
        }
    }

    /// Disconnects the receiver with the given ID.
    ///
    /// Returns `true` if a receiver was found and removed.
    pub fn disconnect(&self, receiver_id: &str) -> bool {
        let mut receivers = self
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let len_before = receivers.len();
        receivers.retain(|(id, _)| id != receiver_id);
        receivers.len() < len_before
    }

    /// Sends the signal to all connected receivers and returns how many were called.
    ///
    /// The receiver list is snapshotted before dispatch, so a receiver may
    /// connect or disconnect receivers on the same signal without deadlocking.
    pub fn send(&self, payload: &T) -> usize {
        let snapshot: Vec<SignalReceiver<T>> = self
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in &snapshot {
            callback(payload);
        }
        snapshot.len()
    }

    /// Returns the number of connected receivers.
    pub fn receiver_count(&self) -> usize {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns the connected receiver IDs in dispatch order.
    pub fn receiver_ids(&self) -> Vec<String> {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

// ── Form events ──────────────────────────────────────────────────────

/// Sent after a field record was committed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChanged {
    /// The id of the field that changed.
    pub id: String,
}

impl FieldChanged {
    /// Creates the event for the given field id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Sent when the step navigator moves between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepChanged {
    /// Step index before the transition.
    pub from: usize,
    /// Step index after the transition. Equal to the step count once completed.
    pub to: usize,
}

/// Sent after the submitter accepted a payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submitted {
    /// The button that triggered the submission.
    pub button: String,
    /// The submitted payload.
    pub values: Map<String, Value>,
}

/// The signals owned by one form session.
#[derive(Debug, Default)]
pub struct FormSignals {
    /// Fired after a field record changed.
    pub field_changed: Signal<FieldChanged>,
    /// Fired after the current step changed.
    pub step_changed: Signal<StepChanged>,
    /// Fired after a successful submission.
    pub submitted: Signal<Submitted>,
}

impl FormSignals {
    /// Creates a bundle with no connected receivers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disconnects `receiver_id` from every signal in the bundle.
    ///
    /// Returns `true` if it was connected to at least one of them.
    pub fn disconnect_all(&self, receiver_id: &str) -> bool {
        let fields = self.field_changed.disconnect(receiver_id);
        let steps = self.step_changed.disconnect(receiver_id);
        let submitted = self.submitted.disconnect(receiver_id);
        fields || steps || submitted
    }

    /// Notifies receivers that the field `id` changed.
    pub fn notify_field(&self, id: &str) {
        let delivered = self.field_changed.send(&FieldChanged::new(id));
        tracing::trace!(field = id, delivered, "field_changed sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_signal_connect_and_send() {
        let signal: Signal<String> = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        signal.connect(
            "counter",
            Arc::new(move |_: &String| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(signal.send(&"hello".to_string()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal: Signal<()> = Signal::new();

        signal.connect("a", Arc::new(|(): &()| {}));
        signal.connect("b", Arc::new(|(): &()| {}));
        assert_eq!(signal.receiver_count(), 2);

        assert!(signal.disconnect("a"));
        assert_eq!(signal.receiver_ids(), vec!["b".to_string()]);

        assert!(!signal.disconnect("nonexistent"));
        assert_eq!(signal.receiver_count(), 1);
    }

    #[test]
    fn test_signal_replace_receiver_keeps_position() {
        let signal: Signal<()> = Signal::new();
        signal.connect("first", Arc::new(|(): &()| {}));
        signal.connect("second", Arc::new(|(): &()| {}));
        signal.connect("first", Arc::new(|(): &()| {}));

        assert_eq!(
            signal.receiver_ids(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_empty_signal_send() {
        let signal: Signal<()> = Signal::default();
        assert_eq!(signal.send(&()), 0);
    }

    #[test]
    fn test_receiver_may_disconnect_itself() {
        let signal: Arc<Signal<()>> = Arc::new(Signal::new());
        let inner = Arc::clone(&signal);
        signal.connect(
            "once",
            Arc::new(move |(): &()| {
                inner.disconnect("once");
            }),
        );

        assert_eq!(signal.send(&()), 1);
        assert_eq!(signal.send(&()), 0);
    }

    #[test]
    fn test_form_signals_disconnect_all() {
        let signals = FormSignals::new();
        signals.field_changed.connect("view", Arc::new(|_: &FieldChanged| {}));
        signals.step_changed.connect("view", Arc::new(|_: &StepChanged| {}));

        assert!(signals.disconnect_all("view"));
        assert_eq!(signals.field_changed.receiver_count(), 0);
        assert_eq!(signals.step_changed.receiver_count(), 0);
        assert!(!signals.disconnect_all("view"));
    }

    #[test]
    fn test_events_serialize() {
        let json = serde_json::to_value(StepChanged { from: 0, to: 1 }).unwrap();
        assert_eq!(json, serde_json::json!({"from": 0, "to": 1}));
        let json = serde_json::to_value(FieldChanged::new("vin")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "vin"}));
    }
}
