//! Integration tests for the form signal bundle.
//!
//! Tests cover: ordered dispatch, payload delivery, per-session isolation,
//! and dispatch from several threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use openform_signals::{FieldChanged, FormSignals, Signal, StepChanged, Submitted};
use serde_json::{json, Map};

// ═════════════════════════════════════════════════════════════════════
// 1. Receivers run in connection order
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_receivers_called_in_connection_order() {
    let signal: Signal<FieldChanged> = Signal::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["store_view", "summary", "toolbar"] {
        let order = order.clone();
        signal.connect(
            name,
            Arc::new(move |_: &FieldChanged| {
                order.lock().unwrap().push(name);
            }),
        );
    }

    signal.send(&FieldChanged::new("brand"));
    assert_eq!(*order.lock().unwrap(), vec!["store_view", "summary", "toolbar"]);
}

// ═════════════════════════════════════════════════════════════════════
// 2. Payloads reach receivers intact
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_field_changed_payload() {
    let signals = FormSignals::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    signals.field_changed.connect(
        "capture",
        Arc::new(move |event: &FieldChanged| {
            seen_clone.lock().unwrap().push(event.id.clone());
        }),
    );

    signals.notify_field("brand");
    signals.notify_field("model");
    assert_eq!(*seen.lock().unwrap(), vec!["brand", "model"]);
}

#[test]
fn test_step_and_submit_payloads() {
    let signals = FormSignals::new();
    let last_step = Arc::new(Mutex::new(None));
    let buttons = Arc::new(Mutex::new(Vec::new()));

    let s = last_step.clone();
    signals.step_changed.connect(
        "steps",
        Arc::new(move |event: &StepChanged| {
            *s.lock().unwrap() = Some(*event);
        }),
    );
    let b = buttons.clone();
    signals.submitted.connect(
        "submits",
        Arc::new(move |event: &Submitted| {
            b.lock().unwrap().push(event.button.clone());
        }),
    );

    signals.step_changed.send(&StepChanged { from: 1, to: 2 });
    let mut values = Map::new();
    values.insert("vin".to_string(), json!("1HGCM82633A123456"));
    signals.submitted.send(&Submitted {
        button: "save".to_string(),
        values,
    });

    assert_eq!(*last_step.lock().unwrap(), Some(StepChanged { from: 1, to: 2 }));
    assert_eq!(*buttons.lock().unwrap(), vec!["save"]);
}

// ═════════════════════════════════════════════════════════════════════
// 3. Sessions do not share receivers
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_bundles_are_isolated() {
    let first = FormSignals::new();
    let second = FormSignals::new();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();

    first.field_changed.connect(
        "counter",
        Arc::new(move |_: &FieldChanged| {
            c.fetch_add(1, Ordering::SeqCst);
        }),
    );

    second.notify_field("brand");
    assert_eq!(count.load(Ordering::SeqCst), 0);
    first.notify_field("brand");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// ═════════════════════════════════════════════════════════════════════
// 4. Dispatch from several threads
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_send_from_threads() {
    let signals = Arc::new(FormSignals::new());
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    signals.field_changed.connect(
        "counter",
        Arc::new(move |_: &FieldChanged| {
            c.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let signals = signals.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    signals.notify_field(&format!("field_{i}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(count.load(Ordering::SeqCst), 40);
}
