//! End-to-end session tests.
//!
//! These tests exercise the complete path of a form session:
//!   definition -> store -> input rules -> validation -> steps -> submission
//!
//! The vehicle form covers step navigation; the claim form covers
//! single-page submission and TABLE fields.

use std::sync::{Arc, Mutex};

use serde_json::json;

use openform_core::{FormError, Settings};
use openform_forms::{FormSession, StepOutcome};
use openform_signals::StepChanged;
use openform_test::assertions::{assert_field_error, assert_no_errors, assert_value};
use openform_test::fixtures::{self, VALID_VIN};
use openform_test::{session_with, RecordingSubmitter, RecordingTableAction, ScriptedLoader};

// ============================================================================
// Helpers
// ============================================================================

fn car_session(outbox: &RecordingSubmitter) -> FormSession {
    let loader = ScriptedLoader::new();
    loader.respond_for("model", &json!("audi"), &[("a4", "A4")]).respond_for(
        "trim",
        &json!("a4"),
        &[("sport", "Sport"), ("base", "Base")],
    );
    session_with(&fixtures::car_form().unwrap(), Settings::default(), &loader, outbox).unwrap()
}

fn claim_session(outbox: &RecordingSubmitter) -> FormSession {
    session_with(
        &fixtures::claim_form().unwrap(),
        Settings::default(),
        &ScriptedLoader::new(),
        outbox,
    )
    .unwrap()
}

async fn fill_vehicle(session: &FormSession) {
    session.set_value("brand", json!("audi")).await.unwrap();
    session.set_value("trim", json!("base")).await.unwrap();
}

async fn fill_specs(session: &FormSession, vin: &str) {
    session.set_value("fuelType", json!("electric")).await.unwrap();
    session.set_value("transmission", json!("manual")).await.unwrap();
    session.set_value("horsepower", json!(150)).await.unwrap();
    session.set_value("vin", json!(vin)).await.unwrap();
}

async fn fill_owner(session: &FormSession) {
    session.set_value("ownerName", json!("Ada Lovelace")).await.unwrap();
    session.set_value("ownerEmail", json!("ada@example.com")).await.unwrap();
    session.set_value("confirmEmail", json!("ada@example.com")).await.unwrap();
    session.set_value("registrationDate", json!("2024-03-01")).await.unwrap();
    session.set_value("termsAccepted", json!(true)).await.unwrap();
}

// ============================================================================
// Step navigation
// ============================================================================

/// 1. An empty first step blocks and reports every failing field.
#[tokio::test]
async fn test_first_step_blocks_until_filled() {
    let outbox = RecordingSubmitter::new();
    let session = car_session(&outbox);

    let StepOutcome::Blocked(errors) = session.next().unwrap() else {
        panic!("an empty step must not advance");
    };
    assert_eq!(errors.len(), 3);
    assert_eq!(errors["brand"], "brand.required");
    assert_eq!(session.current_step(), Some(0));
    assert_field_error(session.store(), "model", "model.required");

    fill_vehicle(&session).await;
    assert_eq!(session.next().unwrap(), StepOutcome::Advanced { from: 0, to: 1 });
    assert_no_errors(session.store());
}

/// 2. A short VIN keeps the specs step closed; a valid one opens it.
#[tokio::test]
async fn test_vin_gates_specs_step() {
    let outbox = RecordingSubmitter::new();
    let session = car_session(&outbox);
    fill_vehicle(&session).await;
    session.next().unwrap();

    for bad in ["SHORT", "1HGCM82633A12345"] {
        fill_specs(&session, bad).await;
        let StepOutcome::Blocked(errors) = session.next().unwrap() else {
            panic!("VIN '{bad}' must not pass");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["vin"], "vin.size");
    }

    fill_specs(&session, VALID_VIN).await;
    assert_eq!(session.next().unwrap(), StepOutcome::Advanced { from: 1, to: 2 });
}

/// 3. Two fields failing different rules are both reported.
#[tokio::test]
async fn test_step_check_is_exhaustive() {
    let outbox = RecordingSubmitter::new();
    let session = car_session(&outbox);
    fill_vehicle(&session).await;
    session.next().unwrap();

    fill_specs(&session, "SHORT").await;
    session.set_value("horsepower", json!("30")).await.unwrap();

    let StepOutcome::Blocked(errors) = session.next().unwrap() else {
        panic!("the specs step must not advance");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(errors["horsepower"], "horsepower.between");
    assert_eq!(errors["vin"], "vin.size");
    assert_eq!(session.current_step(), Some(1));
}

/// 4. Walking forward to completion and back emits step-changed signals.
#[tokio::test]
async fn test_full_walk_with_signals() {
    let outbox = RecordingSubmitter::new();
    let session = car_session(&outbox);

    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    session.signals().step_changed.connect(
        "log",
        Arc::new(move |event: &StepChanged| sink.lock().unwrap().push((event.from, event.to))),
    );

    fill_vehicle(&session).await;
    session.next().unwrap();
    fill_specs(&session, VALID_VIN).await;
    session.next().unwrap();
    fill_owner(&session).await;
    assert_eq!(session.next().unwrap(), StepOutcome::Advanced { from: 2, to: 3 });

    assert!(session.is_completed());
    assert_eq!(session.next().unwrap(), StepOutcome::Stayed(3));
    assert_eq!(session.previous().unwrap(), 2);

    assert_eq!(*log.lock().unwrap(), vec![(0, 1), (1, 2), (2, 3), (3, 2)]);
}

// ============================================================================
// Submission
// ============================================================================

/// 5. A step form refuses the submit button until completed; save always works.
#[tokio::test]
async fn test_step_form_submit_requires_completion() {
    let outbox = RecordingSubmitter::new();
    let session = car_session(&outbox);

    let err = session.submit("submit").await.unwrap_err();
    assert!(matches!(err, FormError::StepNotCompleted { current: 0, total: 3 }));
    outbox.assert_count(0);

    session.submit("save").await.unwrap();
    outbox.assert_submitted("save");

    fill_vehicle(&session).await;
    session.next().unwrap();
    fill_specs(&session, VALID_VIN).await;
    session.next().unwrap();
    fill_owner(&session).await;
    session.next().unwrap();

    session.submit("submit").await.unwrap();
    outbox.assert_count(2);
    let sent = outbox.last().unwrap();
    assert_eq!(sent.button, "submit");
    assert_eq!(sent.values["vin"], VALID_VIN);
    assert_eq!(sent.values["model"], "a4");
}

/// 6. Undeclared buttons are rejected.
#[tokio::test]
async fn test_unknown_button() {
    let outbox = RecordingSubmitter::new();
    let session = claim_session(&outbox);

    let err = session.submit("archive").await.unwrap_err();
    assert!(matches!(err, FormError::UnknownButton(ref b) if b == "archive"));
    outbox.assert_count(0);
}

/// 7. A single-page form validates every visible field before submitting.
#[tokio::test]
async fn test_single_page_submit_validates() {
    let outbox = RecordingSubmitter::new();
    let session = claim_session(&outbox);

    session.set_value("plate", json!("")).await.unwrap();
    let Err(FormError::Validation(errors)) = session.submit("submit").await else {
        panic!("an empty plate must block submission");
    };
    assert_eq!(errors["plate"], "plate.required");
    assert_field_error(session.store(), "plate", "plate.required");
    outbox.assert_count(0);

    session.set_value("plate", json!("9AB1234")).await.unwrap();
    session.submit("submit").await.unwrap();
    assert_no_errors(session.store());
    outbox.assert_count(1);
}

/// 8. The payload leaves out hidden fields and carries computed table columns.
#[tokio::test]
async fn test_payload_shape() {
    let outbox = RecordingSubmitter::new();
    let session = claim_session(&outbox);

    assert_eq!(session.csrf_token().as_deref(), Some("demo_csrf_token_123456"));

    session.submit("save").await.unwrap();
    let values = outbox.last().unwrap().values;

    assert!(!values.contains_key("csrf_token"));
    assert_eq!(values["number"], "EWC-DEMO-001");
    assert_eq!(values["claimParts"][0]["totalCost"], json!(120));
    assert_eq!(values["claimFiles"], json!([]));
}

/// 9. A failing submitter surfaces its error and sends no submitted signal.
#[tokio::test]
async fn test_submitter_failure() {
    let outbox = RecordingSubmitter::failing("server down");
    let session = claim_session(&outbox);

    let sent = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&sent);
    session.signals().submitted.connect(
        "count",
        Arc::new(move |_: &openform_signals::Submitted| *counter.lock().unwrap() += 1),
    );

    let err = session.submit("save").await.unwrap_err();
    assert!(matches!(err, FormError::ActionFailed { .. }));
    assert_eq!(*sent.lock().unwrap(), 0);
}

// ============================================================================
// Input
// ============================================================================

/// 10. Read-only fields and out-of-range dates reject input.
#[tokio::test]
async fn test_input_rules() {
    let outbox = RecordingSubmitter::new();
    let session = claim_session(&outbox);

    assert!(!session.set_value("policyNumber", json!("POL-X")).await.unwrap());
    assert_value(session.store(), "policyNumber", &json!("POL-2026-0001"));

    assert!(!session.set_value("noticedDate", json!(1_000_000_000)).await.unwrap());
    assert!(session.set_value("noticedDate", json!(1_700_000_000)).await.unwrap());
    assert_value(session.store(), "noticedDate", &json!(1_699_920_000));

    assert!(matches!(
        session.set_value("nope", json!(1)).await,
        Err(FormError::UnknownField(_))
    ));
}

// ============================================================================
// Tables
// ============================================================================

/// 11. Rows are added locally up to the table limit.
#[tokio::test]
async fn test_local_rows_respect_limit() {
    let outbox = RecordingSubmitter::new();
    let session = claim_session(&outbox);

    let mut row = session.new_row("claimParts").unwrap();
    assert_eq!(row["quantity"], json!(1));
    row["price"] = json!(80);
    assert!(session.save_row("claimParts", row).await.unwrap());
    assert_eq!(session.values()["claimParts"][1]["totalCost"], json!(80));

    for _ in 0..3 {
        let row = session.new_row("claimParts").unwrap();
        assert!(session.save_row("claimParts", row).await.unwrap());
    }
    let extra = session.new_row("claimParts").unwrap();
    assert!(!session.save_row("claimParts", extra).await.unwrap());
    assert_eq!(session.store().value("claimParts").as_array().unwrap().len(), 5);

    assert!(session.delete_row("claimParts", &json!(1)).unwrap());
    assert!(!session.delete_row("claimParts", &json!(1)).unwrap());
}

/// 12. Tables with an action save through the table action.
#[tokio::test]
async fn test_remote_rows() {
    let outbox = RecordingSubmitter::new();
    let server = RecordingTableAction::new();
    let session = claim_session(&outbox).with_table_action(Arc::new(server.clone()));

    let row = json!({ "id": 9, "name": "photo.jpg", "description": "rear" });
    assert!(session.save_row("claimFiles", row).await.unwrap());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].action, "/claims/files");
    assert_value(session.store(), "claimFiles", &json!(server.rows("claimFiles")));

    server.fail("storage full");
    let row = json!({ "id": 10, "name": "invoice.pdf" });
    assert!(!session.save_row("claimFiles", row).await.unwrap());
    assert_eq!(session.store().value("claimFiles").as_array().unwrap().len(), 1);
}

/// 13. Row operations on a field that is not a table fail.
#[tokio::test]
async fn test_row_operations_need_a_table() {
    let outbox = RecordingSubmitter::new();
    let session = claim_session(&outbox);

    assert!(matches!(
        session.new_row("plate"),
        Err(FormError::ConfigurationError(_))
    ));
    assert!(matches!(
        session.save_row("missing", json!({})).await,
        Err(FormError::UnknownField(_))
    ));
}

// ============================================================================
// Sync entry points
// ============================================================================

/// 14. Sessions can be driven from synchronous code.
#[test]
fn test_blocking_submit() {
    let outbox = RecordingSubmitter::new();
    let session = claim_session(&outbox);
    tokio_test::block_on(session.submit("save")).unwrap();
    outbox.assert_count(1);
}
