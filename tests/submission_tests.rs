mod common;

use chrono::{Months, Utc};
use common::*;
use intake_flow::collaborators::{UploadError, UploadFile};
use intake_flow::fields::FieldValue;
use intake_flow::{FlowState, IntakeError, NavigationOutcome};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn address(line1: &str, line2: &str) -> FieldValue {
    let mut map = BTreeMap::new();
    map.insert("line1".to_string(), FieldValue::text(line1));
    map.insert("line2".to_string(), FieldValue::text(line2));
    FieldValue::Object(map)
}

fn ready_flow(persistence: Arc<FlakyPersistence>) -> TestFlow {
    let mut ctx = test_flow(persistence);
    walk_to_health(&mut ctx.flow);
    answer_health(&mut ctx.flow);
    ctx.flow.set_field("gender", FieldValue::text("")).unwrap();
    ctx.flow
        .set_field("address", address("1 Main St", ""))
        .unwrap();
    assert_eq!(ctx.flow.next().unwrap(), NavigationOutcome::ReadyToSubmit);
    ctx
}

#[tokio::test]
async fn test_retry_after_network_failure_sends_identical_payload() {
    let persistence = Arc::new(FlakyPersistence::failing(1));
    let mut ctx = ready_flow(persistence.clone());

    let err = ctx.flow.submit().await.unwrap_err();
    assert!(matches!(err, IntakeError::SubmissionTransport(_)));
    assert!(err.is_retryable());
    assert_eq!(ctx.flow.state(), &FlowState::segment(4));

    let receipt = ctx.flow.submit().await.unwrap();
    assert_eq!(ctx.flow.state(), &FlowState::Submitted);

    let seen = persistence.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].same_instance(&seen[1]));
    assert!(receipt.payload.same_instance(&seen[0]));
    assert_eq!(seen[0].to_bytes().unwrap(), seen[1].to_bytes().unwrap());
}

#[tokio::test]
async fn test_payload_is_sanitized_and_carries_system_fields() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut ctx = ready_flow(persistence);

    let receipt = ctx.flow.submit().await.unwrap();
    let payload = &receipt.payload;

    assert_eq!(payload.get("first_name"), Some(&json!("Ada")));
    assert_eq!(payload.get("bmi"), Some(&json!(25.8)));
    assert_eq!(payload.get("conditions"), Some(&json!(["none"])));
    assert_eq!(payload.get("address"), Some(&json!({"line1": "1 Main St"})));
    assert!(!payload.contains_key("gender"));
    assert!(!payload.contains_key("packs_per_day"));
    assert!(!payload.contains_key("photo_id"));

    let id = payload.str_field("authid").unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
    assert_eq!(payload.str_field("status"), Some("pending"));
    let timestamp = payload.str_field("submitted_at").unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert_eq!(receipt.record, Some(payload.to_value()));
}

#[tokio::test]
async fn test_second_submit_is_rejected() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut ctx = ready_flow(persistence.clone());

    ctx.flow.submit().await.unwrap();
    assert_eq!(
        ctx.flow.submit().await.unwrap_err(),
        IntakeError::AlreadySubmitted
    );
    assert_eq!(persistence.seen().len(), 1);
    assert!(matches!(
        ctx.flow.set_field("first_name", FieldValue::text("Bea")),
        Err(IntakeError::FlowClosed { .. })
    ));
}

#[tokio::test]
async fn test_submit_before_final_segment_is_incomplete() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut ctx = test_flow(persistence.clone());
    answer_about_you(&mut ctx.flow);

    let err = ctx.flow.submit().await.unwrap_err();
    assert_eq!(
        err,
        IntakeError::Incomplete {
            segment_id: "about_you".to_string()
        }
    );
    assert!(persistence.seen().is_empty());
}

#[tokio::test]
async fn test_submit_with_invalid_final_segment_is_incomplete() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut ctx = test_flow(persistence.clone());
    walk_to_health(&mut ctx.flow);

    assert!(matches!(
        ctx.flow.submit().await,
        Err(IntakeError::Incomplete { ref segment_id }) if segment_id == "health"
    ));
    assert!(ctx.flow.store().error("conditions").is_some());
    assert!(persistence.seen().is_empty());
}

#[tokio::test]
async fn test_ineligible_flow_cannot_submit() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut ctx = test_flow(persistence.clone());
    walk_to_health(&mut ctx.flow);
    answer_health(&mut ctx.flow);
    ctx.flow
        .set_field("pregnant", FieldValue::text("yes"))
        .unwrap();
    assert!(matches!(
        ctx.flow.next().unwrap(),
        NavigationOutcome::Ineligible { .. }
    ));

    assert!(matches!(
        ctx.flow.submit().await,
        Err(IntakeError::FlowClosed { .. })
    ));
    assert!(persistence.seen().is_empty());
}

#[tokio::test]
async fn test_disqualifying_edit_after_ready_blocks_submit() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut ctx = ready_flow(persistence.clone());

    ctx.flow
        .set_field("pregnant", FieldValue::text("yes"))
        .unwrap();
    let err = ctx.flow.submit().await.unwrap_err();

    assert!(matches!(err, IntakeError::FlowClosed { ref state } if state == "ineligible"));
    assert!(matches!(
        ctx.flow.state(),
        FlowState::Ineligible { segment_id } if segment_id.as_str() == "health"
    ));
    assert!(persistence.seen().is_empty());
    assert!(ctx
        .flow
        .set_field("pregnant", FieldValue::text("no"))
        .is_err());
}

#[tokio::test]
async fn test_upload_stores_url() {
    let mut ctx = in_memory_flow();
    ctx.flow = ctx.flow.with_uploads(Arc::new(StubUploads {
        outcome: Ok("https://files.example.com/id/ada.png".to_string()),
    }));

    let url = ctx
        .flow
        .upload("photo_id", UploadFile::new("ada.png", "image/png", vec![0x89, 0x50]))
        .await
        .unwrap();

    assert_eq!(url, "https://files.example.com/id/ada.png");
    assert_eq!(ctx.flow.get_field("photo_id"), FieldValue::text(url));
}

#[tokio::test]
async fn test_upload_failure_marks_only_that_field() {
    let mut ctx = in_memory_flow();
    ctx.flow = ctx.flow.with_uploads(Arc::new(StubUploads {
        outcome: Err(UploadError::Rejected("HTTP 413 Payload Too Large".to_string())),
    }));

    let err = ctx
        .flow
        .upload("photo_id", UploadFile::new("big.png", "image/png", vec![0; 16]))
        .await
        .unwrap_err();

    assert!(matches!(err, IntakeError::Upload { ref field, .. } if field == "photo_id"));
    assert!(ctx
        .flow
        .store()
        .error("photo_id")
        .is_some_and(|message| message.contains("413")));
    assert_eq!(ctx.flow.store().errors().len(), 1);
    assert!(!ctx.flow.store().is_set("photo_id"));
}

#[tokio::test]
async fn test_resume_from_snapshot_and_finish() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut first = test_flow(persistence.clone());
    answer_about_you(&mut first.flow);
    first.flow.next().unwrap();
    answer_body(&mut first.flow);
    first.flow.next().unwrap();

    let encoded = serde_json::to_string(&first.flow.snapshot()).unwrap();
    let snapshot = serde_json::from_str(&encoded).unwrap();

    let mut second = test_flow(persistence.clone());
    second.flow.resume(snapshot).unwrap();
    assert_eq!(second.flow.state(), &FlowState::segment(2));
    assert_eq!(second.flow.history(), &[0, 1]);
    assert_eq!(second.flow.get_field("bmi"), FieldValue::Number(25.8));

    second
        .flow
        .set_field("smoker", FieldValue::text("no"))
        .unwrap();
    assert_eq!(
        second.flow.next().unwrap(),
        NavigationOutcome::Advanced { from: 2, to: 4 }
    );
    answer_health(&mut second.flow);
    assert_eq!(second.flow.next().unwrap(), NavigationOutcome::ReadyToSubmit);
    let receipt = second.flow.submit().await.unwrap();
    assert_eq!(receipt.payload.str_field("first_name"), Some("Ada"));
}

#[test]
fn test_resume_is_rejected_once_ineligible() {
    let mut ctx = in_memory_flow();
    let snapshot = ctx.flow.snapshot();

    let dob = Utc::now()
        .date_naive()
        .checked_sub_months(Months::new(12 * 15))
        .unwrap();
    answer_about_you(&mut ctx.flow);
    ctx.flow
        .set_field("date_of_birth", FieldValue::text(dob.format("%Y-%m-%d").to_string()))
        .unwrap();
    assert!(matches!(
        ctx.flow.next().unwrap(),
        NavigationOutcome::Ineligible { .. }
    ));

    assert!(matches!(
        ctx.flow.resume(snapshot),
        Err(IntakeError::FlowClosed { .. })
    ));
    assert!(ctx.flow.state().is_terminal());
}

#[tokio::test]
async fn test_resume_is_rejected_once_submitted() {
    let persistence = Arc::new(FlakyPersistence::default());
    let mut ctx = ready_flow(persistence.clone());
    let snapshot = ctx.flow.snapshot();
    ctx.flow.submit().await.unwrap();

    assert!(matches!(
        ctx.flow.resume(snapshot),
        Err(IntakeError::FlowClosed { .. })
    ));
    assert_eq!(ctx.flow.state(), &FlowState::Submitted);
    assert_eq!(persistence.seen().len(), 1);
}
