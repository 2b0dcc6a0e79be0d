mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::json;

use common::Harness;
use txwatch_core::{TxKind, TxState};
use txwatch_executor::{
    ExecuteError, ExecuteOptions, ExecutionState, ExecutorConfig, FieldType, ParamSchema,
    SchemaRegistry,
};
use txwatch_tracker::NotificationLevel;

const HASH: &str = "9f2c41d0aa";

#[tokio::test]
async fn unknown_kind_from_gateway_fails_with_server_detail() {
    let h = Harness::new(HASH);
    h.gateway.refuse_build(404, r#"{"error":"unknown kind"}"#);
    let errors = Arc::new(AtomicU32::new(0));
    let seen = errors.clone();
    let exec = h.executor();

    let err = exec
        .execute(
            TxKind::CourseCreate,
            json!({"alias": "alice"}),
            ExecuteOptions::new().on_error(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExecuteError::BuildFailed(_)));
    assert!(err.to_string().contains("unknown kind"));
    assert_eq!(exec.state(), ExecutionState::Error);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(exec.last_error().is_some());
    assert!(exec.last_result().is_none());

    let notes = h.notifier.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
    assert!(notes[0].message.contains("unknown kind"));
    assert!(h.registry.watched_ids().is_empty());
}

#[tokio::test]
async fn disconnected_wallet_is_rejected_before_building() {
    let h = Harness::new(HASH);
    h.wallet.connected.store(false, Ordering::SeqCst);
    let exec = h.executor();

    let err = exec
        .execute(TxKind::CourseCreate, json!({}), ExecuteOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecuteError::NotConnected));
    assert!(h.gateway.builds.lock().unwrap().is_empty());
    assert_eq!(exec.state(), ExecutionState::Error);
}

#[tokio::test]
async fn invalid_parameters_list_each_field() {
    let h = Harness::new(HASH);
    let mut schemas = SchemaRegistry::new();
    schemas.register(
        TxKind::CourseCreate,
        ParamSchema::new()
            .required("alias", FieldType::NonEmptyString)
            .required("teachers", FieldType::NonEmptyArray),
    );
    let exec = h.executor().with_schemas(schemas);

    let err = exec
        .execute(TxKind::CourseCreate, json!({"teachers": []}), ExecuteOptions::new())
        .await
        .unwrap_err();

    let ExecuteError::InvalidParameters(violations) = &err else {
        panic!("expected invalid parameters, got {err}");
    };
    assert_eq!(violations.len(), 2);
    assert!(h.gateway.builds.lock().unwrap().is_empty());

    // the same call goes through when validation is skipped
    let ok = exec
        .execute(
            TxKind::CourseCreate,
            json!({"teachers": []}),
            ExecuteOptions::new().skip_validation(),
        )
        .await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn tracked_kind_registers_and_watches() {
    let h = Harness::new(HASH);
    h.gateway
        .reply_with(json!({"unsignedTxCBOR": "84a5", "course_id": "c-1"}));
    let exec = h.executor().with_config(ExecutorConfig {
        explorer_base_url: Some("https://explorer.test/tx".into()),
    });
    let mut states = exec.subscribe_state();

    let result = exec
        .execute(
            TxKind::CourseCreate,
            json!({"alias": "alice"}),
            ExecuteOptions::new().metadata("course_id", "c-1"),
        )
        .await
        .unwrap();

    assert_eq!(result.tx_hash, HASH);
    assert!(result.success);
    assert!(result.requires_db_update);
    assert!(result.requires_onchain_confirmation);
    assert_eq!(result.explorer_url.as_deref(), Some("https://explorer.test/tx/9f2c41d0aa"));
    assert_eq!(result.extra.get("course_id"), Some(&json!("c-1")));
    assert_eq!(*states.borrow_and_update(), ExecutionState::Success);

    let builds = h.gateway.builds.lock().unwrap().clone();
    assert_eq!(builds[0].0, "course/owner/course/create");
    assert_eq!(
        h.wallet.signed.lock().unwrap().clone(),
        vec![("84a5".to_string(), true)]
    );

    let regs = h.gateway.registrations.lock().unwrap().clone();
    assert_eq!(regs.len(), 1);
    assert_eq!(regs[0].tx_type, "course_create");
    assert_eq!(
        regs[0].metadata.as_ref().and_then(|m| m.get("course_id")).map(String::as_str),
        Some("c-1")
    );

    let record = h.registry.get_watched_tx(HASH).expect("hash is watched");
    assert_eq!(record.kind, Some(TxKind::CourseCreate));
    assert_eq!(record.state, TxState::Pending);

    let notes = h.notifier.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].key, HASH);
    assert_eq!(notes[0].level, NotificationLevel::Pending);
}

#[tokio::test]
async fn failed_registration_still_watches() {
    let h = Harness::new(HASH);
    h.gateway.fail_register();
    let exec = h.executor();

    let result = exec
        .execute(TxKind::AssignmentCommit, json!({}), ExecuteOptions::new())
        .await;

    assert!(result.is_ok());
    assert_eq!(h.gateway.registrations.lock().unwrap().len(), 1);
    assert_eq!(h.registry.watched_ids(), vec![HASH.to_string()]);
    assert_eq!(exec.state(), ExecutionState::Success);
}

#[tokio::test]
async fn untracked_kind_reports_success_immediately() {
    let h = Harness::new(HASH);
    let successes = Arc::new(AtomicU32::new(0));
    let seen = successes.clone();
    let exec = h.executor();

    let result = exec
        .execute(
            TxKind::AdaTransfer,
            json!({"to": "addr_test1", "lovelace": 2_000_000}),
            ExecuteOptions::new().on_success(move |r| {
                assert!(r.success);
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

    assert!(!result.requires_db_update);
    assert!(!result.requires_onchain_confirmation);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert!(h.gateway.registrations.lock().unwrap().is_empty());
    assert!(h.registry.watched_ids().is_empty());

    let notes = h.notifier.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Success);
}

#[tokio::test]
async fn declined_signature_and_failed_submit() {
    let h = Harness::new(HASH);
    h.wallet.decline.store(true, Ordering::SeqCst);
    let exec = h.executor();

    let err = exec
        .execute(TxKind::TaskCommit, json!({}), ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::SigningFailed(_)));

    h.wallet.decline.store(false, Ordering::SeqCst);
    *h.wallet.submit_error.lock().unwrap() = Some("mempool full".into());
    let err = exec
        .execute(TxKind::TaskCommit, json!({}), ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::SubmitFailed(ref m) if m.contains("mempool full")));
    assert!(h.registry.watched_ids().is_empty());
}

#[tokio::test]
async fn missing_unsigned_payload_is_a_build_failure() {
    let h = Harness::new(HASH);
    h.gateway.reply_with(json!({"course_id": "c-1"}));
    let exec = h.executor();

    let err = exec
        .execute(TxKind::CourseCreate, json!({}), ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::BuildFailed(_)));
    assert!(h.wallet.signed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reset_returns_to_idle() {
    let h = Harness::new(HASH);
    h.gateway.refuse_build(500, "boom");
    let exec = h.executor();

    let _ = exec
        .execute(TxKind::CourseCreate, json!({}), ExecuteOptions::new())
        .await;
    assert_eq!(exec.state(), ExecutionState::Error);

    exec.reset();
    assert_eq!(exec.state(), ExecutionState::Idle);
    assert!(exec.last_error().is_none());
    assert!(exec.last_result().is_none());
}

#[tokio::test]
async fn failed_run_clears_the_previous_result() {
    let h = Harness::new(HASH);
    let exec = h.executor();

    exec.execute(TxKind::AdaTransfer, json!({}), ExecuteOptions::new())
        .await
        .unwrap();
    assert!(exec.last_result().is_some());

    h.gateway.refuse_build(400, r#"{"error":"insufficient funds"}"#);
    let _ = exec
        .execute(TxKind::AdaTransfer, json!({}), ExecuteOptions::new())
        .await;

    assert_eq!(exec.state(), ExecutionState::Error);
    assert!(exec.last_result().is_none());
    assert!(exec.last_error().is_some_and(|e| e.to_string().contains("insufficient funds")));
}
