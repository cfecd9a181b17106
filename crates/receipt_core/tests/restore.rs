use receipt_core::{
    update, AppState, ControlError, Effect, Msg, Phase, ReceiptResponse, ReceiptUpload,
};

fn init_logging() {
    receipt_logging::initialize_for_tests();
}

fn stored_result() -> ReceiptResponse {
    serde_json::from_str(
        r#"{"status":"success","extraction_id":"ex-9","vendor_name":"Bakery","total":3.2}"#,
    )
    .unwrap()
}

#[test]
fn persisted_result_is_restored_into_idle_controller() {
    init_logging();
    let (mut state, effects) = update(AppState::new(), Msg::ResultRestored(stored_result()));

    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Success);
    assert_eq!(state.result(), Some(&stored_result()));
    assert!(state.file().is_none());
    assert!(state.consume_dirty());
    assert!(!state.view().can_retry);
}

#[test]
fn restore_never_overrides_active_work() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::FileSelected(ReceiptUpload::from_named_bytes("r.jpg", vec![1])),
    );
    let (state, effects) = update(state, Msg::ResultRestored(stored_result()));

    assert_eq!(effects, vec![Effect::CommandRejected(ControlError::NotIdle)]);
    assert_eq!(state.phase(), Phase::Selected);
    assert!(state.result().is_none());
}

#[test]
fn restored_failure_is_displayed() {
    init_logging();
    let failed = ReceiptResponse::failed("NOT_A_RECEIPT", "");
    let (state, _) = update(AppState::new(), Msg::ResultRestored(failed));

    assert_eq!(state.phase(), Phase::Failed);
    let message = state.view().error_message.unwrap();
    assert!(message.contains("does not appear to be a receipt"));
}
