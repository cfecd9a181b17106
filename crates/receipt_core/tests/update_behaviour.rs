use std::sync::Once;

use receipt_core::{
    codes, update, AppState, ControlError, Effect, ExtractionError, Msg, Phase, ReceiptUpload,
    Stage, MAX_RETRIES,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(receipt_logging::initialize_for_tests);
}

fn receipt(name: &str) -> ReceiptUpload {
    ReceiptUpload::from_named_bytes(name, vec![0xFF, 0xD8, 0xFF])
}

fn select(state: AppState, name: &str) -> (AppState, Vec<Effect>) {
    update(state, Msg::FileSelected(receipt(name)))
}

fn fail_network(state: AppState, attempt: u64) -> AppState {
    let (state, _) = update(
        state,
        Msg::ExtractionFinished {
            attempt,
            outcome: Err(ExtractionError::network("connection refused")),
        },
    );
    state
}

#[test]
fn selecting_a_file_moves_idle_to_selected() {
    init_logging();
    let (mut state, effects) = select(AppState::new(), "receipt.jpg");

    let view = state.view();
    assert_eq!(view.phase, Phase::Selected);
    assert_eq!(view.file_name.as_deref(), Some("receipt.jpg"));
    assert_eq!(view.file_size.as_deref(), Some("3 Bytes"));
    assert_eq!(effects, vec![Effect::ClearPersisted]);
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn confirm_without_file_is_rejected() {
    init_logging();
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::ConfirmClicked);

    assert_eq!(
        effects,
        vec![Effect::CommandRejected(ControlError::NoFileSelected)]
    );
    assert_eq!(next, state);
}

#[test]
fn retry_without_file_is_rejected() {
    init_logging();
    let (_next, effects) = update(AppState::new(), Msg::RetryClicked);
    assert_eq!(
        effects,
        vec![Effect::CommandRejected(ControlError::NoFileSelected)]
    );
}

#[test]
fn confirm_submits_staged_file() {
    init_logging();
    let (state, _) = select(AppState::new(), "receipt.png");
    let (state, effects) = update(state, Msg::ConfirmClicked);

    assert_eq!(
        effects,
        vec![Effect::SubmitExtraction {
            attempt: 1,
            upload: receipt("receipt.png"),
        }]
    );
    assert_eq!(
        state.phase(),
        Phase::Processing {
            stage: Stage::Uploading,
            progress: 0
        }
    );
    assert_eq!(state.active_attempt(), Some(1));
}

#[test]
fn second_confirm_supersedes_in_flight_attempt() {
    init_logging();
    let (state, _) = select(AppState::new(), "receipt.png");
    let (state, _) = update(state, Msg::ConfirmClicked);
    let (state, effects) = update(state, Msg::ConfirmClicked);

    assert_eq!(
        effects,
        vec![
            Effect::AbortExtraction { attempt: 1 },
            Effect::SubmitExtraction {
                attempt: 2,
                upload: receipt("receipt.png"),
            },
        ]
    );
    assert_eq!(state.active_attempt(), Some(2));
}

#[test]
fn selecting_new_file_clears_result_and_retry_counter() {
    init_logging();
    let (state, _) = select(AppState::new(), "first.jpg");
    let (state, _) = update(state, Msg::ConfirmClicked);
    let state = fail_network(state, 1);
    let (state, _) = update(state, Msg::RetryClicked);
    let state = fail_network(state, 2);
    assert_eq!(state.retry_count(), 1);
    assert!(state.result().is_some());

    let (state, effects) = select(state, "second.jpg");

    assert_eq!(state.phase(), Phase::Selected);
    assert_eq!(state.retry_count(), 0);
    assert!(state.result().is_none());
    assert_eq!(effects, vec![Effect::ClearPersisted]);
}

#[test]
fn selecting_during_processing_aborts_attempt() {
    init_logging();
    let (state, _) = select(AppState::new(), "first.jpg");
    let (state, _) = update(state, Msg::ConfirmClicked);
    let (state, effects) = select(state, "second.jpg");

    assert_eq!(
        effects,
        vec![Effect::AbortExtraction { attempt: 1 }, Effect::ClearPersisted]
    );
    assert_eq!(state.active_attempt(), None);

    // A late completion from the aborted attempt is ignored.
    let (state, effects) = update(
        state,
        Msg::ExtractionFinished {
            attempt: 1,
            outcome: Err(ExtractionError::network("late")),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Selected);
}

#[test]
fn retry_is_bounded() {
    init_logging();
    let (mut state, _) = select(AppState::new(), "receipt.jpg");
    let (next, _) = update(state, Msg::ConfirmClicked);
    state = fail_network(next, 1);

    for expected in 1..=MAX_RETRIES {
        let (next, effects) = update(state, Msg::RetryClicked);
        assert!(matches!(
            effects.as_slice(),
            [Effect::SubmitExtraction { .. }]
        ));
        assert_eq!(next.retry_count(), expected);
        let attempt = next.active_attempt().unwrap();
        state = fail_network(next, attempt);
    }

    let before = state.clone();
    let (next, effects) = update(state, Msg::RetryClicked);
    assert_eq!(
        effects,
        vec![Effect::CommandRejected(ControlError::RetryLimitExceeded {
            max: MAX_RETRIES
        })]
    );
    assert_eq!(next, before);
}

#[test]
fn confirm_after_limit_is_rejected_too() {
    init_logging();
    let (state, _) = select(AppState::new(), "receipt.jpg");
    let (state, _) = update(state, Msg::ConfirmClicked);
    let mut state = fail_network(state, 1);
    for _ in 0..MAX_RETRIES {
        let (next, _) = update(state, Msg::RetryClicked);
        let attempt = next.active_attempt().unwrap();
        state = fail_network(next, attempt);
    }

    let before = state.clone();
    let (next, effects) = update(state, Msg::ConfirmClicked);
    assert_eq!(
        effects,
        vec![Effect::CommandRejected(ControlError::RetryLimitExceeded {
            max: MAX_RETRIES
        })]
    );
    assert_eq!(next, before);
    assert_eq!(next.phase(), Phase::Failed);
}

#[test]
fn confirm_on_finished_file_uses_retry_budget() {
    init_logging();
    let (state, _) = select(AppState::new(), "receipt.jpg");
    let (state, _) = update(state, Msg::ConfirmClicked);
    assert_eq!(state.retry_count(), 0);
    let state = fail_network(state, 1);

    let (state, effects) = update(state, Msg::ConfirmClicked);
    assert!(matches!(
        effects.as_slice(),
        [Effect::SubmitExtraction { attempt: 2, .. }]
    ));
    assert_eq!(state.retry_count(), 1);
}

#[test]
fn custom_retry_limit_is_respected() {
    init_logging();
    let (state, _) = select(AppState::with_max_retries(1), "receipt.jpg");
    let (state, _) = update(state, Msg::RetryClicked);
    let state = fail_network(state, 1);
    let (_state, effects) = update(state, Msg::RetryClicked);
    assert_eq!(
        effects,
        vec![Effect::CommandRejected(ControlError::RetryLimitExceeded { max: 1 })]
    );
}

#[test]
fn cancel_returns_to_idle_and_clears_everything() {
    init_logging();
    let (state, _) = select(AppState::new(), "receipt.jpg");
    let (state, _) = update(state, Msg::RetryClicked);
    let (state, effects) = update(state, Msg::CancelClicked);

    assert_eq!(
        effects,
        vec![Effect::AbortExtraction { attempt: 1 }, Effect::ClearPersisted]
    );
    let view = state.view();
    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.progress, 0);
    assert_eq!(view.retry_count, 0);
    assert!(view.file_name.is_none());
    assert!(view.result.is_none());
}

#[test]
fn aborted_outcome_is_silent() {
    init_logging();
    let (state, _) = select(AppState::new(), "receipt.jpg");
    let (state, _) = update(state, Msg::ConfirmClicked);
    let (state, effects) = update(
        state,
        Msg::ExtractionFinished {
            attempt: 1,
            outcome: Err(ExtractionError::aborted()),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Selected);
    assert!(state.result().is_none());
    assert!(state.view().error_message.is_none());
}

#[test]
fn network_failure_produces_failed_record() {
    init_logging();
    let (state, _) = select(AppState::new(), "receipt.jpg");
    let (state, _) = update(state, Msg::ConfirmClicked);
    let (state, effects) = update(
        state,
        Msg::ExtractionFinished {
            attempt: 1,
            outcome: Err(ExtractionError::network("dns failure")),
        },
    );

    assert_eq!(state.phase(), Phase::Failed);
    let record = state.result().unwrap();
    let error = record.error.as_ref().unwrap();
    assert_eq!(error.code, codes::NETWORK_ERROR);
    assert!(!error.message.is_empty());
    assert_eq!(effects, vec![Effect::PersistResult(record.clone())]);
    assert_eq!(state.view().error_message.as_deref(), Some(error.message.as_str()));
}
