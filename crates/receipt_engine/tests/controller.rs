use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use pretty_assertions::assert_eq;
use receipt_core::{
    codes, ControlError, ExtractOptions, ExtractionError, ExtractionStatus, HealthCheckResponse,
    Phase, ReceiptResponse, ReceiptUpload,
};
use receipt_engine::{
    load_image_url, load_result, save_result, ControllerSettings, ExtractionClient,
    ExtractionController, FileStore, MemoryStore, SessionStore, IMAGE_URL_KEY, RESULT_KEY,
};
use tempfile::TempDir;
use tokio::sync::Notify;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(receipt_logging::initialize_for_tests);
}

/// Client answering from a script. The first `hang_calls` requests never complete.
#[derive(Default)]
struct ScriptedClient {
    outcomes: Mutex<VecDeque<Result<ReceiptResponse, ExtractionError>>>,
    calls: AtomicUsize,
    started: Notify,
    hang_calls: usize,
    delay: Option<Duration>,
}

impl ScriptedClient {
    fn answering(outcomes: Vec<Result<ReceiptResponse, ExtractionError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ExtractionClient for ScriptedClient {
    async fn extract(
        &self,
        _upload: &ReceiptUpload,
        _options: &ExtractOptions,
    ) -> Result<ReceiptResponse, ExtractionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if call < self.hang_calls {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExtractionError::network("no scripted outcome")))
    }

    async fn health(&self) -> Result<HealthCheckResponse, ExtractionError> {
        Err(ExtractionError::network("not scripted"))
    }

    fn image_url(&self, image_url: &str) -> String {
        format!("http://api.test{image_url}")
    }
}

fn settings() -> ControllerSettings {
    ControllerSettings {
        progress_tick: Duration::from_millis(5),
        ..ControllerSettings::default()
    }
}

fn upload() -> ReceiptUpload {
    ReceiptUpload::from_named_bytes("receipt.jpg", vec![0xFF, 0xD8, 0xFF])
}

fn success() -> ReceiptResponse {
    serde_json::from_str(
        r#"{
            "status": "success",
            "extraction_id": "ex-9",
            "vendor_name": "Hardware Depot",
            "currency": "USD",
            "receipt_items": [{"item_name": "Hammer", "item_cost": 19.99}],
            "total": 19.99,
            "image_url": "/uploads/ex-9.jpg"
        }"#,
    )
    .unwrap()
}

fn network_failure() -> Result<ReceiptResponse, ExtractionError> {
    Err(ExtractionError::network("connection refused"))
}

#[tokio::test]
async fn confirm_without_file_is_rejected() {
    init_logging();
    let controller =
        ExtractionController::new(ScriptedClient::default(), MemoryStore::new(), settings());

    assert_eq!(controller.confirm().await, Err(ControlError::NoFileSelected));
    assert_eq!(controller.client().calls(), 0);
}

#[tokio::test]
async fn success_is_stored_with_image_url() {
    init_logging();
    let controller = ExtractionController::new(
        ScriptedClient::answering(vec![Ok(success())]),
        MemoryStore::new(),
        settings(),
    );
    controller.select_file(upload());

    let stored = controller.confirm().await.unwrap();
    assert_eq!(stored, Some(success()));

    let view = controller.view();
    assert_eq!(view.phase, Phase::Success);
    assert_eq!(view.progress, 100);
    assert_eq!(load_result(controller.store()), Some(success()));
    assert_eq!(
        load_image_url(controller.store()).as_deref(),
        Some("http://api.test/uploads/ex-9.jpg")
    );
}

#[tokio::test]
async fn network_failure_becomes_failed_record() {
    init_logging();
    let controller = ExtractionController::new(
        ScriptedClient::answering(vec![network_failure()]),
        MemoryStore::new(),
        settings(),
    );
    controller.select_file(upload());

    let stored = controller.confirm().await.unwrap().expect("failed record");
    assert_eq!(stored.status, ExtractionStatus::Failed);
    let error = stored.error.as_ref().expect("error body");
    assert_eq!(error.code, codes::NETWORK_ERROR);
    assert!(!error.message.is_empty());

    let view = controller.view();
    assert_eq!(view.phase, Phase::Failed);
    assert_eq!(view.error_message.as_deref(), Some(error.message.as_str()));
    assert_eq!(load_result(controller.store()), Some(stored.clone()));
    assert_eq!(load_image_url(controller.store()), None);
}

#[tokio::test]
async fn retries_are_bounded() {
    init_logging();
    let outcomes = (0..5).map(|_| network_failure()).collect();
    let controller = ExtractionController::new(
        ScriptedClient::answering(outcomes),
        MemoryStore::new(),
        settings(),
    );
    controller.select_file(upload());
    controller.confirm().await.unwrap();

    for expected in 1..=3 {
        controller.retry().await.unwrap();
        assert_eq!(controller.state().retry_count(), expected);
    }
    assert_eq!(
        controller.retry().await,
        Err(ControlError::RetryLimitExceeded { max: 3 })
    );
    assert_eq!(controller.client().calls(), 4);
    assert_eq!(controller.view().phase, Phase::Failed);
    assert!(!controller.view().can_retry);
}

#[tokio::test]
async fn successful_retry_resets_the_counter() {
    init_logging();
    let controller = ExtractionController::new(
        ScriptedClient::answering(vec![network_failure(), Ok(success())]),
        MemoryStore::new(),
        settings(),
    );
    controller.select_file(upload());
    controller.confirm().await.unwrap();
    assert_eq!(controller.view().phase, Phase::Failed);

    let stored = controller.retry().await.unwrap();
    assert_eq!(stored, Some(success()));
    assert_eq!(controller.state().retry_count(), 0);
}

#[tokio::test]
async fn cancel_aborts_in_flight_request() {
    init_logging();
    let client = ScriptedClient {
        hang_calls: 1,
        ..ScriptedClient::default()
    };
    let controller = ExtractionController::new(client, MemoryStore::new(), settings());
    controller.select_file(upload());

    let (outcome, ()) = tokio::join!(controller.confirm(), async {
        controller.client().started.notified().await;
        assert!(controller.view().phase.is_processing());
        controller.cancel();
    });

    assert_eq!(outcome, Ok(None));
    let state = controller.state();
    assert_eq!(state.phase(), Phase::Idle);
    assert!(state.file().is_none());
    assert!(state.result().is_none());
    assert_eq!(controller.store().get(RESULT_KEY).unwrap(), None);
}

#[tokio::test]
async fn new_confirm_supersedes_in_flight_attempt() {
    init_logging();
    let client = ScriptedClient {
        outcomes: Mutex::new(vec![Ok(success())].into()),
        hang_calls: 1,
        ..ScriptedClient::default()
    };
    let controller = ExtractionController::new(client, MemoryStore::new(), settings());
    controller.select_file(upload());

    let (first, second) = tokio::join!(controller.confirm(), async {
        controller.client().started.notified().await;
        controller.confirm().await
    });

    assert_eq!(first, Ok(None));
    assert_eq!(second, Ok(Some(success())));
    assert_eq!(controller.view().phase, Phase::Success);
    assert_eq!(controller.client().calls(), 2);
}

#[tokio::test]
async fn progress_advances_monotonically_below_finalizing() {
    init_logging();
    let client = ScriptedClient {
        outcomes: Mutex::new(vec![Ok(success())].into()),
        delay: Some(Duration::from_millis(300)),
        ..ScriptedClient::default()
    };
    let controller = ExtractionController::new(client, MemoryStore::new(), settings());
    controller.select_file(upload());

    let (outcome, samples) = tokio::join!(controller.confirm(), async {
        controller.client().started.notified().await;
        let mut samples = Vec::new();
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            samples.push(controller.view().progress);
        }
        samples
    });

    assert!(outcome.unwrap().is_some());
    assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(samples.iter().all(|&progress| progress < 90));
    assert!(samples.last().copied().unwrap_or_default() > 0);
}

#[tokio::test]
async fn selecting_a_file_clears_previous_result() {
    init_logging();
    let controller = ExtractionController::new(
        ScriptedClient::answering(vec![network_failure(), network_failure()]),
        MemoryStore::new(),
        settings(),
    );
    controller.select_file(upload());
    controller.confirm().await.unwrap();
    controller.retry().await.unwrap();
    assert_eq!(controller.state().retry_count(), 1);
    assert!(controller.store().get(RESULT_KEY).unwrap().is_some());

    controller.select_file(ReceiptUpload::from_named_bytes("other.png", vec![1, 2]));

    let state = controller.state();
    assert_eq!(state.phase(), Phase::Selected);
    assert!(state.result().is_none());
    assert_eq!(state.retry_count(), 0);
    assert_eq!(controller.store().get(RESULT_KEY).unwrap(), None);
    assert_eq!(controller.store().get(IMAGE_URL_KEY).unwrap(), None);
}

#[tokio::test]
async fn result_survives_a_restart() {
    init_logging();
    let temp = TempDir::new().unwrap();

    let first = ExtractionController::new(
        ScriptedClient::answering(vec![Ok(success())]),
        FileStore::new(temp.path()),
        settings(),
    );
    first.select_file(upload());
    first.confirm().await.unwrap();
    drop(first);

    let second = ExtractionController::new(
        ScriptedClient::default(),
        FileStore::new(temp.path()),
        settings(),
    );
    assert_eq!(second.restore(), Some(success()));
    assert_eq!(second.view().phase, Phase::Success);
    assert_eq!(second.client().calls(), 0);
}

#[tokio::test]
async fn restore_without_persisted_result_stays_idle() {
    init_logging();
    let controller =
        ExtractionController::new(ScriptedClient::default(), MemoryStore::new(), settings());

    assert_eq!(controller.restore(), None);
    assert_eq!(controller.view().phase, Phase::Idle);
}

#[tokio::test]
async fn confirm_cannot_bypass_the_retry_limit() {
    init_logging();
    let outcomes = (0..5).map(|_| network_failure()).collect();
    let controller = ExtractionController::new(
        ScriptedClient::answering(outcomes),
        MemoryStore::new(),
        settings(),
    );
    controller.select_file(upload());
    controller.confirm().await.unwrap();
    for _ in 0..3 {
        controller.retry().await.unwrap();
    }

    assert_eq!(
        controller.confirm().await,
        Err(ControlError::RetryLimitExceeded { max: 3 })
    );
    assert_eq!(controller.client().calls(), 4);
    assert_eq!(controller.view().phase, Phase::Failed);
}

#[tokio::test]
async fn restore_is_refused_while_a_file_is_staged() {
    init_logging();
    let controller =
        ExtractionController::new(ScriptedClient::default(), MemoryStore::new(), settings());
    controller.select_file(upload());
    // Written after selection, which clears the store.
    save_result(controller.store(), &success(), None).unwrap();

    assert_eq!(controller.restore(), None);
    let state = controller.state();
    assert_eq!(state.phase(), Phase::Selected);
    assert!(state.result().is_none());
}
