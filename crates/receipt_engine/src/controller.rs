//! Async executor for the pure extraction state machine.
//!
//! The controller owns one [`AppState`], feeds it messages through
//! [`receipt_core::update`] and performs the resulting effects: issuing the
//! extraction request, aborting superseded attempts, and keeping the session
//! store in sync. State is only locked between suspension points, so
//! [`ExtractionController::cancel`] may be called while
//! [`ExtractionController::confirm`] is waiting on the network.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use receipt_core::{
    animate_progress, update, AppState, AppViewModel, AttemptId, ControlError, Effect,
    ErrorCategory, ExtractOptions, ExtractionError, Msg, ReceiptResponse, ReceiptUpload, Stage,
    MAX_RETRIES,
};
use receipt_logging::{receipt_debug, receipt_info, receipt_warn};
use tokio_util::sync::CancellationToken;

use crate::client::ExtractionClient;
use crate::persist::{clear_persisted, load_result, save_result};
use crate::store::SessionStore;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Interval between progress animation steps while the request is in flight.
    pub progress_tick: Duration,
    pub progress_step: u8,
    pub max_retries: u32,
    pub extract_options: ExtractOptions,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            progress_tick: Duration::from_millis(150),
            progress_step: 3,
            max_retries: MAX_RETRIES,
            extract_options: ExtractOptions::default(),
        }
    }
}

struct InFlight {
    attempt: AttemptId,
    token: CancellationToken,
}

struct Submission {
    attempt: AttemptId,
    upload: ReceiptUpload,
    token: CancellationToken,
}

pub struct ExtractionController<C, S> {
    client: C,
    store: S,
    settings: ControllerSettings,
    state: Mutex<AppState>,
    in_flight: Mutex<Option<InFlight>>,
}

impl<C, S> ExtractionController<C, S>
where
    C: ExtractionClient,
    S: SessionStore,
{
    pub fn new(client: C, store: S, settings: ControllerSettings) -> Self {
        let state = AppState::with_max_retries(settings.max_retries);
        Self {
            client,
            store,
            settings,
            state: Mutex::new(state),
            in_flight: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn view(&self) -> AppViewModel {
        self.lock_state().view()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AppState {
        self.lock_state().clone()
    }

    /// Loads the result persisted by an earlier session, if any.
    ///
    /// Returns `None` when nothing is stored or the controller is not idle.
    pub fn restore(&self) -> Option<ReceiptResponse> {
        let result = load_result(&self.store)?;
        let effects = self.dispatch(Msg::ResultRestored(result));
        if let Err(err) = self.run_effects(effects) {
            receipt_debug!("Restore skipped: {}", err);
            return None;
        }
        self.lock_state().result().cloned()
    }

    pub fn select_file(&self, upload: ReceiptUpload) {
        receipt_info!(
            "Selected file name={} bytes={} type={}",
            upload.name(),
            upload.size(),
            upload.mime_type()
        );
        let effects = self.dispatch(Msg::FileSelected(upload));
        if let Err(err) = self.run_effects(effects) {
            receipt_warn!("Unexpected rejection while selecting file: {}", err);
        }
    }

    /// Extracts the staged file.
    ///
    /// Returns the stored result (a `failed` record on classified errors), or
    /// `None` when the attempt was cancelled or superseded.
    pub async fn confirm(&self) -> Result<Option<ReceiptResponse>, ControlError> {
        self.start(Msg::ConfirmClicked).await
    }

    /// Repeats the extraction of the staged file, bounded by `max_retries`.
    pub async fn retry(&self) -> Result<Option<ReceiptResponse>, ControlError> {
        self.start(Msg::RetryClicked).await
    }

    /// Aborts any in-flight request and clears all state.
    pub fn cancel(&self) {
        receipt_info!("Cancel requested");
        let effects = self.dispatch(Msg::CancelClicked);
        if let Err(err) = self.run_effects(effects) {
            receipt_warn!("Unexpected rejection while cancelling: {}", err);
        }
    }

    async fn start(&self, msg: Msg) -> Result<Option<ReceiptResponse>, ControlError> {
        let effects = self.dispatch(msg);
        match self.run_effects(effects)? {
            Some(submission) => Ok(self.run_attempt(submission).await),
            None => Ok(None),
        }
    }

    async fn run_attempt(&self, submission: Submission) -> Option<ReceiptResponse> {
        let Submission {
            attempt,
            upload,
            token,
        } = submission;
        receipt_info!("Attempt {} started for {}", attempt, upload.name());

        let request = self
            .client
            .extract(&upload, &self.settings.extract_options);
        tokio::pin!(request);

        let mut ticker = tokio::time::interval(self.settings.progress_tick);
        let mut progress = 0u8;
        let outcome = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    receipt_debug!("Attempt {} aborted", attempt);
                    break Err(ExtractionError::aborted());
                }
                outcome = &mut request => break outcome,
                _ = ticker.tick() => {
                    progress = animate_progress(progress, self.settings.progress_step);
                    self.dispatch(Msg::ProgressTick { attempt, progress });
                }
            }
        };

        match &outcome {
            Ok(_) => {
                let (finalizing, _) = Stage::Finalizing.progress_range();
                self.dispatch(Msg::ProgressTick {
                    attempt,
                    progress: finalizing,
                });
            }
            Err(err) if err.category() != ErrorCategory::Aborted => {
                receipt_info!("Attempt {} failed: {}", attempt, err);
            }
            Err(_) => {}
        }

        let effects = self.dispatch(Msg::ExtractionFinished { attempt, outcome });
        self.release(attempt);
        let stored = effects.iter().find_map(|effect| match effect {
            Effect::PersistResult(result) => Some(result.clone()),
            _ => None,
        });
        if let Err(err) = self.run_effects(effects) {
            receipt_warn!("Unexpected rejection after attempt {}: {}", attempt, err);
        }
        if stored.is_none() {
            receipt_debug!("Attempt {} ended without a result", attempt);
        }
        stored
    }

    fn dispatch(&self, msg: Msg) -> Vec<Effect> {
        let mut guard = self.lock_state();
        let state = std::mem::take(&mut *guard);
        let (state, effects) = update(state, msg);
        *guard = state;
        effects
    }

    /// Performs effects synchronously. A submission is handed back to the
    /// caller, which drives the request.
    fn run_effects(&self, effects: Vec<Effect>) -> Result<Option<Submission>, ControlError> {
        let mut submission = None;
        for effect in effects {
            match effect {
                Effect::SubmitExtraction { attempt, upload } => {
                    let token = CancellationToken::new();
                    let previous = self.lock_in_flight().replace(InFlight {
                        attempt,
                        token: token.clone(),
                    });
                    if let Some(previous) = previous {
                        previous.token.cancel();
                    }
                    submission = Some(Submission {
                        attempt,
                        upload,
                        token,
                    });
                }
                Effect::AbortExtraction { attempt } => {
                    let mut in_flight = self.lock_in_flight();
                    if in_flight.as_ref().map(|f| f.attempt) == Some(attempt) {
                        if let Some(current) = in_flight.take() {
                            current.token.cancel();
                        }
                    }
                }
                Effect::PersistResult(result) => {
                    let image_url = result
                        .image_url
                        .as_deref()
                        .map(|url| self.client.image_url(url));
                    if let Err(err) = save_result(&self.store, &result, image_url.as_deref()) {
                        receipt_warn!("Failed to persist result: {}", err);
                    }
                }
                Effect::ClearPersisted => {
                    if let Err(err) = clear_persisted(&self.store) {
                        receipt_warn!("Failed to clear persisted result: {}", err);
                    }
                }
                Effect::CommandRejected(err) => {
                    receipt_info!("Command rejected: {}", err);
                    return Err(err);
                }
            }
        }
        Ok(submission)
    }

    fn release(&self, attempt: AttemptId) {
        let mut in_flight = self.lock_in_flight();
        if in_flight.as_ref().map(|f| f.attempt) == Some(attempt) {
            in_flight.take();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
