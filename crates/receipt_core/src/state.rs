use crate::view_model::{AppViewModel, StepStatus, StepView};
use crate::{
    codes, format_file_size, ControlError, ErrorBody, ErrorCategory, ExtractionError,
    ExtractionStatus, ReceiptResponse, ReceiptUpload, Stage,
};

pub type AttemptId = u64;

/// Default bound on explicit retries per selected file.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Selected,
    Processing {
        stage: Stage,
        progress: u8,
    },
    Success,
    Partial,
    Failed,
}

impl Phase {
    pub fn is_processing(self) -> bool {
        matches!(self, Phase::Processing { .. })
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Success | Phase::Partial | Phase::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Confirm,
    Retry,
}

/// A freshly started attempt and the one it replaced, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptStart {
    pub attempt: AttemptId,
    pub upload: ReceiptUpload,
    pub superseded: Option<AttemptId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    phase: Phase,
    file: Option<ReceiptUpload>,
    result: Option<ReceiptResponse>,
    retry_count: u32,
    max_retries: u32,
    last_attempt: AttemptId,
    active_attempt: Option<AttemptId>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::with_max_retries(MAX_RETRIES)
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            phase: Phase::Idle,
            file: None,
            result: None,
            retry_count: 0,
            max_retries,
            last_attempt: 0,
            active_attempt: None,
            dirty: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn file(&self) -> Option<&ReceiptUpload> {
        self.file.as_ref()
    }

    pub fn result(&self) -> Option<&ReceiptResponse> {
        self.result.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn active_attempt(&self) -> Option<AttemptId> {
        self.active_attempt
    }

    pub fn progress(&self) -> u8 {
        match self.phase {
            Phase::Processing { progress, .. } => progress,
            phase if phase.is_terminal() => 100,
            _ => 0,
        }
    }

    pub fn view(&self) -> AppViewModel {
        let stage = match self.phase {
            Phase::Processing { stage, .. } => Some(stage),
            _ => None,
        };
        let steps: Vec<StepView> = stage
            .map(|current| {
                Stage::ALL
                    .iter()
                    .map(|&step| StepView {
                        stage: step,
                        label: step.label(),
                        status: if step < current {
                            StepStatus::Completed
                        } else if step == current {
                            StepStatus::Active
                        } else {
                            StepStatus::Pending
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();
        let error_message = self
            .result
            .as_ref()
            .and_then(|result| result.error.as_ref())
            .map(|error| error.message.clone());

        AppViewModel {
            phase: self.phase,
            stage,
            progress: self.progress(),
            status_message: stage.map(Stage::status_message),
            steps,
            file_name: self.file.as_ref().map(|file| file.name().to_string()),
            file_size: self.file.as_ref().map(|file| format_file_size(file.size())),
            retry_count: self.retry_count,
            retries_remaining: self.max_retries.saturating_sub(self.retry_count),
            can_retry: self.file.is_some() && self.retry_count < self.max_retries,
            result: self.result.clone(),
            error_message,
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Stages `upload`, dropping any previous result. Returns the attempt it aborted.
    pub(crate) fn select_file(&mut self, upload: ReceiptUpload) -> Option<AttemptId> {
        let aborted = self.active_attempt.take();
        self.file = Some(upload);
        self.result = None;
        self.retry_count = 0;
        self.phase = Phase::Selected;
        self.mark_dirty();
        aborted
    }

    pub(crate) fn begin_attempt(&mut self, kind: AttemptKind) -> Result<AttemptStart, ControlError> {
        let upload = self.file.clone().ok_or(ControlError::NoFileSelected)?;
        // Re-running a finished file counts against the retry budget.
        if kind == AttemptKind::Retry || self.phase.is_terminal() {
            if self.retry_count >= self.max_retries {
                return Err(ControlError::RetryLimitExceeded {
                    max: self.max_retries,
                });
            }
            self.retry_count += 1;
        }

        self.last_attempt += 1;
        let attempt = self.last_attempt;
        let superseded = self.active_attempt.replace(attempt);
        self.result = None;
        self.phase = Phase::Processing {
            stage: Stage::Uploading,
            progress: 0,
        };
        self.mark_dirty();
        Ok(AttemptStart {
            attempt,
            upload,
            superseded,
        })
    }

    /// Moves the progress bar forward. Stale attempts and regressions are ignored.
    pub(crate) fn apply_progress(&mut self, attempt: AttemptId, progress: u8) -> bool {
        if self.active_attempt != Some(attempt) {
            return false;
        }
        let Phase::Processing {
            progress: current, ..
        } = self.phase
        else {
            return false;
        };
        let progress = progress.min(100);
        if progress <= current {
            return false;
        }
        self.phase = Phase::Processing {
            stage: Stage::for_progress(progress),
            progress,
        };
        self.mark_dirty();
        true
    }

    /// Records the end of `attempt`. Returns the result to persist, if any.
    pub(crate) fn apply_outcome(
        &mut self,
        attempt: AttemptId,
        outcome: Result<ReceiptResponse, ExtractionError>,
    ) -> Option<ReceiptResponse> {
        if self.active_attempt != Some(attempt) {
            return None;
        }
        self.active_attempt = None;

        let response = match outcome {
            Ok(response) => ensure_error_record(response),
            Err(err) if err.category() == ErrorCategory::Aborted => {
                self.phase = Phase::Selected;
                self.mark_dirty();
                return None;
            }
            Err(err) => err.to_failed_response(),
        };

        self.phase = match response.status {
            ExtractionStatus::Success => Phase::Success,
            ExtractionStatus::Partial => Phase::Partial,
            ExtractionStatus::Failed => Phase::Failed,
        };
        if !response.is_failed() {
            self.retry_count = 0;
        }
        self.result = Some(response.clone());
        self.mark_dirty();
        Some(response)
    }

    /// Clears everything. Returns the attempt it aborted.
    pub(crate) fn reset(&mut self) -> Option<AttemptId> {
        let aborted = self.active_attempt.take();
        self.file = None;
        self.result = None;
        self.retry_count = 0;
        self.phase = Phase::Idle;
        self.mark_dirty();
        aborted
    }

    /// Shows a previously persisted result. Only applies to an idle controller.
    pub(crate) fn restore(&mut self, response: ReceiptResponse) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        let response = ensure_error_record(response);
        self.phase = match response.status {
            ExtractionStatus::Success => Phase::Success,
            ExtractionStatus::Partial => Phase::Partial,
            ExtractionStatus::Failed => Phase::Failed,
        };
        self.result = Some(response);
        self.mark_dirty();
        true
    }
}

/// A `failed` response always carries a code and a displayable message.
fn ensure_error_record(mut response: ReceiptResponse) -> ReceiptResponse {
    if !response.is_failed() {
        return response;
    }
    let mut error = response.error.take().unwrap_or_else(|| ErrorBody {
        code: codes::UNKNOWN_ERROR.to_string(),
        message: String::new(),
        details: None,
    });
    if error.code.trim().is_empty() {
        error.code = codes::UNKNOWN_ERROR.to_string();
    }
    if error.message.trim().is_empty() {
        error.message = ExtractionError::new(error.code.clone(), "").user_message();
    }
    response.error = Some(error);
    response
}
