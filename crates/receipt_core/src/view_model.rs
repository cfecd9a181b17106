use crate::{Phase, ReceiptResponse, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub stage: Stage,
    pub label: &'static str,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub phase: Phase,
    pub stage: Option<Stage>,
    pub progress: u8,
    pub status_message: Option<&'static str>,
    /// Empty unless an attempt is in progress.
    pub steps: Vec<StepView>,
    pub file_name: Option<String>,
    pub file_size: Option<String>,
    pub retry_count: u32,
    pub retries_remaining: u32,
    pub can_retry: bool,
    pub result: Option<ReceiptResponse>,
    pub error_message: Option<String>,
    pub dirty: bool,
}
