#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked a new receipt image.
    FileSelected(crate::ReceiptUpload),
    /// User confirmed the staged file for extraction.
    ConfirmClicked,
    /// User asked to repeat the extraction for the staged file.
    RetryClicked,
    /// User cancelled or started over.
    CancelClicked,
    /// Restore a result persisted by an earlier session.
    ResultRestored(crate::ReceiptResponse),
    /// Progress animation for an attempt.
    ProgressTick {
        attempt: crate::AttemptId,
        progress: u8,
    },
    /// Extraction client finished an attempt.
    ExtractionFinished {
        attempt: crate::AttemptId,
        outcome: Result<crate::ReceiptResponse, crate::ExtractionError>,
    },
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
