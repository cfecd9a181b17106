#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start a request for `upload`; completion comes back as `Msg::ExtractionFinished`.
    SubmitExtraction {
        attempt: crate::AttemptId,
        upload: crate::ReceiptUpload,
    },
    /// Cancel the in-flight request of `attempt`. Must not surface an error.
    AbortExtraction { attempt: crate::AttemptId },
    PersistResult(crate::ReceiptResponse),
    ClearPersisted,
    /// The command was refused; state is unchanged.
    CommandRejected(crate::ControlError),
}
