//! Receipt core: pure extraction state machine, wire types and view-model helpers.
mod effect;
mod error;
mod msg;
mod receipt;
mod stage;
mod state;
mod update;
mod upload;
mod view_model;

pub use effect::Effect;
pub use error::{codes, ControlError, ErrorCategory, ExtractionError};
pub use msg::Msg;
pub use receipt::{
    AdditionalTax, ConfidenceLevel, ErrorBody, ExtractOptions, ExtractionMetadata,
    ExtractionStatus, HealthCheckResponse, HealthStatus, ReceiptItem, ReceiptResponse,
    ReceiptValidation, SupportedCurrency, TaxDetails, HIGH_CONFIDENCE_THRESHOLD,
    MEDIUM_CONFIDENCE_THRESHOLD,
};
pub use stage::{animate_progress, Stage, ANIMATION_CEILING};
pub use state::{AppState, AttemptId, AttemptKind, AttemptStart, Phase, MAX_RETRIES};
pub use update::update;
pub use upload::{
    file_extension, format_file_size, guess_mime_type, validate_upload, ReceiptUpload,
    ValidationError, ACCEPTED_FILE_TYPES, MAX_FILE_SIZE,
};
pub use view_model::{AppViewModel, StepStatus, StepView};
