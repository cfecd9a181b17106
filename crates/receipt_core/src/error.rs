use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::ReceiptResponse;

/// Error codes produced locally or commonly returned by the API.
pub mod codes {
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const REQUEST_ABORTED: &str = "REQUEST_ABORTED";
    pub const REQUEST_ERROR: &str = "REQUEST_ERROR";
    pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";
    pub const RESPONSE_TOO_LARGE: &str = "RESPONSE_TOO_LARGE";
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_FILE_TYPE: &str = "INVALID_FILE_TYPE";
    pub const FILE_TOO_LARGE: &str = "FILE_TOO_LARGE";
    pub const NOT_A_RECEIPT: &str = "NOT_A_RECEIPT";
    pub const NO_ITEMS_FOUND: &str = "NO_ITEMS_FOUND";
    pub const AI_SERVICE_UNAVAILABLE: &str = "AI_SERVICE_UNAVAILABLE";
    pub const EXTRACTION_FAILED: &str = "EXTRACTION_FAILED";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    /// Request was cancelled; never shown to the user.
    Aborted,
    Validation,
    Extraction,
    RateLimit,
    Server,
    Unknown,
}

impl ErrorCategory {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::RateLimit
                | ErrorCategory::Server
                | ErrorCategory::Unknown
        )
    }
}

/// Failure of a single call to the extraction API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionError {
    pub code: String,
    pub message: String,
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
}

impl ExtractionError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(codes::NETWORK_ERROR, message)
    }

    pub fn aborted() -> Self {
        Self::new(codes::REQUEST_ABORTED, "request aborted")
    }

    /// Normalizes a non-success HTTP response.
    ///
    /// The backend answers with either `{ error_code, message, details }`,
    /// `{ code, message }` or a `failed` receipt carrying `error`. Anything
    /// else falls back to a code derived from the status.
    pub fn from_http(status: u16, body: &[u8]) -> Self {
        let payload: Option<ErrorPayload> = serde_json::from_slice(body).ok();
        let (code, message) = match payload {
            Some(ErrorPayload {
                error: Some(nested),
                ..
            }) => (Some(nested.code), Some(nested.message)),
            Some(payload) => (payload.error_code.or(payload.code), payload.message),
            None => (None, None),
        };

        let code = code
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| fallback_code(status).to_string());
        let message = message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("request failed with status {status}"));

        Self::new(code, message).with_status(status)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code.as_str() {
            codes::REQUEST_ABORTED => ErrorCategory::Aborted,
            codes::NETWORK_ERROR | codes::TIMEOUT => ErrorCategory::Network,
            codes::RATE_LIMIT_EXCEEDED => ErrorCategory::RateLimit,
            codes::VALIDATION_ERROR | codes::INVALID_FILE_TYPE | codes::FILE_TOO_LARGE => {
                ErrorCategory::Validation
            }
            codes::NOT_A_RECEIPT
            | codes::NO_ITEMS_FOUND
            | codes::AI_SERVICE_UNAVAILABLE
            | codes::EXTRACTION_FAILED => ErrorCategory::Extraction,
            codes::SERVER_ERROR => ErrorCategory::Server,
            _ => match self.status {
                Some(429) => ErrorCategory::RateLimit,
                Some(400 | 413 | 415 | 422) => ErrorCategory::Validation,
                Some(status) if status >= 500 => ErrorCategory::Server,
                _ => ErrorCategory::Unknown,
            },
        }
    }

    /// Human-readable message for display. Never empty.
    pub fn user_message(&self) -> String {
        let server_message = Some(self.message.trim()).filter(|m| !m.is_empty());
        match self.category() {
            ErrorCategory::Network => {
                if self.code == codes::TIMEOUT {
                    "The server took too long to respond. Please try again.".to_string()
                } else {
                    "Unable to connect to the server. Please check your connection.".to_string()
                }
            }
            ErrorCategory::Aborted => "The request was cancelled.".to_string(),
            ErrorCategory::Validation => server_message
                .map(str::to_string)
                .unwrap_or_else(|| {
                    "The file was rejected. Please upload a JPEG, PNG, or WebP image under 10 MB."
                        .to_string()
                }),
            ErrorCategory::Extraction => server_message
                .map(str::to_string)
                .unwrap_or_else(|| extraction_default(&self.code).to_string()),
            ErrorCategory::RateLimit => {
                "Too many requests. Please wait a moment before trying again.".to_string()
            }
            ErrorCategory::Server => {
                "The server encountered an error while processing the receipt. Please try again later."
                    .to_string()
            }
            ErrorCategory::Unknown => server_message
                .map(|m| format!("An unexpected error occurred: {m}"))
                .unwrap_or_else(|| "An unexpected error occurred. Please try again.".to_string()),
        }
    }

    /// Failed-result record stored by the controller.
    pub fn to_failed_response(&self) -> ReceiptResponse {
        ReceiptResponse::failed(self.code.clone(), self.user_message())
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (http {status}): {}", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ExtractionError {}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error_code: Option<String>,
    code: Option<String>,
    message: Option<String>,
    #[allow(dead_code)]
    details: Option<Value>,
    error: Option<NestedError>,
}

#[derive(Debug, Deserialize)]
struct NestedError {
    code: String,
    message: String,
}

fn fallback_code(status: u16) -> &'static str {
    match status {
        429 => codes::RATE_LIMIT_EXCEEDED,
        400 | 413 | 415 | 422 => codes::VALIDATION_ERROR,
        s if s >= 500 => codes::SERVER_ERROR,
        _ => codes::UNKNOWN_ERROR,
    }
}

fn extraction_default(code: &str) -> &'static str {
    match code {
        codes::NOT_A_RECEIPT => {
            "The image does not appear to be a receipt. Please upload a clear photo of a receipt."
        }
        codes::NO_ITEMS_FOUND => "No items could be read from this receipt. Try a sharper image.",
        codes::AI_SERVICE_UNAVAILABLE => {
            "The extraction service is temporarily unavailable. Please try again shortly."
        }
        _ => "The receipt could not be extracted.",
    }
}

/// Rejected controller commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("no file selected")]
    NoFileSelected,
    #[error("retry limit of {max} exceeded")]
    RetryLimitExceeded { max: u32 },
    #[error("a stored result can only be restored into an idle session")]
    NotIdle,
}
