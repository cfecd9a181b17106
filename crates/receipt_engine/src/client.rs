use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use receipt_core::{
    codes, ExtractOptions, ExtractionError, HealthCheckResponse, ReceiptResponse, ReceiptUpload,
    ReceiptValidation, SupportedCurrency,
};
use receipt_logging::{receipt_debug, receipt_info};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use url::Url;

pub const EXTRACT_PATH: &str = "/extract-receipt-details";
pub const HEALTH_PATH: &str = "/extract-receipt-details/health";
pub const CURRENCIES_PATH: &str = "/extract-receipt-details/currencies";
pub const VALIDATE_PATH: &str = "/extract-receipt-details/validate";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "RECEIPT_API_BASE_URL";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Receipt processing is slow; this covers upload plus server-side extraction.
    pub request_timeout: Duration,
    pub max_response_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_response_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ClientSettings {
    /// Defaults, with the base URL read from [`BASE_URL_ENV`] when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                settings.base_url = base_url.trim().to_string();
            }
        }
        settings
    }
}

/// Submits receipts to the extraction API.
#[async_trait::async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(
        &self,
        upload: &ReceiptUpload,
        options: &ExtractOptions,
    ) -> Result<ReceiptResponse, ExtractionError>;

    async fn health(&self) -> Result<HealthCheckResponse, ExtractionError>;

    /// Absolute URL for an image path returned by the API.
    fn image_url(&self, image_url: &str) -> String {
        image_url.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestExtractionClient {
    settings: ClientSettings,
    base: Url,
    client: reqwest::Client,
}

impl ReqwestExtractionClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ExtractionError> {
        let base = Url::parse(&settings.base_url).map_err(|err| {
            ExtractionError::new(
                codes::REQUEST_ERROR,
                format!("invalid base url {:?}: {err}", settings.base_url),
            )
        })?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ExtractionError::new(codes::REQUEST_ERROR, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        join_base(self.base.as_str(), path)
    }

    /// Downloads an image referenced by a result's `image_url`.
    pub async fn fetch_image(&self, image_url: &str) -> Result<Bytes, ExtractionError> {
        let url = self.image_url(image_url);
        receipt_debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = read_limited(response, self.settings.max_response_bytes).await?;
        if !status.is_success() {
            return Err(ExtractionError::from_http(status.as_u16(), &body));
        }
        Ok(body)
    }

    /// Currencies the extraction service recognizes.
    pub async fn currencies(&self) -> Result<Vec<SupportedCurrency>, ExtractionError> {
        let url = self.endpoint(CURRENCIES_PATH);
        receipt_debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_json(response).await
    }

    /// Asks the server to check a (possibly hand-edited) result.
    pub async fn validate(
        &self,
        receipt: &ReceiptResponse,
    ) -> Result<ReceiptValidation, ExtractionError> {
        let url = self.endpoint(VALIDATE_PATH);
        receipt_debug!("POST {} extraction_id={}", url, receipt.extraction_id);
        let response = self
            .client
            .post(&url)
            .json(receipt)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ExtractionError> {
        let status = response.status();
        let body = read_limited(response, self.settings.max_response_bytes).await?;
        if !status.is_success() {
            let err = ExtractionError::from_http(status.as_u16(), &body);
            receipt_info!("API error: {}", err);
            return Err(err);
        }
        serde_json::from_slice(&body).map_err(|err| {
            ExtractionError::new(codes::INVALID_RESPONSE, err.to_string())
                .with_status(status.as_u16())
        })
    }
}

#[async_trait::async_trait]
impl ExtractionClient for ReqwestExtractionClient {
    async fn extract(
        &self,
        upload: &ReceiptUpload,
        options: &ExtractOptions,
    ) -> Result<ReceiptResponse, ExtractionError> {
        let part = Part::bytes(upload.bytes().to_vec())
            .file_name(upload.name().to_string())
            .mime_str(upload.mime_type())
            .map_err(|err| ExtractionError::new(codes::REQUEST_ERROR, err.to_string()))?;

        let mut form = Form::new().part("file", part);
        if let Some(custom_id) = &options.custom_id {
            form = form.text("customId", custom_id.clone());
        }
        if let Some(save_image) = options.save_image {
            form = form.text("saveImage", save_image.to_string());
        }
        if let Some(include_metadata) = options.include_metadata {
            form = form.text("includeMetadata", include_metadata.to_string());
        }
        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }

        let url = self.endpoint(EXTRACT_PATH);
        receipt_debug!(
            "POST {} file={} bytes={} type={}",
            url,
            upload.name(),
            upload.size(),
            upload.mime_type()
        );
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        receipt_debug!("API response status {}", response.status());
        self.read_json(response).await
    }

    async fn health(&self) -> Result<HealthCheckResponse, ExtractionError> {
        let url = self.endpoint(HEALTH_PATH);
        receipt_debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_json(response).await
    }

    fn image_url(&self, image_url: &str) -> String {
        if image_url.starts_with("http") {
            image_url.to_string()
        } else {
            join_base(self.base.as_str(), image_url)
        }
    }
}

fn join_base(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

async fn read_limited(response: reqwest::Response, max_bytes: u64) -> Result<Bytes, ExtractionError> {
    if let Some(content_len) = response.content_length() {
        if content_len > max_bytes {
            return Err(too_large(max_bytes, content_len));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let next_len = bytes.len() as u64 + chunk.len() as u64;
        if next_len > max_bytes {
            return Err(too_large(max_bytes, next_len));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(bytes))
}

fn too_large(max_bytes: u64, actual: u64) -> ExtractionError {
    ExtractionError::new(
        codes::RESPONSE_TOO_LARGE,
        format!("response too large (max {max_bytes}, actual {actual})"),
    )
}

fn map_reqwest_error(err: reqwest::Error) -> ExtractionError {
    if err.is_timeout() {
        return ExtractionError::new(codes::TIMEOUT, err.to_string());
    }
    if err.is_connect() || err.is_request() || err.is_body() {
        return ExtractionError::network(err.to_string());
    }
    if err.is_decode() {
        return ExtractionError::new(codes::INVALID_RESPONSE, err.to_string());
    }
    ExtractionError::new(codes::REQUEST_ERROR, err.to_string())
}
