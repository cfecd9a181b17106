use receipt_core::ReceiptResponse;
use receipt_logging::{receipt_error, receipt_info, receipt_warn};

use crate::store::{SessionStore, StoreError};

/// Key holding the last extraction result.
pub const RESULT_KEY: &str = "receipt_extraction_result";
/// Key holding the resolved URL of the server-side copy of the image.
pub const IMAGE_URL_KEY: &str = "receipt_image_url";

/// Loads the persisted result. Missing or unreadable data yields `None`.
pub fn load_result(store: &dyn SessionStore) -> Option<ReceiptResponse> {
    let content = match store.get(RESULT_KEY) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(err) => {
            receipt_warn!("Failed to read persisted result: {}", err);
            return None;
        }
    };

    match ron::from_str::<ReceiptResponse>(&content) {
        Ok(result) => {
            receipt_info!(
                "Loaded persisted result extraction_id={} status={:?}",
                result.extraction_id,
                result.status
            );
            Some(result)
        }
        Err(err) => {
            receipt_warn!("Discarding unparseable persisted result: {}", err);
            if let Err(err) = store.remove(RESULT_KEY) {
                receipt_warn!("Failed to remove corrupt persisted result: {}", err);
            }
            None
        }
    }
}

pub fn save_result(
    store: &dyn SessionStore,
    result: &ReceiptResponse,
    image_url: Option<&str>,
) -> Result<(), StoreError> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(result, pretty) {
        Ok(text) => text,
        Err(err) => {
            // Not a storage failure; keep the in-memory result and move on.
            receipt_error!("Failed to serialize result: {}", err);
            return Ok(());
        }
    };
    store.set(RESULT_KEY, &content)?;
    match image_url {
        Some(url) => store.set(IMAGE_URL_KEY, url)?,
        None => store.remove(IMAGE_URL_KEY)?,
    }
    Ok(())
}

pub fn load_image_url(store: &dyn SessionStore) -> Option<String> {
    match store.get(IMAGE_URL_KEY) {
        Ok(url) => url,
        Err(err) => {
            receipt_warn!("Failed to read persisted image url: {}", err);
            None
        }
    }
}

/// Removes both persisted keys.
pub fn clear_persisted(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.remove(RESULT_KEY)?;
    store.remove(IMAGE_URL_KEY)?;
    Ok(())
}
