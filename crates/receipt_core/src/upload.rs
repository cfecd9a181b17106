use bytes::Bytes;
use thiserror::Error;

/// Largest upload the API accepts.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Accepted MIME types with their file extensions.
pub const ACCEPTED_FILE_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &[".jpg", ".jpeg"]),
    ("image/png", &[".png"]),
    ("image/webp", &[".webp"]),
];

/// A receipt image staged for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptUpload {
    name: String,
    mime_type: String,
    bytes: Bytes,
}

impl ReceiptUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Builds an upload whose MIME type is guessed from the file extension.
    pub fn from_named_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = guess_mime_type(&name)
            .unwrap_or("application/octet-stream")
            .to_string();
        Self::new(name, mime_type, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File type \"{extension}\" is not supported. Please upload JPEG, PNG, or WebP images.")]
    UnsupportedType { extension: String },
    #[error("File size ({}) exceeds the maximum allowed size of {}.", size_label(.size), size_label(.max))]
    TooLarge { size: u64, max: u64 },
    #[error("The selected file is empty.")]
    Empty,
}

pub fn validate_upload(upload: &ReceiptUpload) -> Result<(), ValidationError> {
    let accepted = ACCEPTED_FILE_TYPES
        .iter()
        .any(|(mime, _)| mime.eq_ignore_ascii_case(upload.mime_type()));
    if !accepted {
        return Err(ValidationError::UnsupportedType {
            extension: file_extension(upload.name()),
        });
    }
    if upload.size() == 0 {
        return Err(ValidationError::Empty);
    }
    if upload.size() > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge {
            size: upload.size(),
            max: MAX_FILE_SIZE,
        });
    }
    Ok(())
}

fn size_label(bytes: &u64) -> String {
    format_file_size(*bytes)
}

/// Lowercased extension including the dot, or an empty string.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext.to_ascii_lowercase()),
        None => String::new(),
    }
}

pub fn guess_mime_type(name: &str) -> Option<&'static str> {
    let ext = file_extension(name);
    ACCEPTED_FILE_TYPES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(mime, _)| *mime)
}

/// Formats a byte count as `"1.5 KB"`, `"10 MB"`, `"0 Bytes"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    // "1.50" -> "1.5", "10.00" -> "10"
    let text = format!("{rounded:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(MAX_FILE_SIZE), "10 MB");
    }

    #[test]
    fn mime_is_guessed_from_extension() {
        assert_eq!(guess_mime_type("scan.JPG"), Some("image/jpeg"));
        assert_eq!(guess_mime_type("scan.webp"), Some("image/webp"));
        assert_eq!(guess_mime_type("scan.gif"), None);
        assert_eq!(guess_mime_type("noext"), None);
    }

    #[test]
    fn rejects_unsupported_type() {
        let upload = ReceiptUpload::from_named_bytes("receipt.gif", vec![1, 2, 3]);
        let err = validate_upload(&upload).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File type \".gif\" is not supported. Please upload JPEG, PNG, or WebP images."
        );
    }

    #[test]
    fn rejects_oversized_file() {
        let upload = ReceiptUpload::new(
            "big.png",
            "image/png",
            vec![0u8; (MAX_FILE_SIZE + 1024 * 1024) as usize],
        );
        let err = validate_upload(&upload).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File size (11 MB) exceeds the maximum allowed size of 10 MB."
        );
    }

    #[test]
    fn accepts_small_png() {
        let upload = ReceiptUpload::from_named_bytes("receipt.png", vec![1, 2, 3]);
        assert_eq!(upload.mime_type(), "image/png");
        assert!(validate_upload(&upload).is_ok());
    }
}
