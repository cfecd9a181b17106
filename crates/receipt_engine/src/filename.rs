use sha2::{Digest, Sha256};

/// Default export name: `receipt-{receipt_number|export}-{date}.{extension}`.
pub fn export_filename(receipt_number: Option<&str>, date: &str, extension: &str) -> String {
    let stem = receipt_number
        .map(sanitize_component)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "export".to_string());
    let date = sanitize_component(date);
    format!("receipt-{stem}-{date}.{extension}")
}

/// Stable on-disk name for a session key: `{sanitized}--{short_hash(key)}.session`.
pub fn store_filename(key: &str) -> String {
    let sanitized = sanitize_component(key);
    let sanitized = if sanitized.is_empty() {
        "key".to_string()
    } else {
        sanitized
    };
    format!("{sanitized}--{}.session", short_hash(key))
}

fn sanitize_component(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    if compacted.len() > 64 {
        let mut end = 64;
        while !compacted.is_char_boundary(end) {
            end -= 1;
        }
        compacted.truncate(end);
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '\0'..='\u{1F}'
    )
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
