//! Terminal output for results, progress and health checks.

use std::fmt::Write as _;

use receipt_core::{
    AppViewModel, ConfidenceLevel, ExtractionStatus, HealthCheckResponse, HealthStatus,
    ReceiptResponse, ReceiptValidation, StepStatus, SupportedCurrency,
};
use receipt_engine::format_amount;

const BAR_WIDTH: usize = 30;

/// One progress line, e.g. `[#####.....]  17% Uploading receipt...`.
pub fn progress_line(view: &AppViewModel) -> Option<String> {
    let message = view.status_message?;
    let filled = BAR_WIDTH * usize::from(view.progress.min(100)) / 100;
    let steps: String = view
        .steps
        .iter()
        .map(|step| match step.status {
            StepStatus::Completed => '+',
            StepStatus::Active => '>',
            StepStatus::Pending => '.',
        })
        .collect();
    Some(format!(
        "[{}{}] {:>3}% {} {}",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        view.progress,
        steps,
        message
    ))
}

pub fn render_result(result: &ReceiptResponse, image_url: Option<&str>) -> String {
    let mut out = String::new();
    if result.is_failed() {
        let (code, message) = result
            .error
            .as_ref()
            .map(|error| (error.code.as_str(), error.message.as_str()))
            .unwrap_or(("UNKNOWN_ERROR", "Extraction failed."));
        let _ = writeln!(out, "Extraction failed [{code}]: {message}");
        return out;
    }

    let currency = result.currency.as_deref();
    let heading = match result.status {
        ExtractionStatus::Partial => "Receipt extracted (partial)",
        _ => "Receipt extracted",
    };
    let _ = writeln!(out, "{heading}");
    if !result.extraction_id.is_empty() {
        let _ = writeln!(out, "  Extraction id: {}", result.extraction_id);
    }
    let _ = writeln!(
        out,
        "  Merchant:      {}",
        result.vendor_name.as_deref().unwrap_or("Unknown merchant")
    );
    if let Some(date) = &result.date {
        let _ = writeln!(out, "  Date:          {date}");
    }
    if let Some(number) = &result.receipt_number {
        let _ = writeln!(out, "  Receipt #:     {number}");
    }
    if let Some(method) = &result.payment_method {
        let _ = writeln!(out, "  Payment:       {method}");
    }
    if let Some(score) = result.confidence_score {
        let _ = writeln!(
            out,
            "  Confidence:    {:.0}% ({})",
            score * 100.0,
            confidence_label(ConfidenceLevel::from_score(score))
        );
    }

    if !result.receipt_items.is_empty() {
        let _ = writeln!(out, "\n  Items:");
        for item in &result.receipt_items {
            let quantity = match item.quantity {
                Some(quantity) if quantity != 1.0 => format!("{quantity} x "),
                _ => String::new(),
            };
            let _ = writeln!(
                out,
                "    {quantity}{:<32} {:>14}",
                item.item_name,
                format_amount(item.item_cost, currency)
            );
        }
    }

    let _ = writeln!(out);
    if let Some(subtotal) = result.subtotal {
        let _ = writeln!(out, "  Subtotal: {:>14}", format_amount(subtotal, currency));
    }
    if let Some(tax) = result.tax {
        let _ = writeln!(out, "  Tax:      {:>14}", format_amount(tax, currency));
    }
    match result.total {
        Some(total) => {
            let _ = writeln!(out, "  Total:    {:>14}", format_amount(total, currency));
        }
        None => {
            let _ = writeln!(out, "  Total:    {:>14}", "-");
        }
    }

    for warning in result.warnings() {
        let _ = writeln!(out, "  Warning: {warning}");
    }
    if let Some(url) = image_url {
        let _ = writeln!(out, "  Image: {url}");
    }
    out
}

pub fn render_health(health: &HealthCheckResponse) -> String {
    let status = match health.status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Unhealthy => "unhealthy",
    };
    let mut out = format!("API {status} (version {})\n", health.version);
    if !health.supported_formats.is_empty() {
        let _ = writeln!(out, "  Formats:      {}", health.supported_formats.join(", "));
    }
    if !health.capabilities.is_empty() {
        let _ = writeln!(out, "  Capabilities: {}", health.capabilities.join(", "));
    }
    let _ = writeln!(out, "  Checked at:   {}", health.timestamp);
    out
}

/// One currency per line: code, symbol, name.
pub fn render_currencies(currencies: &[SupportedCurrency]) -> String {
    if currencies.is_empty() {
        return "The API reported no currencies.\n".to_string();
    }
    let mut out = String::new();
    for currency in currencies {
        let _ = writeln!(
            out,
            "{:<4} {:<4} {}",
            currency.code, currency.symbol, currency.name
        );
    }
    out
}

pub fn render_validation(extraction_id: &str, report: &ReceiptValidation) -> String {
    let label = if extraction_id.is_empty() {
        "Result"
    } else {
        extraction_id
    };
    if report.valid {
        return format!("{label} is valid.\n");
    }
    let mut out = format!("{label} is not valid:\n");
    for error in &report.errors {
        let _ = writeln!(out, "  - {error}");
    }
    out
}

fn confidence_label(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::High => "high",
        ConfidenceLevel::Medium => "medium",
        ConfidenceLevel::Low => "low",
    }
}
