use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use receipt_core::ReceiptResponse;
use serde_json::{json, Value};

use crate::filename::export_filename;
use crate::store::{AtomicFileWriter, StoreError};

const ITEM_NAME_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Overrides the default `receipt-{number}-{date}` name.
    pub filename: Option<String>,
    /// Date used in the default filename, e.g. `2024-03-01`.
    pub date_stamp: String,
    /// Footer timestamp of text exports.
    pub exported_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("a failed extraction cannot be exported")]
    NotExportable,
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Writes `result` into `dir` and returns the path of the export.
pub fn export_receipt(
    result: &ReceiptResponse,
    dir: &Path,
    options: &ExportOptions,
) -> Result<PathBuf, ExportError> {
    let content = match options.format {
        ExportFormat::Json => render_json(result)?,
        ExportFormat::Text => render_text(result, &options.exported_at)?,
    };
    let filename = options.filename.clone().unwrap_or_else(|| {
        export_filename(
            result.receipt_number.as_deref(),
            &options.date_stamp,
            options.format.extension(),
        )
    });
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    Ok(writer.write(&filename, &content)?)
}

/// Pretty JSON of the receipt data without processing metadata.
pub fn render_json(result: &ReceiptResponse) -> Result<String, ExportError> {
    let clean = clean_receipt(result)?;
    Ok(serde_json::to_string_pretty(&clean)?)
}

/// Fixed-width plain-text report.
pub fn render_text(result: &ReceiptResponse, exported_at: &str) -> Result<String, ExportError> {
    if result.is_failed() {
        return Err(ExportError::NotExportable);
    }
    let currency = result.currency.as_deref();
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "RECEIPT DETAILS");
    let _ = writeln!(out, "{}\n", "=".repeat(50));

    let _ = writeln!(out, "MERCHANT INFORMATION");
    let _ = writeln!(out, "{}", "-".repeat(25));
    let _ = writeln!(
        out,
        "Business Name: {}\n",
        result.vendor_name.as_deref().unwrap_or("Unknown merchant")
    );

    let _ = writeln!(out, "TRANSACTION DETAILS");
    let _ = writeln!(out, "{}", "-".repeat(25));
    let _ = writeln!(out, "Date: {}", result.date.as_deref().unwrap_or("Unknown"));
    if let Some(number) = &result.receipt_number {
        let _ = writeln!(out, "Receipt Number: {number}");
    }
    if let Some(method) = &result.payment_method {
        let _ = writeln!(out, "Payment Method: {method}");
    }
    out.push('\n');

    if !result.receipt_items.is_empty() {
        let _ = writeln!(out, "ITEMS PURCHASED");
        let _ = writeln!(out, "{}", "-".repeat(25));
        let _ = writeln!(
            out,
            "{:>3} {:<30} {:>6} {:>12} {:>12}",
            "#", "Item", "Qty", "Unit Price", "Total"
        );
        let _ = writeln!(out, "{}", "-".repeat(65));
        for (index, item) in result.receipt_items.iter().enumerate() {
            let quantity = item.quantity.unwrap_or(1.0);
            let _ = writeln!(
                out,
                "{:>3} {:<30} {:>6} {:>12} {:>12}",
                index + 1,
                truncate_name(&item.item_name),
                format_quantity(quantity),
                format_amount(unit_price(item.item_cost, quantity), currency),
                format_amount(item.item_cost, currency)
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "FINANCIAL SUMMARY");
    let _ = writeln!(out, "{}", "-".repeat(25));
    if let Some(subtotal) = result.subtotal {
        let _ = writeln!(out, "Subtotal: {:>20}", format_amount(subtotal, currency));
    }
    let details = result.tax_details.as_ref();
    if let Some(tax) = result.tax {
        let tax_type = details
            .and_then(|d| d.tax_type.as_deref())
            .unwrap_or("Tax");
        let label = match details.and_then(|d| d.tax_rate.as_deref()) {
            Some(rate) => format!("{tax_type} ({})", rate_label(rate)),
            None => tax_type.to_string(),
        };
        let _ = writeln!(out, "{label}: {:>12}", format_amount(tax, currency));
    }
    for charge in details.map(|d| d.additional_taxes.as_slice()).unwrap_or(&[]) {
        let _ = writeln!(
            out,
            "{}: {:>20}",
            charge.name,
            format_amount(charge.amount, currency)
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(35));
    let total = result
        .total
        .map(|total| format_amount(total, currency))
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "TOTAL: {total:>28}");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "\nExported on: {exported_at}");

    Ok(out)
}

/// `"USD 4.75"`, or just `"4.75"` without a currency.
pub fn format_amount(amount: f64, currency: Option<&str>) -> String {
    match currency {
        Some(code) if !code.trim().is_empty() => format!("{} {amount:.2}", code.trim()),
        _ => format!("{amount:.2}"),
    }
}

fn clean_receipt(result: &ReceiptResponse) -> Result<Value, ExportError> {
    if result.is_failed() {
        return Err(ExportError::NotExportable);
    }
    let details = result.tax_details.as_ref();
    let items: Vec<Value> = result
        .receipt_items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let quantity = item.quantity.unwrap_or(1.0);
            json!({
                "itemNumber": index + 1,
                "name": item.item_name,
                "quantity": quantity,
                "unitPrice": unit_price(item.item_cost, quantity),
                "totalPrice": item.item_cost,
            })
        })
        .collect();
    let additional: Vec<Value> = details
        .map(|d| d.additional_taxes.as_slice())
        .unwrap_or(&[])
        .iter()
        .map(|charge| json!({ "name": charge.name, "amount": charge.amount }))
        .collect();

    Ok(json!({
        "merchant": {
            "name": result.vendor_name,
        },
        "transaction": {
            "date": result.date,
            "receiptNumber": result.receipt_number,
            "paymentMethod": result.payment_method,
        },
        "items": items,
        "financial": {
            "subtotal": result.subtotal,
            "tax": {
                "rate": details.and_then(|d| d.tax_rate.clone()),
                "amount": result.tax,
                "type": details.and_then(|d| d.tax_type.clone()).unwrap_or_else(|| "Tax".to_string()),
                "inclusive": details.and_then(|d| d.tax_inclusive),
            },
            "additionalCharges": additional,
            "total": result.total,
            "currency": result.currency,
        }
    }))
}

fn unit_price(total: f64, quantity: f64) -> f64 {
    if quantity > 0.0 {
        (total / quantity * 100.0).round() / 100.0
    } else {
        total
    }
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{quantity:.0}")
    } else {
        format!("{quantity}")
    }
}

fn rate_label(rate: &str) -> String {
    let rate = rate.trim();
    if rate.ends_with('%') {
        rate.to_string()
    } else {
        format!("{rate}%")
    }
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > ITEM_NAME_WIDTH {
        let head: String = name.chars().take(ITEM_NAME_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}
