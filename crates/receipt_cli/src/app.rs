//! Subcommand handlers.

use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use receipt_core::{
    file_extension, validate_upload, ExtractOptions, ExtractionError, ReceiptResponse,
    ReceiptUpload,
};
use receipt_engine::{
    clear_persisted, export_receipt, load_image_url, load_result, render_json, render_text,
    AtomicFileWriter, ClientSettings, ControllerSettings, ExportError, ExportFormat,
    ExportOptions, ExtractionClient, ExtractionController, FileStore, ReqwestExtractionClient,
};
use receipt_logging::{receipt_debug, receipt_info, receipt_warn};

use crate::cli::{Cli, Commands, ExtractArgs, ShowFormat};
use crate::render;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

type Controller = ExtractionController<ReqwestExtractionClient, FileStore>;

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let store = FileStore::new(cli.session_dir.clone());
    match cli.command {
        Commands::Extract(args) => extract(&cli.base_url, store, args).await,
        Commands::Health => health(&cli.base_url).await,
        Commands::Currencies => currencies(&cli.base_url).await,
        Commands::Validate { file } => validate(&cli.base_url, &store, file.as_deref()).await,
        Commands::Show { format } => show(&store, format),
        Commands::Clear => {
            clear_persisted(&store).context("failed to clear the session")?;
            println!("Session cleared.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Reads `path` into an upload named after the file.
pub fn load_upload(path: &Path) -> Result<ReceiptUpload> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ReceiptUpload::from_named_bytes(name, bytes))
}

fn build_client(base_url: &str) -> Result<ReqwestExtractionClient> {
    let settings = ClientSettings {
        base_url: base_url.to_string(),
        ..ClientSettings::default()
    };
    ReqwestExtractionClient::new(settings).context("failed to create the API client")
}

async fn extract(base_url: &str, store: FileStore, args: ExtractArgs) -> Result<ExitCode> {
    let upload = load_upload(&args.file)?;
    validate_upload(&upload)?;

    let settings = ControllerSettings {
        extract_options: ExtractOptions {
            custom_id: args.custom_id.clone(),
            save_image: args.save_image.then_some(true),
            include_metadata: args.include_metadata.then_some(true),
            language: args.language.clone(),
        },
        ..ControllerSettings::default()
    };
    let controller = ExtractionController::new(build_client(base_url)?, store, settings);
    controller.select_file(upload);
    let mut interrupt = Interrupt::ctrl_c();

    let mut outcome = drive(&controller, false, &mut interrupt).await?;
    let mut retries_left = args.retries;
    while let Some(result) = &outcome {
        if !result.is_failed() || retries_left == 0 || !is_retryable(result) {
            break;
        }
        retries_left -= 1;
        let delay = RETRY_BACKOFF * (args.retries - retries_left);
        eprintln!(
            "{} Retrying in {} ms...",
            render::render_result(result, None).trim_end(),
            delay.as_millis()
        );
        if !sleep_or_interrupt(delay, &mut interrupt).await {
            receipt_info!("Interrupted during retry backoff");
            controller.cancel();
            outcome = None;
            break;
        }
        outcome = drive(&controller, true, &mut interrupt).await?;
    }

    let Some(result) = outcome else {
        println!("Extraction cancelled.");
        return Ok(ExitCode::FAILURE);
    };

    let image_url = load_image_url(controller.store());
    print!("{}", render::render_result(&result, image_url.as_deref()));
    if result.is_failed() {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(format) = args.export {
        let path = export(&result, &args.output, format.into())?;
        println!("Exported to {}", path.display());
    }
    if interrupt.fired() {
        return Ok(ExitCode::FAILURE);
    }
    if args.download_image {
        tokio::select! {
            downloaded = download_image(&controller, &result, &args.output) => downloaded?,
            _ = interrupt.recv() => {
                println!("Image download cancelled.");
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Ctrl-C, listened to for the whole extract command.
struct Interrupt {
    signal: Pin<Box<dyn Future<Output = io::Result<()>>>>,
    fired: bool,
    unavailable: bool,
}

impl Interrupt {
    fn ctrl_c() -> Self {
        Self::from_future(tokio::signal::ctrl_c())
    }

    fn from_future(signal: impl Future<Output = io::Result<()>> + 'static) -> Self {
        Self {
            signal: Box::pin(signal),
            fired: false,
            unavailable: false,
        }
    }

    fn fired(&self) -> bool {
        self.fired
    }

    /// Completes once, when the signal arrives. Pending forever after that,
    /// or when no handler could be installed. Safe to use in `select!`.
    async fn recv(&mut self) {
        if self.fired || self.unavailable {
            return std::future::pending().await;
        }
        match self.signal.as_mut().await {
            Ok(()) => self.fired = true,
            Err(err) => {
                receipt_warn!("Cannot listen for Ctrl-C: {}", err);
                self.unavailable = true;
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sleeps for `delay`. Returns `false` when interrupted first.
async fn sleep_or_interrupt(delay: Duration, interrupt: &mut Interrupt) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = interrupt.recv() => false,
    }
}

/// Runs one confirm or retry, printing progress until it settles.
/// Ctrl-C cancels the attempt.
async fn drive(
    controller: &Controller,
    retry: bool,
    interrupt: &mut Interrupt,
) -> Result<Option<ReceiptResponse>> {
    if interrupt.fired() {
        return Ok(None);
    }
    let attempt = async {
        if retry {
            controller.retry().await
        } else {
            controller.confirm().await
        }
    };
    tokio::pin!(attempt);

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut last_line = None;
    let outcome = loop {
        tokio::select! {
            outcome = &mut attempt => break outcome,
            _ = interrupt.recv() => {
                receipt_info!("Interrupted, cancelling extraction");
                controller.cancel();
            }
            _ = ticker.tick() => {
                let line = render::progress_line(&controller.view());
                if line.is_some() && line != last_line {
                    if let Some(text) = &line {
                        eprintln!("{text}");
                    }
                    last_line = line;
                }
            }
        }
    };
    Ok(outcome?)
}

fn is_retryable(result: &ReceiptResponse) -> bool {
    result
        .error
        .as_ref()
        .map(|error| {
            ExtractionError::new(error.code.clone(), error.message.clone())
                .category()
                .is_retryable()
        })
        .unwrap_or(false)
}

fn export(result: &ReceiptResponse, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
    let now = Local::now();
    let options = ExportOptions {
        format,
        filename: None,
        date_stamp: now.format("%Y-%m-%d").to_string(),
        exported_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    export_receipt(result, dir, &options)
        .with_context(|| format!("failed to export into {}", dir.display()))
}

async fn download_image(
    controller: &Controller,
    result: &ReceiptResponse,
    dir: &Path,
) -> Result<()> {
    let Some(image_url) = result.image_url.as_deref() else {
        receipt_warn!("No image url in result {}", result.extraction_id);
        println!("The server did not return an image.");
        return Ok(());
    };
    let bytes = controller
        .client()
        .fetch_image(image_url)
        .await
        .map_err(|err| anyhow::anyhow!(err.user_message()))
        .context("failed to download the image")?;

    let last_segment = image_url.rsplit('/').next().unwrap_or_default();
    let extension = match file_extension(last_segment).as_str() {
        "" => ".jpg".to_string(),
        ext => ext.to_string(),
    };
    let stem = if result.extraction_id.is_empty() {
        "export"
    } else {
        result.extraction_id.as_str()
    };
    let filename = format!("receipt-image-{stem}{extension}");
    let path = AtomicFileWriter::new(dir.to_path_buf())
        .write_bytes(&filename, &bytes)
        .with_context(|| format!("failed to write {filename}"))?;
    receipt_debug!("Saved image bytes={} path={:?}", bytes.len(), path);
    println!("Image saved to {}", path.display());
    Ok(())
}

async fn health(base_url: &str) -> Result<ExitCode> {
    let client = build_client(base_url)?;
    match client.health().await {
        Ok(health) => {
            print!("{}", render::render_health(&health));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            receipt_info!("Health check failed: {}", err);
            bail!("{} ({})", err.user_message(), err.code)
        }
    }
}

async fn currencies(base_url: &str) -> Result<ExitCode> {
    let client = build_client(base_url)?;
    let currencies = client.currencies().await.map_err(|err| {
        receipt_info!("Currency list failed: {}", err);
        anyhow::anyhow!("{} ({})", err.user_message(), err.code)
    })?;
    print!("{}", render::render_currencies(&currencies));
    Ok(ExitCode::SUCCESS)
}

async fn validate(base_url: &str, store: &FileStore, file: Option<&Path>) -> Result<ExitCode> {
    let Some(result) = result_to_validate(store, file)? else {
        println!("No stored result in {}.", store.dir().display());
        return Ok(ExitCode::FAILURE);
    };
    let client = build_client(base_url)?;
    let report = client.validate(&result).await.map_err(|err| {
        receipt_info!("Validation request failed: {}", err);
        anyhow::anyhow!("{} ({})", err.user_message(), err.code)
    })?;
    print!("{}", render::render_validation(&result.extraction_id, &report));
    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Reads an API response from `file`, or the stored session result.
fn result_to_validate(
    store: &FileStore,
    file: Option<&Path>,
) -> Result<Option<ReceiptResponse>> {
    let Some(path) = file else {
        return Ok(load_result(store));
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let result = serde_json::from_str(&text)
        .with_context(|| format!("{} is not an extraction response", path.display()))?;
    Ok(Some(result))
}

fn show(store: &FileStore, format: ShowFormat) -> Result<ExitCode> {
    let Some(result) = load_result(store) else {
        println!("No stored result in {}.", store.dir().display());
        return Ok(ExitCode::SUCCESS);
    };
    let image_url = load_image_url(store);

    let (text, exportable) = render_stored(&result, image_url.as_deref(), format)?;
    print!("{text}");
    Ok(if exportable {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Renders a stored result. Failed records fall back to the human summary
/// and report `false`.
fn render_stored(
    result: &ReceiptResponse,
    image_url: Option<&str>,
    format: ShowFormat,
) -> Result<(String, bool)> {
    let rendered = match format {
        ShowFormat::Human if result.is_failed() => Err(ExportError::NotExportable),
        ShowFormat::Human => Ok(render::render_result(result, image_url)),
        ShowFormat::Json => render_json(result).map(|json| format!("{json}\n")),
        ShowFormat::Text => {
            render_text(result, &Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
        }
    };
    match rendered {
        Ok(text) => Ok((text, true)),
        Err(ExportError::NotExportable) => Ok((render::render_result(result, None), false)),
        Err(err) => Err(err.into()),
    }
}
