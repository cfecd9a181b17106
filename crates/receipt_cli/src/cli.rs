//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use receipt_core::MAX_RETRIES;
use receipt_engine::{ExportFormat, BASE_URL_ENV, DEFAULT_BASE_URL};

/// Extract structured data from receipt images.
#[derive(Parser, Debug)]
#[command(name = "receipt")]
#[command(version)]
#[command(about = "Client for the receipt extraction API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the extraction API.
    #[arg(long, global = true, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory holding the persisted session.
    #[arg(long, global = true, default_value = ".receipt_session")]
    pub session_dir: PathBuf,

    /// Enable debug logging on the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to ./receipt.log.
    #[arg(long, global = true)]
    pub log_file: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a receipt image and print the extracted data.
    Extract(ExtractArgs),

    /// Check that the extraction API is reachable.
    Health,

    /// List the currencies the extraction API recognizes.
    Currencies,

    /// Ask the API to check the stored result, or a saved API response.
    Validate {
        /// JSON file holding an extraction response. Defaults to the stored result.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the result stored by the last extraction.
    Show {
        #[arg(short, long, default_value = "human")]
        format: ShowFormat,
    },

    /// Forget the stored result.
    Clear,
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// JPEG, PNG or WebP image, at most 10 MB.
    pub file: PathBuf,

    /// Client-side identifier echoed in the extraction id.
    #[arg(long)]
    pub custom_id: Option<String>,

    /// Ask the server to keep a copy of the image.
    #[arg(long)]
    pub save_image: bool,

    /// Download the server-side copy of the image into the output directory.
    #[arg(long, requires = "save_image")]
    pub download_image: bool,

    /// Include processing metadata in the result.
    #[arg(long)]
    pub include_metadata: bool,

    /// Language hint for the receipt text, e.g. `en` or `de`.
    #[arg(long)]
    pub language: Option<String>,

    /// Automatic retries after a retryable failure.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=MAX_RETRIES as i64))]
    pub retries: u32,

    /// Export the result after a successful extraction.
    #[arg(long)]
    pub export: Option<ExportFormatArg>,

    /// Directory for exports and downloaded images.
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportFormatArg {
    Json,
    Text,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Text => ExportFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ShowFormat {
    /// Summary for the terminal.
    #[default]
    Human,
    /// Same structure as a JSON export.
    Json,
    /// Same report as a text export.
    Text,
}
