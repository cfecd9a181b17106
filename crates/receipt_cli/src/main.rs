mod app;
mod cli;
mod logging;
mod render;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::logging::LogDestination;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(LogDestination::from_flag(cli.log_file), cli.verbose);

    match app::run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
