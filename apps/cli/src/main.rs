//! Command line tool for application export bundles.

#![forbid(unsafe_code)]

mod cli;
mod cli_config;
mod commands;

use clap::Parser;
use tracing::info;

use appbundle_core::AppError;

use crate::cli::{Cli, Command};
use crate::cli_config::{CliConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = CliConfig::load()?;

    info!(
        tenant_id = %config.tenant_id,
        subject = %config.actor_subject,
        "appbundle started"
    );

    match cli.command {
        Command::Inspect { path } => commands::inspect(&path).await,
        Command::Validate { path } => commands::validate(&path).await,
        Command::Reimport {
            input,
            output,
            reset_widget_styles,
        } => commands::reimport(&config, &input, &output, reset_widget_styles).await,
    }
}
