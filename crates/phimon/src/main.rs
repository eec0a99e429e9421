mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use phimon_core::{Controller, FileBackend};

use crate::cli::{Cli, OutputFormat};
use crate::commands::Context;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let cfg = match &cli.global.config {
        Some(path) => phimon_config::load_config_from(path)?,
        None => phimon_config::load_config()?,
    };
    let monitor_config = phimon_config::to_monitor_config(&cfg)?;

    let session_dir = phimon_config::session_dir();
    tracing::debug!(dir = %session_dir.display(), "using session directory");
    let controller = Controller::new(monitor_config, Arc::new(FileBackend::new(session_dir)));

    let ctx = Context {
        format: resolve_format(cli.global.output, &cfg.defaults.output)?,
        quiet: cli.global.quiet,
        color: output::should_color(),
        server: cfg.server,
    };

    commands::dispatch(cli.command, &controller, &ctx).await
}

/// `--output` wins; otherwise the config file's `output` key.
fn resolve_format(flag: Option<OutputFormat>, configured: &str) -> Result<OutputFormat, CliError> {
    if let Some(format) = flag {
        return Ok(format);
    }
    match configured.to_ascii_lowercase().as_str() {
        "table" => Ok(OutputFormat::Table),
        "json" => Ok(OutputFormat::Json),
        other => Err(CliError::Config {
            message: format!("invalid defaults.output '{other}' (expected table or json)"),
        }),
    }
}
