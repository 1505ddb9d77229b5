//! CLI entry point for the catalog exporter.

use std::process::ExitCode;

use anyhow::{Context, Result};
use catalog_export::{
    Credential, CredentialProvider, NoReplacement, RunError, StdinPrompt, run,
};
use clap::Parser;
use tracing::{debug, error, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(credential) = Credential::new(&args.token) else {
        error!("token is empty");
        return Ok(ExitCode::FAILURE);
    };

    let config = args.to_config();
    debug!(?config, "configuration resolved");
    info!("catalog export starting");

    let provider: Box<dyn CredentialProvider> = if args.no_prompt {
        Box::new(NoReplacement)
    } else {
        Box::new(StdinPrompt)
    };

    match run(&config, credential, provider.as_ref()).await {
        Ok(report) => {
            info!(
                pages = report.total_pages,
                items = report.items,
                processed = report.stats.total(),
                downloaded = report.stats.downloaded(),
                renamed = report.stats.renamed(),
                embedded = report.stats.embedded(),
                failed = report.stats.failed(),
                output_dir = %config.output_dir.display(),
                "export complete"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(RunError::Extract(e)) => {
            error!(error = %e, "no items extracted; aborting");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("export failed"),
    }
}
