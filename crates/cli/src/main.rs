//! Kanban tuner CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: flags and environment (see [`config::Args`]),
//!    validated before any network call, plus the board template file.
//! 2. **Wire observability**: `tracing-subscriber` with a text or JSON layer,
//!    and an OpenTelemetry OTLP exporter when a collector endpoint is set.
//! 3. **Construct infrastructure**: a [`github::GithubClient`] injected into
//!    the [`reconciler::BoardReconciler`].
//! 4. **Report**: the `ReconciliationResult` is printed as JSON on stdout.
//!    Any error exits with status 1.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use github::GithubClient;
use reconciler::BoardReconciler;
use tracing::{error, info};

use crate::config::{load_template, Args};
use crate::telemetry::Telemetry;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let telemetry = match Telemetry::init(args.log_json) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("error: {e:#}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let outcome = run(args).await;
    if let Err(e) = &outcome {
        error!("reconciliation failed: {e:#}");
    }
    telemetry.shutdown();

    match outcome {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(_) => std::process::ExitCode::FAILURE,
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = args.settings()?;
    let template = load_template(&args.template)?;

    let client = GithubClient::new(settings.token)
        .context("building the GitHub client")?
        .with_api_url(settings.api_url);
    info!(api = client.api_url(), repo = %settings.request.repo, "starting reconciliation");

    let mut reconciler = BoardReconciler::new(Arc::new(client), template)?;
    if let Some(deadline) = settings.deadline {
        reconciler = reconciler.with_deadline(deadline);
    }

    let result = reconciler.reconcile(&settings.request).await?;
    let report = serde_json::to_string_pretty(&result).context("serialising the result")?;
    println!("{report}");
    Ok(())
}
