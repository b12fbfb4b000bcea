//! CLI entry point: bundles the attachments of one record into a ZIP file.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bundler_core::bundle::{BundleBuilder, BundleStatus};
use bundler_core::controller::{BundleController, ControllerMessage, ControllerOutcome};
use bundler_core::fetch::{HttpFetcher, RetryPolicy};
use bundler_core::host::{DirectoryDelivery, GristClient, resolve_mapping};
use bundler_core::normalize::Normalizer;
use clap::Parser;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod progress_ui;
mod settings;

use cli::Args;
use progress_ui::SpinnerSink;
use settings::{Settings, resolve_default_log_level};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = config::load_file_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > info
    let default_level = resolve_default_log_level(&args, loaded.config.as_ref());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(
        row = args.row,
        config = ?loaded.path,
        config_loaded = loaded.config.is_some(),
        "CLI arguments parsed"
    );

    let settings = Settings::resolve(&args, loaded.config.as_ref())?;

    let fetcher =
        HttpFetcher::new_with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs)
            .context("Failed to build HTTP client")?
            .with_retry_policy(RetryPolicy::with_max_attempts(settings.max_attempts));

    let mut host = GristClient::new(
        fetcher.inner().clone(),
        &settings.server,
        settings.doc_id.clone(),
        settings.api_key.clone(),
    )?;
    if let Some(token) = settings.access_token.clone() {
        host = host.with_access_token(token);
    }

    let record = host
        .fetch_record(&settings.table, settings.row)
        .await
        .with_context(|| format!("Failed to load row {} of table '{}'", settings.row, settings.table))?;
    let mapping = resolve_mapping(&record, &settings.bindings);

    let builder = BundleBuilder::new(fetcher)
        .with_normalizer(Normalizer::new(settings.normalize.clone()))
        .with_naming_policy(settings.naming.clone())
        .with_concurrency(settings.concurrency);
    let controller = BundleController::new(
        builder,
        Arc::new(host),
        Arc::new(DirectoryDelivery::new(settings.output_dir.clone())),
    );

    let spinner = SpinnerSink::new(!args.quiet && io::stderr().is_terminal());

    let preview = controller
        .handle(ControllerMessage::RecordChanged { record, mapping }, &spinner)
        .await;
    if let Some(status) = preview.status() {
        info!(%status, "record loaded");
    }

    let outcome = controller
        .handle(ControllerMessage::BuildRequested, &spinner)
        .await;
    spinner.finish();

    let code = match outcome {
        ControllerOutcome::Finished { result, status } => {
            println!("{status}");
            if let Some(location) = &result.delivered_to {
                info!(
                    location = %location,
                    files = result.processed,
                    skipped = result.skipped,
                    converted = result.converted,
                    "archive written"
                );
            }
            if result.status == BundleStatus::Failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        ControllerOutcome::Aborted { error, status } => {
            eprintln!("{status}");
            debug!(error = %error, "run aborted");
            ExitCode::FAILURE
        }
        ControllerOutcome::RecordUpdated(_) | ControllerOutcome::Ignored => {
            warn!("build request was not processed");
            ExitCode::FAILURE
        }
    };
    Ok(code)
}
