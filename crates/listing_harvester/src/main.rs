mod config;
mod logging;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_engine::{
    ensure_output_dir, BrowserTokenProvider, ChromiumBackend, DealListingMapper, FileResultSink,
    HarvestEngine, HarvestReport, LogProgressSink, ReqwestListingsClient,
};
use tokio_util::sync::CancellationToken;

use crate::config::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let log_dir = (!args.log_dir.as_os_str().is_empty()).then_some(args.log_dir.as_path());
    if let Some(path) = logging::initialize(log_dir, args.log_level) {
        engine_info!("Logging to {}", path.display());
    }

    match run(args).await {
        Ok(report) if report.cancelled() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("Fatal: {:#}", err);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<HarvestReport> {
    let catalog = args.catalog()?;
    ensure_output_dir(&args.output_dir)
        .with_context(|| format!("preparing output directory {}", args.output_dir.display()))?;
    let client = ReqwestListingsClient::new(args.fetch_settings())
        .context("building listings client")?;
    let tokens = BrowserTokenProvider::new(
        ChromiumBackend::new(args.browser_settings()),
        args.acquisition_plan(),
    );

    let engine = HarvestEngine::new(
        args.harvest_settings(),
        catalog,
        Box::new(tokens),
        Box::new(client),
        Box::new(DealListingMapper::with_system_clock()),
        Box::new(FileResultSink::new(args.export_options())),
    )
    .with_progress(Box::new(LogProgressSink));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("Interrupted, finishing the current step");
            on_signal.cancel();
        }
    });

    let report = engine.run(cancel).await;
    if report.summary.target_reached() {
        engine_info!("Target of {} listings reached", report.summary.target_count);
    } else if !report.cancelled() {
        engine_warn!(
            "Token budget exhausted with {}/{} listings",
            report.summary.collected,
            report.summary.target_count
        );
    }
    for path in &report.output_paths {
        engine_info!("Output: {}", path.display());
    }
    Ok(report)
}
