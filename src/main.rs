use std::fs;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use assetcheck::VerifyError;
use assetcheck::cancel::CancelToken;
use assetcheck::cli::Cli;
use assetcheck::config::Config;
use assetcheck::findings::FindingPump;
use assetcheck::progress::{ProgressReporter, format_finding};
use assetcheck::types::{AssetRecord, RunSummary};
use assetcheck::verify::Verifier;

const FINDING_QUEUE_CAPACITY: usize = 256;
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

mod exit_code {
    pub const FAULT: u8 = 1;
    pub const CANCELLED: u8 = 130;
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a RunSummary,
    broken: &'a [AssetRecord],
}

fn setup_tracing(verbose: u8, quiet: u8) {
    let filter = match (quiet, verbose) {
        (q, _) if q > 0 => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

fn load_manifest(path: &Path) -> anyhow::Result<Vec<AssetRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse manifest {}", path.display()))
}

fn is_cancelled(e: &anyhow::Error) -> bool {
    e.chain()
        .any(|cause| cause.downcast_ref::<VerifyError>().is_some_and(VerifyError::is_cancelled))
}

/// Interrupt handler that asks the running verification to stop.
fn cancel_on_interrupt(token: CancelToken) -> impl Fn() + Send + 'static {
    move || {
        eprintln!("\nReceived interrupt, stopping verification...");
        token.cancel();
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let manifest_path = cli.manifest.clone();
    let config = Config::try_from(cli)?;
    let mut manifest = load_manifest(&manifest_path)?;
    info!(
        "Loaded {} assets from {}",
        manifest.len(),
        manifest_path.display()
    );

    let reporter = ProgressReporter::maybe_new(&config);
    let printer = reporter.as_ref().map(|r| r.printer());
    let pump = FindingPump::spawn(FINDING_QUEUE_CAPACITY, move |finding| {
        let line = format_finding(&finding);
        match &printer {
            Some(bar) => bar.println(line),
            None => info!("{line}"),
        }
    });

    let verifier = Verifier::new(config, pump.sink());
    ctrlc::set_handler(cancel_on_interrupt(verifier.cancel_token()))
        .context("failed to set signal handler")?;
    let progress = verifier.progress();
    let outcome = thread::scope(|scope| {
        let worker = scope.spawn(|| verifier.run(&mut manifest));
        while !worker.is_finished() {
            if let Some(reporter) = &reporter {
                reporter.refresh(&progress.snapshot());
            }
            thread::sleep(REFRESH_INTERVAL);
        }
        worker
            .join()
            .map_err(|_| anyhow!("verification thread panicked"))
    })?;
    if let Some(reporter) = &reporter {
        reporter.refresh(&progress.snapshot());
        reporter.finalize();
    }

    drop(verifier);
    let delivered = pump.finish();
    let summary = outcome.context("verification did not complete")?;
    info!("{delivered} findings reported");

    let report = Report {
        summary: &summary,
        broken: &manifest,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_cancelled(&e) => {
            eprintln!("Verification cancelled");
            ExitCode::from(exit_code::CANCELLED)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code::FAULT)
        }
    }
}
