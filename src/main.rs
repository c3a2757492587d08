//! CLI entry point for the image downloader.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use image_downloader_core::download::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_RETRY_MAX_DELAY};
use image_downloader_core::download::event_channel;
use image_downloader_core::report::{render_summary, write_failure_report};
use image_downloader_core::source::{SourceParseResult, parse_items, read_items};
use image_downloader_core::{BatchConfig, BatchResult, DownloadEngine, HttpClient};
use tracing::{debug, error, info, warn};

mod cli;
mod progress;

use cli::Args;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Every item succeeded, or there was nothing to do.
    Success,
    /// Setup failed before any download started.
    Failure,
    /// At least one item failed.
    Partial,
    /// The batch was cancelled by Ctrl+C.
    Interrupted,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Partial => ExitCode::from(2),
            ProcessExit::Interrupted => ExitCode::from(130),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ProcessExit::Failure.into()
        }
    }
}

/// Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
fn init_tracing(args: &Args) {
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

    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(args: Args) -> Result<ProcessExit> {
    debug!(?args, "CLI arguments parsed");

    let Some(parsed) = load_input(&args).await? else {
        info!("No input provided. Pass URLs as arguments, use --input, or pipe them via stdin.");
        info!("Example: echo 'https://example.com/cat.jpg,cat' | image-downloader");
        return Ok(ProcessExit::Success);
    };

    for skipped in &parsed.skipped {
        warn!(line = skipped.line, content = %skipped.content, "Skipped line with no reference");
    }

    if parsed.is_empty() {
        info!("No references found in input");
        return Ok(ProcessExit::Success);
    }

    let total = parsed.len();
    info!(items = total, skipped = parsed.skipped.len(), "Parsed input");

    let client = HttpClient::try_with_timeouts(
        Duration::from_secs(CONNECT_TIMEOUT_SECS),
        Duration::from_secs(args.timeout_secs),
    )
    .context("failed to build HTTP client")?;

    let (tx, rx) = event_channel();
    let engine = DownloadEngine::new(Arc::new(client))
        .with_events(tx)
        .with_retry_delays(
            Duration::from_millis(args.retry_base_ms),
            DEFAULT_RETRY_MAX_DELAY,
        );

    let token = engine.cancellation_token();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match interrupt_action(token.is_cancelled()) {
                InterruptAction::Cancel => {
                    warn!("Interrupt received; finishing in-flight downloads (press Ctrl+C again to quit)");
                    token.cancel();
                }
                InterruptAction::ForceExit => {
                    warn!("Second interrupt received; exiting without waiting");
                    std::process::exit(130);
                }
            }
        }
    });

    let show_progress = progress::should_show_progress(
        io::stderr().is_terminal(),
        args.quiet,
        progress::is_dumb_terminal(),
    );
    let progress_handle = progress::spawn_progress(show_progress, total, rx);

    let config = BatchConfig::new(parsed.items, &args.output_dir)
        .with_concurrency(usize::from(args.concurrency))
        .with_max_retries(u32::from(args.max_retries))
        .with_max_payload_bytes(args.max_payload_bytes);

    let outcome = engine.run(config).await;
    // Dropping the engine closes the event channel so the progress task ends.
    drop(engine);
    let _ = progress_handle.await;
    let result = outcome?;

    let report_path = match write_failure_report(&args.output_dir, &result).await {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "Could not write failure report");
            None
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !args.quiet {
        println!("{}", render_summary(&result));
        if let Some(path) = &report_path {
            println!("Failure report: {}", path.display());
        }
    }

    Ok(determine_exit(&result))
}

async fn load_input(args: &Args) -> Result<Option<SourceParseResult>> {
    if let Some(path) = &args.input {
        return Ok(Some(read_items(path).await?));
    }
    if !args.references.is_empty() {
        return Ok(Some(parse_items(&args.references.join("\n"))));
    }
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let buffer = tokio::task::spawn_blocking(|| {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map(|_| buffer)
    })
    .await
    .context("stdin reader task failed")?
    .context("failed to read stdin")?;
    Ok(Some(parse_items(&buffer)))
}

/// What a Ctrl+C does at this point in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Stop new work and let in-flight writes finish.
    Cancel,
    /// Already cancelling; quit now.
    ForceExit,
}

fn interrupt_action(already_cancelled: bool) -> InterruptAction {
    if already_cancelled {
        InterruptAction::ForceExit
    } else {
        InterruptAction::Cancel
    }
}

fn determine_exit(result: &BatchResult) -> ProcessExit {
    if result.cancelled_by_user {
        ProcessExit::Interrupted
    } else if result.failed.is_empty() {
        ProcessExit::Success
    } else {
        ProcessExit::Partial
    }
}
