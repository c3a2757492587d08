//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use image_downloader_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_MAX_RETRIES};

/// Download a list of image URLs into a folder.
///
/// References come from `--input`, from positional arguments, or from
/// piped stdin, one per line as `url[,name]` (tab or semicolon also work).
/// Dropbox and Google Drive share links are rewritten to direct downloads.
/// Payloads that are not images, or are too large, are rejected before
/// anything is written.
#[derive(Parser, Debug)]
#[command(name = "image-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Image references to download (overrides stdin)
    #[arg(value_name = "URL")]
    pub references: Vec<String>,

    /// Read references from a CSV/TSV listing file
    #[arg(short, long, value_name = "FILE", conflicts_with = "references")]
    pub input: Option<PathBuf>,

    /// Directory downloads are written into (created if missing)
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "IMAGE_DOWNLOADER_OUTPUT_DIR",
        default_value = "./downloads"
    )]
    pub output_dir: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output and the progress bar
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum concurrent downloads (1-100)
    #[arg(
        short = 'c',
        long,
        env = "IMAGE_DOWNLOADER_CONCURRENCY",
        default_value_t = DEFAULT_CONCURRENCY as u8,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub concurrency: u8,

    /// Maximum retries for transient failures (0-10)
    #[arg(
        short = 'r',
        long,
        env = "IMAGE_DOWNLOADER_MAX_RETRIES",
        default_value_t = DEFAULT_MAX_RETRIES as u8,
        value_parser = clap::value_parser!(u8).range(0..=10)
    )]
    pub max_retries: u8,

    /// Largest accepted payload in bytes
    #[arg(
        long,
        env = "IMAGE_DOWNLOADER_MAX_PAYLOAD_BYTES",
        default_value_t = DEFAULT_MAX_PAYLOAD_BYTES,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub max_payload_bytes: u64,

    /// Per-request timeout in seconds (1-3600)
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECS",
        env = "IMAGE_DOWNLOADER_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    pub timeout_secs: u64,

    /// Delay before the first retry in milliseconds; doubles on each retry (max 60000)
    #[arg(
        long,
        value_name = "MS",
        env = "IMAGE_DOWNLOADER_RETRY_BASE_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(0..=60000)
    )]
    pub retry_base_ms: u64,

    /// Print the batch result as JSON on stdout
    #[arg(long)]
    pub json: bool,
}
