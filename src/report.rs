//! Failure report and summary rendering for a finished batch.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::download::BatchResult;
use crate::download::constants::FAILURE_REPORT_FILENAME;

/// Header row of the failure report.
const REPORT_HEADER: &str = "reference,name,error";

/// Errors writing the failure report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report file could not be written.
    #[error("cannot write failure report {path}: {source}")]
    Write {
        /// Report path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Writes `download_errors.csv` into `dir` listing every failed item.
///
/// Returns `Ok(None)` without touching the filesystem when nothing failed.
///
/// # Errors
///
/// Returns [`ReportError::Write`] if the file cannot be written.
#[instrument(skip(result), fields(dir = %dir.display(), failed = result.failed.len()))]
pub async fn write_failure_report(
    dir: &Path,
    result: &BatchResult,
) -> Result<Option<PathBuf>, ReportError> {
    if result.failed.is_empty() {
        debug!("no failures, skipping report");
        return Ok(None);
    }

    let path = dir.join(FAILURE_REPORT_FILENAME);
    let contents = render_failure_csv(result);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), "wrote failure report");
    Ok(Some(path))
}

/// Renders the failure report as CSV text.
#[must_use]
pub fn render_failure_csv(result: &BatchResult) -> String {
    let mut out = String::from(REPORT_HEADER);
    out.push('\n');
    for failed in &result.failed {
        let item = &failed.item;
        let name = item
            .resolved_name
            .as_deref()
            .or(item.desired_name.as_deref())
            .unwrap_or("");
        let error = item
            .error
            .as_deref()
            .unwrap_or_else(|| failed.reason.as_str());
        let _ = writeln!(
            out,
            "{},{},{}",
            csv_field(&item.reference),
            csv_field(name),
            csv_field(error)
        );
    }
    out
}

/// One-line human summary of a batch.
#[must_use]
pub fn render_summary(result: &BatchResult) -> String {
    let mut summary = format!(
        "{} of {} downloaded",
        result.succeeded, result.total
    );
    let errors = result.error_count();
    if errors > 0 {
        let _ = write!(summary, ", {errors} failed");
    }
    let cancelled = result.cancelled_count();
    if cancelled > 0 {
        let _ = write!(summary, ", {cancelled} cancelled");
    }
    summary
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
