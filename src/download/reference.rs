//! Reference normalization: share-link rewriting and URL validation.
//!
//! Cloud-sharing services hand out links that render an HTML preview page
//! instead of the file itself. [`resolve_reference`] rewrites the shapes it
//! knows into direct-fetch links and rejects anything that is not a
//! well-formed HTTP/HTTPS URL. No network access happens here.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};
use url::Url;

use super::DownloadError;
use super::constants::MAX_REFERENCE_LENGTH;

/// Direct-download endpoint for Google Drive files.
const GOOGLE_DRIVE_DOWNLOAD: &str = "https://drive.google.com/uc";

/// Matches `/file/d/<id>` in Drive share links.
#[allow(clippy::expect_used)]
static DRIVE_FILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/file/d/([A-Za-z0-9_-]+)").expect("drive regex is valid") // Static pattern, safe to panic
});

/// Resolves a raw reference into a direct-fetch URL.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidReference`] when the reference is empty,
/// too long, unparseable, not http/https, or has no host.
///
/// # Examples
///
/// ```
/// use image_downloader_core::download::resolve_reference;
///
/// let url = resolve_reference("https://www.dropbox.com/s/abc/cat.jpg?dl=0").unwrap();
/// assert_eq!(url.as_str(), "https://www.dropbox.com/s/abc/cat.jpg?dl=1");
/// ```
pub fn resolve_reference(reference: &str) -> Result<Url, DownloadError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(DownloadError::invalid_reference(reference, "empty reference"));
    }
    if trimmed.len() > MAX_REFERENCE_LENGTH {
        return Err(DownloadError::invalid_reference(
            reference,
            format!("longer than {MAX_REFERENCE_LENGTH} characters"),
        ));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| DownloadError::invalid_reference(reference, e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(DownloadError::invalid_reference(
                reference,
                format!("scheme '{scheme}' is not supported"),
            ));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(DownloadError::invalid_reference(reference, "missing host"));
    }

    let direct = rewrite_share_link(parsed);
    trace!(reference = %trimmed, direct = %direct, "resolved reference");
    Ok(direct)
}

/// Rewrites known share-link shapes; everything else passes through.
fn rewrite_share_link(url: Url) -> Url {
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return url;
    };

    if host == "dropbox.com" || host.ends_with(".dropbox.com") {
        return rewrite_dropbox(url);
    }
    if host == "drive.google.com" {
        return rewrite_google_drive(url);
    }
    url
}

/// Dropbox previews with `dl=0`; `dl=1` forces the raw file.
fn rewrite_dropbox(mut url: Url) -> Url {
    let has_raw = url.query_pairs().any(|(k, v)| k == "raw" && v == "1");
    if has_raw {
        return url;
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "dl")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let had_dl = url.query_pairs().any(|(k, _)| k == "dl");

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        query.append_pair("dl", "1");
    }
    debug!(url = %url, had_dl, "rewrote dropbox share link");
    url
}

fn rewrite_google_drive(url: Url) -> Url {
    let file_id = DRIVE_FILE_PATH
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            url.query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned())
                .filter(|id| !id.is_empty())
        });

    let Some(file_id) = file_id else {
        return url;
    };

    match Url::parse_with_params(
        GOOGLE_DRIVE_DOWNLOAD,
        &[("export", "download"), ("id", file_id.as_str())],
    ) {
        Ok(direct) => {
            debug!(file_id = %file_id, "rewrote google drive share link");
            direct
        }
        Err(_) => url,
    }
}
