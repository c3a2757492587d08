//! Filename derivation, sanitization, and collision-safe path reservation.
//!
//! Names come either from the data source (a desired name) or from the URL's
//! last path segment. Either way they pass through [`sanitize_filename`]
//! before touching the filesystem, and the final path is claimed with an
//! exclusive create so concurrent workers can never land on the same file.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tracing::{debug, trace};
use url::Url;

use super::validate::ImageFormat;

/// Extension used when neither the URL nor the content type provides one.
pub const DEFAULT_IMAGE_EXTENSION: &str = ".jpg";

/// Name used when sanitization leaves nothing behind.
pub const FALLBACK_NAME: &str = "unnamed";

/// Stem used when the URL path has no final segment.
const EMPTY_SEGMENT_STEM: &str = "image";

/// Maximum filename length in UTF-8 bytes (extension included).
///
/// Leaves room for a `_9999` collision suffix under the common 255-byte limit.
const MAX_NAME_BYTES: usize = 200;

/// Length a name is cut to when the filesystem still rejects it as too long.
const SHORT_NAME_BYTES: usize = 64;

/// Highest numeric suffix tried before giving up on a name.
const MAX_COLLISION_SUFFIX: usize = 9_999;

/// Derives a filename for an item that has no desired name.
///
/// Uses the URL's last path segment (percent-decoded). When the segment is
/// empty or carries no extension, one is taken from `content_type`, falling
/// back to [`DEFAULT_IMAGE_EXTENSION`]. The result is always sanitized and
/// never empty.
///
/// # Examples
///
/// ```
/// use image_downloader_core::download::derive_name;
/// use url::Url;
///
/// let url = Url::parse("https://cdn.example.com/p/shoe?size=large").unwrap();
/// assert_eq!(derive_name(&url, Some("image/png")), "shoe.png");
/// ```
#[must_use]
pub fn derive_name(url: &Url, content_type: Option<&str>) -> String {
    let segment = last_path_segment(url).unwrap_or_default();
    let candidate = if segment.trim().is_empty() {
        format!("{EMPTY_SEGMENT_STEM}{}", extension_from_content_type(content_type))
    } else if has_extension(&segment) {
        segment
    } else {
        format!("{segment}{}", extension_from_content_type(content_type))
    };
    let name = sanitize_filename(&candidate);
    trace!(url = %url, name = %name, "derived filename");
    name
}

/// Sanitizes a supplied name and appends `extension` when it has none.
#[must_use]
pub fn finalize_desired_name(desired: &str, extension: &str) -> String {
    let sanitized = sanitize_filename(desired);
    if has_extension(&sanitized) {
        sanitized
    } else {
        sanitize_filename(&format!("{sanitized}{extension}"))
    }
}

/// Picks the extension for a content type, or the generic image extension.
#[must_use]
pub fn extension_from_content_type(content_type: Option<&str>) -> &'static str {
    content_type
        .and_then(ImageFormat::from_mime)
        .map_or(DEFAULT_IMAGE_EXTENSION, ImageFormat::extension)
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces `< > : " / \ | ? *` and control characters with `_`, strips
/// leading/trailing whitespace, dots and underscores, and caps the length at
/// 200 bytes without splitting a character. An empty result becomes
/// [`FALLBACK_NAME`].
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '_');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    truncate_name(trimmed, MAX_NAME_BYTES)
}

/// Returns true when `name` ends in a dot followed by 1-5 ASCII alphanumerics.
#[must_use]
pub fn has_extension(name: &str) -> bool {
    match name.rfind('.') {
        Some(pos) if pos > 0 => {
            let ext = &name[pos + 1..];
            (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

/// Claims a unique path for `name` inside `dir` and opens it for writing.
///
/// The first attempt is `dir/name`; on collision `stem_1.ext`, `stem_2.ext`,
/// ... are tried. Each candidate is claimed with an exclusive create, so the
/// check and the reservation are a single filesystem operation and
/// concurrent callers always receive distinct paths.
///
/// # Errors
///
/// Returns the underlying IO error if a candidate cannot be created for a
/// reason other than already existing, or `AlreadyExists` once every suffix
/// up to 9 999 is taken. A name the filesystem rejects as too long is retried
/// once, cut to 64 bytes.
pub async fn reserve_unique_path(dir: &Path, name: &str) -> io::Result<(PathBuf, File)> {
    let name = sanitize_filename(name);

    match reserve_with_suffixes(dir, &name).await {
        Err(e) if e.kind() == io::ErrorKind::InvalidFilename && name.len() > SHORT_NAME_BYTES => {
            let short = truncate_name(&name, SHORT_NAME_BYTES);
            debug!(original = %name, short = %short, "filename rejected as too long, shortening");
            reserve_with_suffixes(dir, &short).await
        }
        other => other,
    }
}

async fn reserve_with_suffixes(dir: &Path, name: &str) -> io::Result<(PathBuf, File)> {
    for suffix in 0..=MAX_COLLISION_SUFFIX {
        let candidate = if suffix == 0 {
            name.to_string()
        } else {
            suffixed_name(name, suffix)
        };
        let path = dir.join(&candidate);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => {
                if suffix > 0 {
                    debug!(original = %name, path = %path.display(), "resolved filename collision");
                }
                return Ok((path, file));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free filename for '{name}' after {MAX_COLLISION_SUFFIX} suffixes"),
    ))
}

/// `photo.jpg` + 3 -> `photo_3.jpg`; `photo` + 3 -> `photo_3`.
fn suffixed_name(name: &str, suffix: usize) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem}_{suffix}{ext}")
}

fn split_extension(name: &str) -> (&str, &str) {
    if has_extension(name) {
        if let Some(pos) = name.rfind('.') {
            return (&name[..pos], &name[pos..]);
        }
    }
    (name, "")
}

/// Cuts `name` to at most `max_bytes`, keeping the extension and never
/// splitting a character.
fn truncate_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    let mut keep = max_bytes.saturating_sub(ext.len()).min(stem.len());
    while !stem.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}{ext}", &stem[..keep])
}

fn last_path_segment(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    let last = segments.next_back()?;
    let decoded = urlencoding::decode(last).map_or_else(
        |e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.to_string()
        },
        std::borrow::Cow::into_owned,
    );
    Some(decoded)
}
