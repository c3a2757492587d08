//! Input listing parser.
//!
//! Turns a tabular text listing into [`DownloadItem`]s. Each line is
//! `reference[<sep>desired name]` where `<sep>` is a comma, tab or semicolon;
//! the first separator on the line wins. A column may be wrapped in double
//! quotes (with `""` as an escaped quote) when it contains a separator.
//!
//! References are NOT validated here; malformed ones flow into the batch and
//! fail there as invalid references.
//!
//! # Example
//!
//! ```
//! use image_downloader_core::source::parse_items;
//!
//! let result = parse_items("url,name\nhttps://example.com/a.jpg,Red Shoe\n");
//! assert_eq!(result.len(), 1);
//! assert_eq!(result.items[0].desired_name.as_deref(), Some("Red Shoe"));
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::download::DownloadItem;

/// First-column values recognized as a header row (case-insensitive).
const HEADER_NAMES: &[&str] = &["url", "link", "reference", "image", "image url"];

/// Column separators, in no particular priority; the earliest on a line wins.
const SEPARATORS: &[char] = &[',', '\t', ';'];

/// Errors reading an input listing.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The listing file could not be read.
    #[error("cannot read input file {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A line that produced no item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number.
    pub line: usize,
    /// Raw line text.
    pub content: String,
}

/// Outcome of parsing a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceParseResult {
    /// Items in listing order.
    pub items: Vec<DownloadItem>,
    /// Lines with an empty reference column.
    pub skipped: Vec<SkippedLine>,
}

impl SourceParseResult {
    /// Returns true if no items were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns count of parsed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Parses a listing into download items.
#[must_use]
#[instrument(skip(text), fields(bytes = text.len()))]
pub fn parse_items(text: &str) -> SourceParseResult {
    let mut result = SourceParseResult::default();
    let mut seen_content = false;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (reference, name) = split_columns(line);

        let first_content_line = !seen_content;
        seen_content = true;
        if first_content_line && is_header(&reference) {
            debug!(line = line_no, "skipping header row");
            continue;
        }

        if reference.is_empty() {
            debug!(line = line_no, "skipping line with empty reference");
            result.skipped.push(SkippedLine {
                line: line_no,
                content: raw.to_string(),
            });
            continue;
        }

        let item = match name {
            Some(name) if !name.is_empty() => DownloadItem::named(reference, name),
            _ => DownloadItem::new(reference),
        };
        result.items.push(item);
    }

    info!(
        items = result.items.len(),
        skipped = result.skipped.len(),
        "parsed input listing"
    );
    result
}

/// Reads and parses a listing file.
///
/// # Errors
///
/// Returns [`SourceError::Read`] if the file cannot be read as UTF-8 text.
pub async fn read_items(path: &Path) -> Result<SourceParseResult, SourceError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_items(&text))
}

fn is_header(first_column: &str) -> bool {
    HEADER_NAMES
        .iter()
        .any(|h| first_column.eq_ignore_ascii_case(h))
}

/// Splits a line into a trimmed, unquoted reference and optional name.
fn split_columns(line: &str) -> (String, Option<String>) {
    let (first, rest) = take_column(line);
    let name = rest.map(|rest| {
        // Only the second column is meaningful; anything after it is ignored.
        let (second, _) = take_column(rest);
        second
    });
    (first, name)
}

/// Reads one column from the start of `input`, returning the remainder after
/// the separator if there is one.
fn take_column(input: &str) -> (String, Option<&str>) {
    let input = input.trim_start();

    if let Some(quoted) = input.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '"' {
                value.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '"'))) {
                value.push('"');
                chars.next();
                continue;
            }
            // Closing quote: the remainder starts after the next separator.
            let after = &quoted[i + 1..];
            let rest = after.find(SEPARATORS).map(|pos| &after[pos + 1..]);
            return (value.trim().to_string(), rest);
        }
        // Unterminated quote: keep what was read.
        return (value.trim().to_string(), None);
    }

    match input.find(SEPARATORS) {
        Some(pos) => (
            input[..pos].trim().to_string(),
            Some(&input[pos + 1..]),
        ),
        None => (input.trim().to_string(), None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_only_lines() {
        let result = parse_items("https://a.com/1.jpg\nhttps://a.com/2.jpg\n");
        assert_eq!(result.len(), 2);
        assert_eq!(result.items[0].reference, "https://a.com/1.jpg");
        assert!(result.items[0].desired_name.is_none());
    }

    #[test]
    fn test_parse_each_separator() {
        let result = parse_items("https://a.com/1,one\nhttps://a.com/2\ttwo\nhttps://a.com/3;three");
        let names: Vec<_> = result
            .items
            .iter()
            .map(|i| i.desired_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_first_separator_wins() {
        let result = parse_items("https://a.com/x;semi,comma");
        assert_eq!(result.items[0].reference, "https://a.com/x");
        assert_eq!(result.items[0].desired_name.as_deref(), Some("semi"));
    }

    #[test]
    fn test_header_row_is_skipped_case_insensitively() {
        for header in ["URL,Name", "Image URL\tname", "link", "reference;title"] {
            let result = parse_items(&format!("{header}\nhttps://a.com/1.jpg"));
            assert_eq!(result.len(), 1, "header {header:?} not skipped");
            assert!(result.skipped.is_empty());
        }
    }

    #[test]
    fn test_header_only_recognized_on_first_content_line() {
        let result = parse_items("https://a.com/1.jpg\nurl");
        assert_eq!(result.len(), 2);
        assert_eq!(result.items[1].reference, "url");
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let result = parse_items("\n# comment\n   \nhttps://a.com/1.jpg\n");
        assert_eq!(result.len(), 1);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_quotes_are_stripped() {
        let result = parse_items(r#""https://a.com/1.jpg","Red, ""big"" shoe""#);
        assert_eq!(result.items[0].reference, "https://a.com/1.jpg");
        assert_eq!(
            result.items[0].desired_name.as_deref(),
            Some(r#"Red, "big" shoe"#)
        );
    }

    #[test]
    fn test_quoted_reference_may_contain_separator() {
        let result = parse_items(r#""https://a.com/img?a=1,2",pic"#);
        assert_eq!(result.items[0].reference, "https://a.com/img?a=1,2");
        assert_eq!(result.items[0].desired_name.as_deref(), Some("pic"));
    }

    #[test]
    fn test_empty_name_becomes_none() {
        let result = parse_items("https://a.com/1.jpg,   \nhttps://a.com/2.jpg,\"\"");
        assert!(result.items[0].desired_name.is_none());
        assert!(result.items[1].desired_name.is_none());
    }

    #[test]
    fn test_empty_reference_is_skipped_with_line_number() {
        let result = parse_items("https://a.com/1.jpg\n,orphan name\n");
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.skipped,
            vec![SkippedLine {
                line: 2,
                content: ",orphan name".to_string()
            }]
        );
    }

    #[test]
    fn test_invalid_references_are_kept() {
        let result = parse_items("not a url\nftp://x/y.jpg");
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_read_items_missing_file() {
        let err = read_items(Path::new("/nonexistent/listing.csv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/listing.csv"));
    }

    #[tokio::test]
    async fn test_read_items_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("list.tsv");
        std::fs::write(&path, "image\tname\nhttps://a.com/1.png\tone\n").unwrap();

        let result = read_items(&path).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.items[0].desired_name.as_deref(), Some("one"));
    }
}
