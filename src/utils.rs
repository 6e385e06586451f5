//! Naming utilities for archive entries and download filenames

use chrono::{DateTime, TimeZone};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

/// Display name for archives that contain at least one csv entry
pub const CSV_DISPLAY_NAME: &str = "CSVDownload.zip";

/// Display name for every other service archive
pub const GML_DISPLAY_NAME: &str = "GMLDownload.zip";

/// Default stem for collated data archives when the caller gives no filename
pub const DEFAULT_COLLATION_STEM: &str = "DataDownload";

// `/<name>.<three word chars>` at the very end of a URL path.
static URL_FILENAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/([^/ ]+)\.\w{3}$").ok());

/// Recover a filename stem from the last segment of a URL path
///
/// Only paths ending in `/<name>.<ext>` with a three character extension
/// qualify; the extension itself is dropped. Query strings are ignored.
///
/// # Examples
///
/// ```
/// use service_archiver::utils::filename_from_url;
///
/// assert_eq!(
///     filename_from_url("http://example.com/data/boreholes.csv?version=2"),
///     Some("boreholes".to_string())
/// );
/// assert_eq!(filename_from_url("http://example.com/wfs?request=GetFeature"), None);
/// ```
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let pattern = URL_FILENAME.as_ref()?;
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Not an absolute URL; match against everything before the query
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    pattern
        .captures(&path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fallback entry name built from a 1-based position and a second-resolution timestamp
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use service_archiver::utils::timestamped_name;
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(timestamped_name(2, &at), "2_20240309_140507");
/// ```
#[must_use]
pub fn timestamped_name<Tz>(position: usize, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}", position, at.format("%Y%m%d_%H%M%S"))
}

/// Count newline-delimited lines the way a line reader would
///
/// A trailing newline does not start an extra line and an empty payload has
/// zero lines.
///
/// # Examples
///
/// ```
/// use service_archiver::utils::count_lines;
///
/// assert_eq!(count_lines(b""), 0);
/// assert_eq!(count_lines(b"header\n"), 1);
/// assert_eq!(count_lines(b"header\nrow"), 2);
/// assert_eq!(count_lines(b"header\nrow\n"), 2);
/// ```
#[must_use]
pub fn count_lines(payload: &[u8]) -> usize {
    let newlines = payload.iter().filter(|b| **b == b'\n').count();
    match payload.last() {
        None => 0,
        Some(b'\n') => newlines,
        Some(_) => newlines + 1,
    }
}

/// Make `stem.extension` unique among `used`, recording the result
///
/// Collisions get the 1-based position appended to the stem (`name_3.csv`),
/// then a counter if that is taken too.
pub fn claim_unique_name(
    used: &mut HashSet<String>,
    stem: &str,
    extension: Option<&str>,
    position: usize,
) -> String {
    let join = |stem: &str| match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    };

    let mut name = join(stem);
    if used.contains(&name) {
        name = join(&format!("{}_{}", stem, position));
        let mut counter = 1;
        while used.contains(&name) {
            name = join(&format!("{}_{}_{}", stem, position, counter));
            counter += 1;
        }
    }
    used.insert(name.clone());
    name
}

/// Pick the user-facing archive name for a service download
#[must_use]
pub fn service_display_name(contains_csv: bool) -> &'static str {
    if contains_csv {
        CSV_DISPLAY_NAME
    } else {
        GML_DISPLAY_NAME
    }
}

/// Build the user-facing name for a collated data archive
///
/// The stem of `filename` is kept together with its extension; a missing
/// extension becomes `zip` and a missing or unusable filename becomes
/// `DataDownload.zip`. Characters that would break a Content-Disposition
/// header or form a path are dropped.
///
/// # Examples
///
/// ```
/// use service_archiver::utils::collation_display_name;
///
/// assert_eq!(collation_display_name(Some("layers")), "layers.zip");
/// assert_eq!(collation_display_name(Some("layers.tar")), "layers.tar");
/// assert_eq!(collation_display_name(None), "DataDownload.zip");
/// ```
#[must_use]
pub fn collation_display_name(filename: Option<&str>) -> String {
    let cleaned: String = filename
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | ';' | '/' | '\\'))
        .collect();
    let path = Path::new(cleaned.trim());

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_COLLATION_STEM);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("zip");

    format!("{}.{}", stem, extension)
}
