//! Content-type classification
//!
//! Maps MIME types (and explicit format overrides) onto the closed set of
//! [`OutputFormat`]s this crate knows how to name and validate. Unknown input
//! never fails; it simply has no format and therefore no file extension.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How a payload of a given format is checked before it enters an archive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentRule {
    /// Any payload is accepted
    Any,
    /// Newline-delimited text that must reach the minimum line count
    MinimumLines,
}

/// Output formats with a known extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma separated values
    Csv,
    /// Geography Markup Language
    Gml,
    /// Generic XML
    Xml,
    /// JSON
    Json,
    /// Keyhole Markup Language
    Kml,
    /// ZIP container
    Zip,
    /// PNG image
    Png,
    /// JPEG image
    Jpeg,
    /// GIF image
    Gif,
    /// TIFF / GeoTIFF image
    Tiff,
    /// PDF document
    Pdf,
    /// Plain text
    Text,
    /// HTML document
    Html,
}

// (mime type, format). The first entry for a format is its canonical type.
const MIME_TABLE: &[(&str, OutputFormat)] = &[
    ("text/csv", OutputFormat::Csv),
    ("application/csv", OutputFormat::Csv),
    ("application/gml+xml", OutputFormat::Gml),
    ("application/vnd.ogc.gml", OutputFormat::Gml),
    ("application/xml", OutputFormat::Xml),
    ("text/xml", OutputFormat::Xml),
    ("application/json", OutputFormat::Json),
    ("application/geo+json", OutputFormat::Json),
    ("application/vnd.google-earth.kml+xml", OutputFormat::Kml),
    ("application/zip", OutputFormat::Zip),
    ("application/x-zip-compressed", OutputFormat::Zip),
    ("image/png", OutputFormat::Png),
    ("image/jpeg", OutputFormat::Jpeg),
    ("image/jpg", OutputFormat::Jpeg),
    ("image/gif", OutputFormat::Gif),
    ("image/tiff", OutputFormat::Tiff),
    ("image/geotiff", OutputFormat::Tiff),
    ("application/pdf", OutputFormat::Pdf),
    ("text/plain", OutputFormat::Text),
    ("text/html", OutputFormat::Html),
];

impl OutputFormat {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Gml => "gml",
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
            OutputFormat::Kml => "kml",
            OutputFormat::Zip => "zip",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tif",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Text => "txt",
            OutputFormat::Html => "html",
        }
    }

    /// Canonical MIME type
    pub fn mime_type(&self) -> &'static str {
        MIME_TABLE
            .iter()
            .find(|(_, format)| format == self)
            .map(|(mime, _)| *mime)
            .unwrap_or("application/octet-stream")
    }

    /// Content check applied before a payload of this format is archived
    pub fn content_rule(&self) -> ContentRule {
        match self {
            OutputFormat::Csv | OutputFormat::Text => ContentRule::MinimumLines,
            _ => ContentRule::Any,
        }
    }

    /// Classify a Content-Type header value
    ///
    /// Parameters (`; charset=...`) are ignored and matching is case-insensitive.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence.is_empty() {
            return None;
        }
        MIME_TABLE
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, format)| *format)
    }

    /// Parse a caller-supplied format override
    ///
    /// Accepts either a MIME type (`text/csv`) or a bare format name / extension
    /// (`csv`, `.csv`, `jpeg`).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.contains('/') {
            return Self::from_mime(value);
        }
        let name = value.trim_start_matches('.').to_ascii_lowercase();
        let format = match name.as_str() {
            "csv" => OutputFormat::Csv,
            "gml" => OutputFormat::Gml,
            "xml" => OutputFormat::Xml,
            "json" | "geojson" => OutputFormat::Json,
            "kml" => OutputFormat::Kml,
            "zip" => OutputFormat::Zip,
            "png" => OutputFormat::Png,
            "jpg" | "jpeg" => OutputFormat::Jpeg,
            "gif" => OutputFormat::Gif,
            "tif" | "tiff" | "geotiff" => OutputFormat::Tiff,
            "pdf" => OutputFormat::Pdf,
            "txt" | "text" => OutputFormat::Text,
            "html" | "htm" => OutputFormat::Html,
            _ => return None,
        };
        Some(format)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Map a content type onto a file extension
///
/// Missing or unknown content types yield `None`, never an error.
///
/// # Examples
///
/// ```
/// use service_archiver::mime::content_type_to_extension;
///
/// assert_eq!(content_type_to_extension(Some("text/csv; charset=UTF-8")), Some("csv"));
/// assert_eq!(content_type_to_extension(Some("image/jpeg")), Some("jpg"));
/// assert_eq!(content_type_to_extension(Some("application/x-unknown")), None);
/// assert_eq!(content_type_to_extension(None), None);
/// ```
#[must_use]
pub fn content_type_to_extension(content_type: Option<&str>) -> Option<&'static str> {
    content_type
        .and_then(OutputFormat::from_mime)
        .map(|format| format.extension())
}
