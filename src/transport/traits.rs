//! Traits and types for fetching remote resources

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Body and content type returned by a successful fetch
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    /// Raw response body
    pub bytes: Vec<u8>,
    /// Content-Type header value, if the server sent one
    pub content_type: Option<String>,
}

/// Why a single fetch failed
///
/// These never abort a batch; the orchestrator turns them into failed
/// [`FetchOutcome`](crate::types::FetchOutcome)s.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The URL could not be parsed
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The connection could not be established
    #[error("connection failed for '{url}': {reason}")]
    Connect {
        /// Target URL
        url: String,
        /// Underlying error
        reason: String,
    },

    /// No response within the allotted time
    #[error("timed out fetching '{url}' after {after:?}")]
    Timeout {
        /// Target URL
        url: String,
        /// The limit that was exceeded
        after: Duration,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} from '{url}'")]
    Status {
        /// Target URL
        url: String,
        /// Response status code
        status: u16,
    },

    /// The response body could not be read
    #[error("failed to read body from '{url}': {reason}")]
    Body {
        /// Target URL
        url: String,
        /// Underlying error
        reason: String,
    },

    /// The fetch was abandoned because its job was cancelled
    #[error("fetch of '{url}' cancelled")]
    Cancelled {
        /// Target URL
        url: String,
    },
}

/// Issues a GET for one URL and returns the body
///
/// Implementations must be cheap to share across tasks; the orchestrator holds
/// one behind an `Arc` and calls it concurrently for every URL in a batch.
///
/// # Examples
///
/// ```no_run
/// use service_archiver::transport::{HttpTransport, Transport};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new(Duration::from_secs(30), "service-archiver")?;
/// let resource = transport.get("https://example.com/data.csv").await?;
/// println!("{} bytes of {:?}", resource.bytes.len(), resource.content_type);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`
    async fn get(&self, url: &str) -> Result<FetchedResource, TransportError>;

    /// Name of this transport (for logging)
    fn name(&self) -> &'static str;
}
