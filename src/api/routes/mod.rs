//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Archive downloads, background jobs and collation
//! - [`system`] - Health, events, OpenAPI

use crate::types::{Progression, SubmitStatus};
use serde::{Deserialize, Serialize};

mod downloads;
mod system;

pub use downloads::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadRequest {
    /// Service URLs to fetch, in archive order
    pub service_urls: Vec<String>,
    /// Owner key; when present the archive is built by a background job
    #[serde(default)]
    pub email: Option<String>,
    /// Force every entry to this format ("csv", "text/csv", "gml", ...)
    #[serde(default)]
    pub output_format: Option<String>,
    /// Filename to present for a synchronous download
    #[serde(default)]
    pub filename: Option<String>,
}

/// Request body for POST /collate
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CollateRequest {
    /// URLs whose responses are archived as-is
    pub service_urls: Vec<String>,
    /// Filename to present; its extension is kept, `.zip` otherwise
    #[serde(default)]
    pub filename: Option<String>,
}

/// Response body for an asynchronous POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    /// Whether a new job was started
    pub status: SubmitStatus,
}

/// Response body for GET /downloads/:owner/status
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct JobStatusResponse {
    /// Owner key that was polled
    pub owner: String,
    /// Current job state
    pub status: Progression,
    /// Human-readable status line
    pub message: String,
}
