//! Error types for service-archiver
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] enum and [`Result`] alias
//! - Job registry errors ([`JobError`])
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Per-URL transport failures are not part of [`Error`]: they are
//! recorded as data on each [`FetchOutcome`](crate::types::FetchOutcome) and never
//! escalate. See [`TransportError`](crate::transport::TransportError).

use crate::types::{OwnerKey, Progression};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for service-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for service-archiver
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker_pool_size")
        key: Option<String>,
    },

    /// Request rejected before any work was started (empty URL list, blank owner key)
    #[error("invalid request: {0}")]
    Validation(String),

    /// Job registry error (conflict, missing record, not ready)
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Writing the archive container failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The pipeline did not finish within the configured job timeout
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The pipeline was cancelled before it finished
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new requests")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the per-owner job registry
#[derive(Debug, Error)]
pub enum JobError {
    /// The owner already has a job in progress
    #[error("a job for {owner} is already in progress")]
    AlreadyRunning {
        /// The owner whose job is still running
        owner: OwnerKey,
    },

    /// No job has ever been submitted for this owner (or it was evicted)
    #[error("no job found for {owner}")]
    NotFound {
        /// The owner that has no record
        owner: OwnerKey,
    },

    /// The job exists but has no archive to hand out
    #[error("job for {owner} is {state}, not completed")]
    NotReady {
        /// The owner whose job was queried
        owner: OwnerKey,
        /// The current progression of the job
        state: Progression,
    },

    /// The job has already finished, so there is nothing to cancel
    #[error("job for {owner} is {state}, nothing to cancel")]
    NotRunning {
        /// The owner whose job was targeted
        owner: OwnerKey,
        /// The terminal progression of the job
        state: Progression,
    },
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_ready",
///     "message": "job error: job for someone@example.com is in_progress, not completed",
///     "details": {
///       "owner": "someone@example.com",
///       "state": "in_progress"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Job(JobError::AlreadyRunning { .. }) => 409,
            Error::Job(JobError::NotReady { .. }) => 409,
            Error::Job(JobError::NotRunning { .. }) => 409,

            Error::Archive(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Cancelled(_) => 500,
            Error::Other(_) => 500,

            Error::Network(_) => 502,

            Error::ShuttingDown => 503,

            Error::TimedOut(_) => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Job(e) => match e {
                JobError::AlreadyRunning { .. } => "job_already_running",
                JobError::NotFound { .. } => "job_not_found",
                JobError::NotReady { .. } => "job_not_ready",
                JobError::NotRunning { .. } => "job_not_running",
            },
            Error::Archive(_) => "archive_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::TimedOut(_) => "timed_out",
            Error::Cancelled(_) => "cancelled",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::AlreadyRunning { owner }) => Some(serde_json::json!({
                "owner": owner,
            })),
            Error::Job(JobError::NotFound { owner }) => Some(serde_json::json!({
                "owner": owner,
            })),
            Error::Job(
                JobError::NotReady { owner, state } | JobError::NotRunning { owner, state },
            ) => Some(serde_json::json!({
                "owner": owner,
                "state": state,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::TimedOut(after) => Some(serde_json::json!({
                "timeout_secs": after.as_secs(),
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
