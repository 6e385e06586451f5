//! Core types and events for service-archiver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::mime::OutputFormat;

/// Caller-supplied job key (typically an email address)
///
/// Surrounding whitespace is trimmed; the key is otherwise kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
    /// Parse an owner key, rejecting blank input
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("owner key must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one job run
///
/// Resubmitting for the same owner produces a new `JobId`, which is how late
/// pipeline results for a replaced job are told apart from the current one.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle as seen by callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Progression {
    /// No job has been submitted for this owner
    NotStarted,
    /// The pipeline is fetching or assembling
    InProgress,
    /// The archive is ready for retrieval
    Completed,
    /// The pipeline failed, timed out or was cancelled
    Error,
}

impl Progression {
    /// Stable snake_case name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Progression::NotStarted => "not_started",
            Progression::InProgress => "in_progress",
            Progression::Completed => "completed",
            Progression::Error => "error",
        }
    }

    /// Human-readable status line shown to the owner when polling
    pub fn describe(&self) -> &'static str {
        match self {
            Progression::NotStarted => "No download request found.",
            Progression::InProgress => "Download currently still in progress.",
            Progression::Completed => "Your download has successfully completed.",
            Progression::Error => {
                "A serious error has occurred while preparing your download, please contact the administrator."
            }
        }
    }

    /// Whether the job will never change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Progression::Completed | Progression::Error)
    }
}

impl std::fmt::Display for Progression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of fetching a single URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchResult {
    /// The transport returned a body
    Fetched {
        /// Raw response body
        payload: Vec<u8>,
        /// Content-Type reported by the server, if any
        content_type: Option<String>,
    },
    /// The transport failed; the reason is kept for reporting
    Failed {
        /// Human-readable failure reason
        detail: String,
    },
}

/// Per-URL record produced by the fetch orchestrator
///
/// Exactly one outcome exists per input URL and `index` is its position in the
/// input list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Zero-based position of the URL in the submitted list
    pub index: usize,
    /// The URL that was fetched
    pub source_url: String,
    /// What happened
    pub result: FetchResult,
}

impl FetchOutcome {
    /// Build a successful outcome
    pub fn fetched(
        index: usize,
        source_url: impl Into<String>,
        payload: Vec<u8>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            index,
            source_url: source_url.into(),
            result: FetchResult::Fetched {
                payload,
                content_type,
            },
        }
    }

    /// Build a failed outcome
    pub fn failed(index: usize, source_url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            index,
            source_url: source_url.into(),
            result: FetchResult::Failed {
                detail: detail.into(),
            },
        }
    }

    /// Whether the fetch produced a payload
    pub fn is_success(&self) -> bool {
        matches!(self.result, FetchResult::Fetched { .. })
    }

    /// The fetched body, if any
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.result {
            FetchResult::Fetched { payload, .. } => Some(payload),
            FetchResult::Failed { .. } => None,
        }
    }

    /// The reported content type, if any
    pub fn content_type(&self) -> Option<&str> {
        match &self.result {
            FetchResult::Fetched { content_type, .. } => content_type.as_deref(),
            FetchResult::Failed { .. } => None,
        }
    }

    /// The failure reason, if the fetch failed
    pub fn error_detail(&self) -> Option<&str> {
        match &self.result {
            FetchResult::Failed { detail } => Some(detail),
            FetchResult::Fetched { .. } => None,
        }
    }
}

/// What happened to one fetch outcome during archive assembly
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryStatus {
    /// Written to the archive under `name`
    Included {
        /// Entry name inside the archive
        name: String,
    },
    /// The fetch failed, nothing was written
    FetchFailed {
        /// Transport failure reason
        detail: String,
    },
    /// The payload was too short for its line-oriented format
    InsufficientContent {
        /// Lines found in the payload
        lines: usize,
        /// Minimum lines required
        required: usize,
    },
}

/// Per-URL assembly report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntryReport {
    /// Zero-based position of the URL in the submitted list
    pub index: usize,
    /// The URL the entry came from
    pub source_url: String,
    /// Outcome of assembling this URL
    pub status: EntryStatus,
}

impl EntryReport {
    /// Entry name if the payload made it into the archive
    pub fn included_name(&self) -> Option<&str> {
        match &self.status {
            EntryStatus::Included { name } => Some(name),
            _ => None,
        }
    }
}

/// Answer to an asynchronous submission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// A new job was created and started
    Accepted,
    /// The owner already has a job in progress; nothing was created
    Conflict,
}

/// Point-in-time view of an owner's job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobSnapshot {
    /// Owner of the job
    pub owner: OwnerKey,
    /// Job run identifier
    pub job_id: JobId,
    /// Current progression
    pub state: Progression,
    /// Requested output format, if any
    pub format_override: Option<OutputFormat>,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure reason for jobs in the error state
    pub error: Option<String>,
    /// Whether any archive entry name contains "csv"
    pub contains_csv: bool,
    /// Per-URL assembly report (empty until the job completes)
    pub entries: Vec<EntryReport>,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was accepted and its pipeline started
    JobSubmitted {
        /// Owner of the job
        owner: OwnerKey,
        /// Job run identifier
        job_id: JobId,
        /// Number of URLs in the batch
        urls: usize,
    },

    /// One URL of a job could not be fetched
    FetchFailed {
        /// Owner of the job
        owner: OwnerKey,
        /// Position of the URL in the batch
        index: usize,
        /// URL that failed
        url: String,
        /// Transport failure reason
        error: String,
    },

    /// A fetched payload was left out of the archive
    EntryExcluded {
        /// Owner of the job
        owner: OwnerKey,
        /// Position of the URL in the batch
        index: usize,
        /// Lines found in the payload
        lines: usize,
        /// Minimum lines required
        required: usize,
    },

    /// The archive is ready
    JobCompleted {
        /// Owner of the job
        owner: OwnerKey,
        /// Job run identifier
        job_id: JobId,
        /// Number of entries written to the archive
        entries: usize,
    },

    /// The job ended in the error state
    JobFailed {
        /// Owner of the job
        owner: OwnerKey,
        /// Job run identifier
        job_id: JobId,
        /// Failure reason
        error: String,
    },

    /// A terminal job was removed by the retention sweeper
    JobEvicted {
        /// Owner of the job
        owner: OwnerKey,
        /// Job run identifier
        job_id: JobId,
    },

    /// The service is shutting down
    Shutdown,
}
