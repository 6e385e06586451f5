//! A single job record and its internal state.

use crate::archive::AssemblyReport;
use crate::mime::OutputFormat;
use crate::types::{JobId, JobSnapshot, OwnerKey, Progression};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Internal job state
///
/// The archive path only exists in `Completed`, so a job can never point at an
/// archive while it is still running or after it failed.
#[derive(Debug)]
pub(crate) enum JobState {
    InProgress,
    Completed {
        archive_path: PathBuf,
        report: AssemblyReport,
    },
    Failed {
        reason: String,
    },
}

/// One job run for one owner
#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) owner: OwnerKey,
    pub(crate) format_override: Option<OutputFormat>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: JobState,
}

impl Job {
    pub(crate) fn start(
        id: JobId,
        owner: OwnerKey,
        format_override: Option<OutputFormat>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            owner,
            format_override,
            created_at: Utc::now(),
            finished_at: None,
            cancel,
            state: JobState::InProgress,
        }
    }

    pub(crate) fn progression(&self) -> Progression {
        match self.state {
            JobState::InProgress => Progression::InProgress,
            JobState::Completed { .. } => Progression::Completed,
            JobState::Failed { .. } => Progression::Error,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self.state, JobState::InProgress)
    }

    pub(crate) fn archive_path(&self) -> Option<&Path> {
        match &self.state {
            JobState::Completed { archive_path, .. } => Some(archive_path),
            _ => None,
        }
    }

    pub(crate) fn complete(&mut self, archive_path: PathBuf, report: AssemblyReport) {
        self.state = JobState::Completed {
            archive_path,
            report,
        };
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.state = JobState::Failed { reason };
        self.finished_at = Some(Utc::now());
    }

    /// Whether the job finished before `cutoff`
    pub(crate) fn finished_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.finished_at.is_some_and(|at| at < cutoff)
    }

    pub(crate) fn snapshot(&self) -> JobSnapshot {
        let (error, contains_csv, entries) = match &self.state {
            JobState::InProgress => (None, false, Vec::new()),
            JobState::Completed { report, .. } => {
                (None, report.contains_csv, report.entries.clone())
            }
            JobState::Failed { reason } => (Some(reason.clone()), false, Vec::new()),
        };

        JobSnapshot {
            owner: self.owner.clone(),
            job_id: self.id,
            state: self.progression(),
            format_override: self.format_override,
            created_at: self.created_at,
            finished_at: self.finished_at,
            error,
            contains_csv,
            entries,
        }
    }
}
