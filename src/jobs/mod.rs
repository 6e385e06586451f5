//! Per-owner background jobs
//!
//! [`JobTracker`] keeps at most one job per owner key. Each owner has its own
//! slot lock, so the "is a job already running?" check and the creation of the
//! new job happen atomically for that owner while other owners proceed in
//! parallel. Slots are shared handles cloned out of the map; the map lock is
//! never held while a slot is locked or a file is touched. It is only
//! write-locked to add a new owner or to evict expired jobs.
//!
//! Finished archives live on disk under the configured work directory as
//! `<job id>.zip` until the owner resubmits or the job is evicted.

mod job;

use crate::archive::{ArchiveAssembler, AssemblyOptions, AssemblyReport};
use crate::config::Config;
use crate::error::{Error, JobError, Result};
use crate::fetch::FetchOrchestrator;
use crate::mime::OutputFormat;
use crate::types::{EntryStatus, Event, FetchOutcome, JobId, JobSnapshot, OwnerKey, Progression};
use chrono::{DateTime, Utc};
use job::{Job, JobState};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type Slot = Arc<Mutex<Option<Job>>>;
type Slots = HashMap<OwnerKey, Slot>;

/// Settings the tracker needs to run jobs
#[derive(Clone, Debug)]
pub struct TrackerSettings {
    /// Where finished archives are written
    pub work_dir: PathBuf,
    /// Minimum lines for line-oriented payloads
    pub min_content_lines: usize,
    /// Upper bound on a whole job, or None for no limit
    pub job_timeout: Option<Duration>,
}

impl TrackerSettings {
    /// Extract tracker settings from the service configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            work_dir: config.archive.work_dir.clone(),
            min_content_lines: config.archive.min_content_lines,
            job_timeout: config.jobs.job_timeout,
        }
    }
}

/// A completed job's archive, read back from disk
#[derive(Clone, Debug)]
pub struct RetrievedArchive {
    /// The job that produced the archive
    pub job_id: JobId,
    /// The zip file contents
    pub bytes: Vec<u8>,
    /// What went into the archive
    pub report: AssemblyReport,
}

/// Process-wide registry of owner jobs
#[derive(Clone)]
pub struct JobTracker {
    slots: Arc<RwLock<Slots>>,
    /// Cancellation tokens of jobs whose pipeline is still running
    active: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Set by `cancel_all`; checked under the `active` lock
    closed: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    orchestrator: FetchOrchestrator,
    settings: Arc<TrackerSettings>,
    event_tx: broadcast::Sender<Event>,
}

impl JobTracker {
    /// Create an empty tracker that fetches through `orchestrator`
    pub fn new(
        orchestrator: FetchOrchestrator,
        settings: TrackerSettings,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicU64::new(1)),
            orchestrator,
            settings: Arc::new(settings),
            event_tx,
        }
    }

    /// Start a background job for `owner`
    ///
    /// Returns immediately with the new job's id. Fails with
    /// [`JobError::AlreadyRunning`] if the owner's current job is still in
    /// progress; that job is left untouched. A finished job is replaced and its
    /// archive deleted. Fails with [`Error::ShuttingDown`] once
    /// [`cancel_all`](Self::cancel_all) has run.
    pub async fn submit(
        &self,
        owner: OwnerKey,
        urls: Vec<String>,
        format_override: Option<OutputFormat>,
    ) -> Result<JobId> {
        if urls.is_empty() {
            return Err(Error::Validation(
                "at least one service URL is required".into(),
            ));
        }

        let slot = self.slot_or_insert(&owner).await;
        let mut current = slot.lock().await;

        if current.as_ref().is_some_and(Job::is_running) {
            debug!(owner = %owner, "rejecting submission, job already in progress");
            return Err(JobError::AlreadyRunning { owner }.into());
        }

        let mut active = self.active.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let stale_archive = current.take().and_then(|previous| {
            debug!(owner = %owner, job_id = %previous.id, "replacing finished job");
            previous.archive_path().map(Path::to_path_buf)
        });

        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let cancel = CancellationToken::new();
        *current = Some(Job::start(id, owner.clone(), format_override, cancel.clone()));
        active.insert(id, cancel.clone());
        drop(active);

        if let Some(path) = stale_archive {
            remove_archive(&path).await;
        }

        let url_count = urls.len();
        let tracker = self.clone();
        let job_owner = owner.clone();
        tokio::spawn(async move {
            tracker
                .run_job(job_owner, id, urls, format_override, cancel)
                .await;
        });

        info!(owner = %owner, job_id = %id, urls = url_count, "job submitted");
        // Still under the slot lock, so this precedes the job's own events
        self.emit(Event::JobSubmitted {
            owner,
            job_id: id,
            urls: url_count,
        });
        drop(current);

        Ok(id)
    }

    /// Current progression for `owner`; `NotStarted` if there is no record
    pub async fn poll(&self, owner: &OwnerKey) -> Progression {
        let Some(slot) = self.slot(owner).await else {
            return Progression::NotStarted;
        };
        let current = slot.lock().await;
        current
            .as_ref()
            .map_or(Progression::NotStarted, Job::progression)
    }

    /// Full snapshot of the owner's job, if any
    pub async fn status(&self, owner: &OwnerKey) -> Option<JobSnapshot> {
        let slot = self.slot(owner).await?;
        let current = slot.lock().await;
        current.as_ref().map(Job::snapshot)
    }

    /// Read the owner's finished archive
    ///
    /// The file is read under the owner's slot lock, so a concurrent
    /// resubmission cannot delete it mid-read. Other owners are not held up.
    pub async fn retrieve(&self, owner: &OwnerKey) -> Result<RetrievedArchive> {
        let not_found = || JobError::NotFound {
            owner: owner.clone(),
        };
        let slot = self.slot(owner).await.ok_or_else(not_found)?;
        let current = slot.lock().await;
        let job = current.as_ref().ok_or_else(not_found)?;

        match &job.state {
            JobState::Completed {
                archive_path,
                report,
            } => {
                let bytes = tokio::fs::read(archive_path).await?;
                debug!(owner = %owner, job_id = %job.id, bytes = bytes.len(), "archive retrieved");
                Ok(RetrievedArchive {
                    job_id: job.id,
                    bytes,
                    report: report.clone(),
                })
            }
            _ => Err(JobError::NotReady {
                owner: owner.clone(),
                state: job.progression(),
            }
            .into()),
        }
    }

    /// Ask the owner's running job to stop
    ///
    /// Cancellation is cooperative: the job settles in the error state once its
    /// in-flight fetches have been abandoned.
    pub async fn cancel(&self, owner: &OwnerKey) -> Result<JobId> {
        let not_found = || JobError::NotFound {
            owner: owner.clone(),
        };
        let slot = self.slot(owner).await.ok_or_else(not_found)?;
        let current = slot.lock().await;
        let job = current.as_ref().ok_or_else(not_found)?;

        if !job.is_running() {
            return Err(JobError::NotRunning {
                owner: owner.clone(),
                state: job.progression(),
            }
            .into());
        }

        job.cancel.cancel();
        info!(owner = %owner, job_id = %job.id, "job cancellation requested");
        Ok(job.id)
    }

    /// Remove finished jobs whose finish time is before `cutoff`
    ///
    /// Their archives are deleted. Running jobs are never evicted, and a slot
    /// another caller is working on is skipped until the next sweep. Returns the
    /// number of jobs removed.
    pub async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let evicted = {
            let mut slots = self.slots.write().await;
            let mut evicted = Vec::new();
            slots.retain(|owner, slot| {
                // New handles are only cloned under the map lock
                let shared = Arc::strong_count(slot) > 1;
                let Ok(mut current) = slot.try_lock() else {
                    return true;
                };
                let expired = current
                    .as_ref()
                    .filter(|job| job.finished_before(cutoff))
                    .map(|job| {
                        (
                            owner.clone(),
                            job.id,
                            job.archive_path().map(Path::to_path_buf),
                        )
                    });
                if let Some(entry) = expired {
                    evicted.push(entry);
                    *current = None;
                }
                current.is_some() || shared
            });
            evicted
        };

        for (owner, job_id, archive_path) in &evicted {
            if let Some(path) = archive_path {
                remove_archive(path).await;
            }
            info!(owner = %owner, job_id = %job_id, "job evicted");
            self.emit(Event::JobEvicted {
                owner: owner.clone(),
                job_id: *job_id,
            });
        }

        evicted.len()
    }

    /// Number of jobs whose pipeline is still running
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Stop accepting submissions and signal every running job to stop
    pub async fn cancel_all(&self) {
        let active = self.active.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        debug!(active_count = active.len(), "cancelling all running jobs");
        for token in active.values() {
            token.cancel();
        }
    }

    /// Wait until no job pipeline is running
    pub async fn wait_for_active(&self) {
        loop {
            let active_count = self.active_count().await;
            if active_count == 0 {
                return;
            }
            debug!(active_count, "waiting for running jobs to settle");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn slot(&self, owner: &OwnerKey) -> Option<Slot> {
        self.slots.read().await.get(owner).cloned()
    }

    /// The owner's slot, adding an empty one if needed
    async fn slot_or_insert(&self, owner: &OwnerKey) -> Slot {
        if let Some(slot) = self.slot(owner).await {
            return slot;
        }
        self.slots
            .write()
            .await
            .entry(owner.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    async fn run_job(
        self,
        owner: OwnerKey,
        id: JobId,
        urls: Vec<String>,
        format_override: Option<OutputFormat>,
        cancel: CancellationToken,
    ) {
        let archive_path = self.settings.work_dir.join(format!("{}.zip", id));
        let pipeline = self.run_pipeline(urls, format_override, archive_path.clone(), &cancel);

        let result = match self.settings.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, pipeline).await {
                Ok(result) => result,
                Err(_) => {
                    // Stop fetch tasks that outlive the dropped pipeline
                    cancel.cancel();
                    Err(Error::TimedOut(limit))
                }
            },
            None => pipeline.await,
        };

        self.finish(&owner, id, archive_path, result).await;
    }

    async fn run_pipeline(
        &self,
        urls: Vec<String>,
        format_override: Option<OutputFormat>,
        archive_path: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<AssemblyReport> {
        let outcomes = self
            .orchestrator
            .fetch_all_with_cancel(&urls, cancel)
            .await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled(
                "job cancelled before the archive was written".into(),
            ));
        }

        let assembler = ArchiveAssembler::new(AssemblyOptions {
            format_override,
            min_content_lines: self.settings.min_content_lines,
        });
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            assemble_unless_cancelled(&assembler, outcomes, &archive_path, &cancel)
        })
        .await
            .map_err(|e| Error::Other(format!("archive task failed: {}", e)))?
    }

    /// Record the pipeline result on the job, if it is still the owner's current job
    async fn finish(
        &self,
        owner: &OwnerKey,
        id: JobId,
        archive_path: PathBuf,
        result: Result<AssemblyReport>,
    ) {
        let settled = match self.slot(owner).await {
            Some(slot) => {
                let mut current = slot.lock().await;
                match current.as_mut() {
                    Some(job) if job.id == id && job.is_running() => {
                        Some(self.settle(job, archive_path.clone(), result))
                    }
                    _ => None,
                }
            }
            None => None,
        };

        self.active.lock().await.remove(&id);

        match settled {
            Some(Progression::Completed) => {}
            Some(_) => remove_archive(&archive_path).await,
            None => {
                warn!(owner = %owner, job_id = %id, "job record replaced before pipeline finished");
                remove_archive(&archive_path).await;
            }
        }
    }

    fn settle(
        &self,
        job: &mut Job,
        archive_path: PathBuf,
        result: Result<AssemblyReport>,
    ) -> Progression {
        match result {
            Ok(report) => {
                self.emit_entry_events(&job.owner, &report);
                let entries = report.included();
                job.complete(archive_path, report);
                info!(owner = %job.owner, job_id = %job.id, entries, "job completed");
                self.emit(Event::JobCompleted {
                    owner: job.owner.clone(),
                    job_id: job.id,
                    entries,
                });
            }
            Err(e) => {
                error!(owner = %job.owner, job_id = %job.id, error = %e, "job failed");
                job.fail(e.to_string());
                self.emit(Event::JobFailed {
                    owner: job.owner.clone(),
                    job_id: job.id,
                    error: e.to_string(),
                });
            }
        }
        job.progression()
    }

    fn emit_entry_events(&self, owner: &OwnerKey, report: &AssemblyReport) {
        for entry in &report.entries {
            let event = match &entry.status {
                EntryStatus::Included { .. } => continue,
                EntryStatus::FetchFailed { detail } => Event::FetchFailed {
                    owner: owner.clone(),
                    index: entry.index,
                    url: entry.source_url.clone(),
                    error: detail.clone(),
                },
                EntryStatus::InsufficientContent { lines, required } => Event::EntryExcluded {
                    owner: owner.clone(),
                    index: entry.index,
                    lines: *lines,
                    required: *required,
                },
            };
            self.emit(event);
        }
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Write the archive, then discard it if the job was abandoned meanwhile
///
/// Runs on a blocking thread that outlives a timed-out pipeline, so the
/// check happens after the file exists.
fn assemble_unless_cancelled(
    assembler: &ArchiveAssembler,
    outcomes: Vec<FetchOutcome>,
    archive_path: &Path,
    cancel: &CancellationToken,
) -> Result<AssemblyReport> {
    let report = assembler.build_to_file(outcomes, archive_path)?;
    if cancel.is_cancelled() {
        if let Err(e) = std::fs::remove_file(archive_path) {
            warn!(path = %archive_path.display(), error = %e, "failed to remove abandoned archive");
        }
        return Err(Error::Cancelled(
            "job cancelled while the archive was being written".into(),
        ));
    }
    Ok(report)
}

/// Delete an archive file, tolerating one that was never written
async fn remove_archive(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "archive deleted"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete archive"),
    }
}
