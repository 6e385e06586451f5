//! Synchronous downloads, collation and background job operations.

use crate::archive::{ArchiveAssembler, AssemblyOptions, AssemblyReport};
use crate::error::{Error, JobError, Result};
use crate::mime::OutputFormat;
use crate::types::{FetchOutcome, JobId, JobSnapshot, OwnerKey, Progression, SubmitStatus};
use crate::utils::{collation_display_name, service_display_name};
use std::sync::atomic::Ordering;

use super::ArchiveService;

/// A finished archive ready to hand to the caller
#[derive(Clone, Debug)]
pub struct ArchiveDownload {
    /// The zip file contents
    pub bytes: Vec<u8>,
    /// Filename to present to the user
    pub display_name: String,
    /// What went into the archive
    pub report: AssemblyReport,
}

impl ArchiveDownload {
    /// Whether any entry name contains "csv"
    pub fn contains_csv(&self) -> bool {
        self.report.contains_csv
    }
}

/// Interpret a caller-supplied format override
///
/// Blank values mean no override. Values that name no known format are ignored
/// so the content type decides, as it would without an override.
pub(crate) fn parse_format_override(raw: Option<&str>) -> Option<OutputFormat> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    let format = OutputFormat::parse(raw);
    if format.is_none() {
        tracing::warn!(output_format = raw, "ignoring unknown output format");
    }
    format
}

impl ArchiveService {
    /// Fetch every URL and return the finished archive
    ///
    /// Runs the whole pipeline before returning. Individual URLs that fail or
    /// are too short are left out and reported in the archive's report; only a
    /// failure to build the archive itself is an error.
    pub async fn submit_sync(
        &self,
        urls: &[String],
        format_override: Option<&str>,
        filename: Option<&str>,
    ) -> Result<ArchiveDownload> {
        let format_override = parse_format_override(format_override);
        let (bytes, report) = self
            .build_inline(
                urls,
                AssemblyOptions {
                    format_override,
                    min_content_lines: self.config.archive.min_content_lines,
                },
            )
            .await?;

        let display_name = match filename.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) => collation_display_name(Some(name)),
            None => service_display_name(
                report.contains_csv || format_override == Some(OutputFormat::Csv),
            )
            .to_string(),
        };

        tracing::info!(
            urls = urls.len(),
            entries = report.included(),
            display_name = %display_name,
            "synchronous archive ready"
        );
        Ok(ArchiveDownload {
            bytes,
            display_name,
            report,
        })
    }

    /// Archive every successful response as-is under a caller-chosen filename
    ///
    /// No content validation and no format override: each entry takes its
    /// extension from the response content type.
    pub async fn collate(&self, urls: &[String], filename: Option<&str>) -> Result<ArchiveDownload> {
        let (bytes, report) = self
            .build_inline(
                urls,
                AssemblyOptions {
                    format_override: None,
                    min_content_lines: 0,
                },
            )
            .await?;

        let display_name = collation_display_name(filename);
        tracing::info!(
            urls = urls.len(),
            entries = report.included(),
            display_name = %display_name,
            "collated archive ready"
        );
        Ok(ArchiveDownload {
            bytes,
            display_name,
            report,
        })
    }

    /// Start a background job for `owner`
    ///
    /// Returns [`SubmitStatus::Conflict`] when the owner's previous job is still
    /// running; nothing is created in that case.
    pub async fn submit_async(
        &self,
        owner: &str,
        urls: Vec<String>,
        format_override: Option<&str>,
    ) -> Result<SubmitStatus> {
        self.ensure_accepting()?;
        let owner = OwnerKey::parse(owner)?;
        let format_override = parse_format_override(format_override);

        match self.tracker.submit(owner, urls, format_override).await {
            Ok(_) => Ok(SubmitStatus::Accepted),
            Err(Error::Job(JobError::AlreadyRunning { owner })) => {
                tracing::info!(owner = %owner, "submission rejected, job already in progress");
                Ok(SubmitStatus::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    /// Current progression of the owner's job
    pub async fn poll_status(&self, owner: &str) -> Result<Progression> {
        let owner = OwnerKey::parse(owner)?;
        Ok(self.tracker.poll(&owner).await)
    }

    /// The owner's finished archive
    ///
    /// Fails with [`JobError::NotFound`] when there is no job and
    /// [`JobError::NotReady`] when it has not completed.
    pub async fn retrieve_result(&self, owner: &str) -> Result<ArchiveDownload> {
        let owner = OwnerKey::parse(owner)?;
        let archive = self.tracker.retrieve(&owner).await?;
        Ok(ArchiveDownload {
            bytes: archive.bytes,
            display_name: service_display_name(archive.report.contains_csv).to_string(),
            report: archive.report,
        })
    }

    /// Full snapshot of the owner's job, if any
    pub async fn status(&self, owner: &str) -> Result<Option<JobSnapshot>> {
        let owner = OwnerKey::parse(owner)?;
        Ok(self.tracker.status(&owner).await)
    }

    /// Ask the owner's running job to stop
    pub async fn cancel(&self, owner: &str) -> Result<JobId> {
        let owner = OwnerKey::parse(owner)?;
        self.tracker.cancel(&owner).await
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Fetch and assemble on the caller's task
    async fn build_inline(
        &self,
        urls: &[String],
        options: AssemblyOptions,
    ) -> Result<(Vec<u8>, AssemblyReport)> {
        self.ensure_accepting()?;
        if urls.is_empty() {
            return Err(Error::Validation(
                "at least one service URL is required".into(),
            ));
        }

        let cancel = self.shutdown_token.child_token();
        let outcomes: Vec<FetchOutcome> = self
            .orchestrator
            .fetch_all_with_cancel(urls, &cancel)
            .await;
        if cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let assembler = ArchiveAssembler::new(options);
        let archive = tokio::task::spawn_blocking(move || assembler.build(outcomes))
            .await
            .map_err(|e| Error::Other(format!("archive task failed: {}", e)))??;

        Ok((archive.bytes, archive.report))
    }
}
