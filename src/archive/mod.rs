//! Archive assembly
//!
//! Turns an ordered list of [`FetchOutcome`]s into a single zip archive. Each
//! outcome is reported back as an [`EntryReport`], so callers can see which
//! URLs were written, which failed to fetch and which were left out for being
//! too short.

use crate::error::Result;
use crate::mime::{ContentRule, OutputFormat};
use crate::types::{EntryReport, EntryStatus, FetchOutcome, FetchResult};
use crate::utils::{claim_unique_name, count_lines, filename_from_url, timestamped_name};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Options applied to every outcome of one assembly
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Format forced on every entry, regardless of the reported content type
    pub format_override: Option<OutputFormat>,
    /// Minimum lines for line-oriented formats; 0 disables the check
    pub min_content_lines: usize,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            format_override: None,
            min_content_lines: 2,
        }
    }
}

/// What went into an archive
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Whether any entry name contains "csv"
    pub contains_csv: bool,
    /// One report per input outcome, in input order
    pub entries: Vec<EntryReport>,
}

impl AssemblyReport {
    /// Number of entries written to the archive
    pub fn included(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.included_name().is_some())
            .count()
    }
}

/// An archive built in memory
#[derive(Clone, Debug)]
pub struct AssembledArchive {
    /// The finished zip file
    pub bytes: Vec<u8>,
    /// What went into it
    pub report: AssemblyReport,
}

/// Builds zip archives from fetch outcomes
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveAssembler {
    options: AssemblyOptions,
}

impl ArchiveAssembler {
    /// Create an assembler with the given options
    pub fn new(options: AssemblyOptions) -> Self {
        Self { options }
    }

    /// The options in effect
    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Build the archive in memory
    pub fn build(&self, outcomes: Vec<FetchOutcome>) -> Result<AssembledArchive> {
        self.build_at(outcomes, Local::now())
    }

    /// Build the archive in memory, naming unnamed entries after `now`
    pub fn build_at(
        &self,
        outcomes: Vec<FetchOutcome>,
        now: DateTime<Local>,
    ) -> Result<AssembledArchive> {
        let (cursor, report) = self.build_into(Cursor::new(Vec::new()), outcomes, now)?;
        Ok(AssembledArchive {
            bytes: cursor.into_inner(),
            report,
        })
    }

    /// Build the archive straight into a file at `path`
    ///
    /// A partially written file is removed if assembly fails.
    pub fn build_to_file(&self, outcomes: Vec<FetchOutcome>, path: &Path) -> Result<AssemblyReport> {
        let file = File::create(path)?;
        match self.build_into(BufWriter::new(file), outcomes, Local::now()) {
            Ok((mut writer, report)) => {
                writer.flush()?;
                Ok(report)
            }
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %remove_err, "failed to remove partial archive");
                }
                Err(e)
            }
        }
    }

    /// Write one entry per accepted outcome into `writer` and finish the archive
    ///
    /// Outcomes are consumed in order; each payload is dropped as soon as it has
    /// been written.
    pub fn build_into<W: Write + Seek>(
        &self,
        writer: W,
        outcomes: Vec<FetchOutcome>,
        now: DateTime<Local>,
    ) -> Result<(W, AssemblyReport)> {
        let mut zip = zip::ZipWriter::new(writer);
        let file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut used_names = HashSet::new();
        let mut entries = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            let FetchOutcome {
                index,
                source_url,
                result,
            } = outcome;

            let (payload, content_type) = match result {
                FetchResult::Fetched {
                    payload,
                    content_type,
                } => (payload, content_type),
                FetchResult::Failed { detail } => {
                    debug!(index, url = %source_url, "skipping failed fetch");
                    entries.push(EntryReport {
                        index,
                        source_url,
                        status: EntryStatus::FetchFailed { detail },
                    });
                    continue;
                }
            };

            let format = self
                .options
                .format_override
                .or_else(|| content_type.as_deref().and_then(OutputFormat::from_mime));

            if let Some(status) = self.check_content(format, &payload) {
                warn!(index, url = %source_url, ?status, "excluding entry");
                entries.push(EntryReport {
                    index,
                    source_url,
                    status,
                });
                continue;
            }

            // Positions in names are 1-based
            let position = index + 1;
            let stem = filename_from_url(&source_url)
                .unwrap_or_else(|| timestamped_name(position, &now));
            let name = claim_unique_name(
                &mut used_names,
                &stem,
                format.map(|f| f.extension()),
                position,
            );

            zip.start_file(name.as_str(), file_options)?;
            zip.write_all(&payload)?;
            debug!(index, name = %name, bytes = payload.len(), "wrote archive entry");

            entries.push(EntryReport {
                index,
                source_url,
                status: EntryStatus::Included { name },
            });
        }

        let writer = zip.finish()?;

        let report = AssemblyReport {
            contains_csv: entries
                .iter()
                .filter_map(EntryReport::included_name)
                .any(|name| name.contains("csv")),
            entries,
        };
        info!(
            included = report.included(),
            total = report.entries.len(),
            contains_csv = report.contains_csv,
            "archive assembled"
        );

        Ok((writer, report))
    }

    fn check_content(&self, format: Option<OutputFormat>, payload: &[u8]) -> Option<EntryStatus> {
        let required = self.options.min_content_lines;
        match format.map(|f| f.content_rule()) {
            Some(ContentRule::MinimumLines) if required > 0 => {
                let lines = count_lines(payload);
                (lines < required).then_some(EntryStatus::InsufficientContent { lines, required })
            }
            _ => None,
        }
    }
}
