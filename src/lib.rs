//! # service-archiver
//!
//! Fetches batches of web-service URLs concurrently and packages the responses
//! into zip archives.
//!
//! Two ways in:
//! - **Synchronous** - [`ArchiveService::submit_sync`] fetches everything and
//!   returns the finished archive.
//! - **Background jobs** - [`ArchiveService::submit_async`] starts a job keyed
//!   by an owner (typically an email address); the owner polls with
//!   [`ArchiveService::poll_status`] and collects the archive with
//!   [`ArchiveService::retrieve_result`]. An owner has at most one job in
//!   progress at a time.
//!
//! A URL that fails to fetch, or whose tabular payload has fewer than
//! `archive.min_content_lines` lines, is left out of the archive and recorded
//! in its [`AssemblyReport`]. It never fails the batch.
//!
//! ## Quick Start
//!
//! ```no_run
//! use service_archiver::{ArchiveService, Config, Progression};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ArchiveService::new(Config::default()).await?;
//!
//!     let urls = vec![
//!         "https://maps.example.com/wfs?typeName=boreholes&outputFormat=csv".to_string(),
//!         "https://maps.example.com/wfs?typeName=faults&outputFormat=csv".to_string(),
//!     ];
//!
//!     // Build the archive now
//!     let download = service.submit_sync(&urls, None, None).await?;
//!     std::fs::write(&download.display_name, &download.bytes)?;
//!
//!     // Or hand it to a background job
//!     service.submit_async("someone@example.com", urls, Some("csv")).await?;
//!     while service.poll_status("someone@example.com").await? == Progression::InProgress {
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     }
//!     let archive = service.retrieve_result("someone@example.com").await?;
//!     println!("{}: {} bytes", archive.display_name, archive.bytes.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod jobs;
pub mod mime;
pub mod service;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use archive::{ArchiveAssembler, AssemblyOptions, AssemblyReport};
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, JobError, Result, ToHttpStatus};
pub use fetch::FetchOrchestrator;
pub use jobs::JobTracker;
pub use mime::OutputFormat;
pub use service::{ArchiveDownload, ArchiveService};
pub use transport::{HttpTransport, Transport, TransportError};
pub use types::{
    EntryReport, EntryStatus, Event, FetchOutcome, FetchResult, JobId, JobSnapshot, OwnerKey,
    Progression, SubmitStatus,
};

/// Wait for SIGTERM or SIGINT, then shut the service down gracefully
///
/// # Example
///
/// ```no_run
/// use service_archiver::{ArchiveService, Config, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = Arc::new(ArchiveService::new(Config::default()).await?);
///     let _api = service.spawn_api_server();
///     let _sweeper = service.start_retention_sweeper();
///
///     run_with_shutdown(&service).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: &ArchiveService) -> Result<()> {
    wait_for_signal().await;
    service.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
