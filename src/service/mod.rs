//! The archive service facade, split into focused submodules.
//!
//! The `ArchiveService` struct and its methods are organized by domain:
//! - [`requests`] - Synchronous downloads, collation and background job operations
//! - [`lifecycle`] - Shutdown coordination
//! - [`services`] - Background service starters (retention sweeper)

mod lifecycle;
mod requests;
mod services;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use requests::ArchiveDownload;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::FetchOrchestrator;
use crate::jobs::{JobTracker, TrackerSettings};
use crate::transport::{HttpTransport, Transport};
use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Main service instance (cloneable - all fields are Arc-wrapped or cheap handles)
#[derive(Clone)]
pub struct ArchiveService {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Fetch pool shared by the synchronous path and every background job
    pub(crate) orchestrator: FetchOrchestrator,
    /// Per-owner background jobs
    pub(crate) tracker: JobTracker,
    /// Flag to indicate whether new work is accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled on shutdown; synchronous requests fetch under child tokens
    pub(crate) shutdown_token: CancellationToken,
}

impl ArchiveService {
    /// Create a new ArchiveService fetching over HTTP
    ///
    /// Validates the configuration, creates the archive work directory and
    /// builds the shared HTTP client.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.fetch.fetch_timeout, &config.fetch.user_agent)?;
        Self::with_transport(config, Arc::new(transport)).await
    }

    /// Create a new ArchiveService over a custom transport
    pub async fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.archive.work_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create archive directory '{}': {}",
                        config.archive.work_dir.display(),
                        e
                    ),
                ))
            })?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let orchestrator = FetchOrchestrator::from_config(transport.clone(), &config.fetch);
        tracing::info!(
            transport = transport.name(),
            pool_size = orchestrator.pool_size(),
            work_dir = %config.archive.work_dir.display(),
            "archive service initialized"
        );

        let tracker = JobTracker::new(
            orchestrator.clone(),
            TrackerSettings::from_config(&config),
            event_tx.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            event_tx,
            orchestrator,
            tracker,
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events, it will receive a
    /// `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use service_archiver::{ArchiveService, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let service = ArchiveService::new(Config::default()).await?;
    ///
    ///     let mut events = service.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "job event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Spawn the REST API server on the configured bind address
    ///
    /// The returned handle resolves when the server stops.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let service = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
