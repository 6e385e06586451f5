//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::ArchiveService;

impl ArchiveService {
    /// Gracefully shut down the service
    ///
    /// 1. Stops accepting new requests
    /// 2. Cancels running jobs and in-flight synchronous fetches
    /// 3. Waits for running jobs to settle, up to `jobs.shutdown_grace`
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Jobs that were cancelled settle in the error state. Finished archives
    /// are left on disk.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new requests");

        self.shutdown_token.cancel();
        self.tracker.cancel_all().await;

        let grace = self.config.jobs.shutdown_grace;
        match tokio::time::timeout(grace, self.tracker.wait_for_active()).await {
            Ok(()) => tracing::info!("All running jobs settled"),
            Err(_) => tracing::warn!(
                remaining = self.tracker.active_count().await,
                "Timeout waiting for jobs to settle, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether the service still accepts new requests
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(std::sync::atomic::Ordering::SeqCst)
    }
}
