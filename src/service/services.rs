//! Background service starters.

use super::ArchiveService;

impl ArchiveService {
    /// Start the retention sweeper that evicts finished jobs older than `jobs.retention`
    ///
    /// Without a retention period jobs stay retrievable until resubmission, and
    /// the returned task completes immediately. The sweeper stops on shutdown.
    pub fn start_retention_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let Some(retention) = self.config.jobs.retention else {
            tracing::info!("No retention configured, skipping retention sweeper");
            return tokio::spawn(async {});
        };

        let service = self.clone();
        let sweep_interval = self.config.jobs.sweep_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = service.shutdown_token.cancelled() => {
                        tracing::debug!("retention sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        service.sweep_expired(retention).await;
                    }
                }
            }
        });

        tracing::info!(
            retention_secs = retention.as_secs(),
            sweep_interval_secs = sweep_interval.as_secs(),
            "Retention sweeper background task started"
        );

        handle
    }

    /// Evict every finished job older than `retention`, returning how many were removed
    pub async fn sweep_expired(&self, retention: std::time::Duration) -> usize {
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|ttl| chrono::Utc::now().checked_sub_signed(ttl));
        let Some(cutoff) = cutoff else {
            tracing::warn!(
                retention_secs = retention.as_secs(),
                "retention period out of range, nothing evicted"
            );
            return 0;
        };

        let evicted = self.tracker.evict_finished_before(cutoff).await;
        if evicted > 0 {
            tracing::info!(evicted, "retention sweep evicted finished jobs");
        }
        evicted
    }
}
