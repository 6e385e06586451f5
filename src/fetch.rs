//! Concurrent fetching of URL batches
//!
//! [`FetchOrchestrator`] fans a batch of URLs out to tasks, bounded by a worker
//! pool shared by every batch in the process, and fans back in once all of them
//! have settled. Outcomes come back in input order no matter which fetch
//! finished first, because fallback entry names are derived from positions.

use crate::config::FetchConfig;
use crate::transport::{Transport, TransportError};
use crate::types::FetchOutcome;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fetches batches of URLs through a bounded, reusable worker pool
#[derive(Clone)]
pub struct FetchOrchestrator {
    transport: Arc<dyn Transport>,
    /// Worker pool permits, shared across all batches
    permits: Arc<Semaphore>,
    pool_size: usize,
    fetch_timeout: Duration,
}

impl FetchOrchestrator {
    /// Create an orchestrator with `pool_size` concurrent fetches and a per-fetch timeout
    ///
    /// A pool size of zero is treated as one.
    pub fn new(transport: Arc<dyn Transport>, pool_size: usize, fetch_timeout: Duration) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            transport,
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            fetch_timeout,
        }
    }

    /// Create an orchestrator from the fetch section of the configuration
    pub fn from_config(transport: Arc<dyn Transport>, config: &FetchConfig) -> Self {
        Self::new(transport, config.worker_pool_size, config.fetch_timeout)
    }

    /// Maximum number of fetches in flight at once
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch every URL and return one outcome per URL, in input order
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<FetchOutcome> {
        self.fetch_all_with_cancel(urls, &CancellationToken::new())
            .await
    }

    /// Like [`fetch_all`](Self::fetch_all), abandoning unfinished fetches once `cancel` fires
    ///
    /// Cancelled fetches are reported as failed outcomes; the call still returns
    /// exactly one outcome per URL.
    pub async fn fetch_all_with_cancel(
        &self,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Vec<FetchOutcome> {
        info!(
            urls = urls.len(),
            pool_size = self.pool_size,
            transport = self.transport.name(),
            "fetching batch"
        );

        let handles: Vec<_> = urls
            .iter()
            .enumerate()
            .map(|(index, url)| {
                tokio::spawn(fetch_one(
                    index,
                    url.clone(),
                    Arc::clone(&self.transport),
                    Arc::clone(&self.permits),
                    self.fetch_timeout,
                    cancel.clone(),
                ))
            })
            .collect();

        // join_all yields results in handle order, which is input order
        let outcomes: Vec<FetchOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(urls)
            .enumerate()
            .map(|(index, (joined, url))| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(index, url = %url, error = %e, "fetch task aborted");
                    FetchOutcome::failed(index, url.clone(), format!("fetch task failed: {}", e))
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        debug!(
            succeeded = outcomes.len() - failed,
            failed, "batch settled"
        );

        outcomes
    }
}

async fn fetch_one(
    index: usize,
    url: String,
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
    fetch_timeout: Duration,
    cancel: CancellationToken,
) -> FetchOutcome {
    let fetch = async {
        let _permit = permits
            .acquire()
            .await
            .map_err(|_| TransportError::Cancelled { url: url.clone() })?;

        match tokio::time::timeout(fetch_timeout, transport.get(&url)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                url: url.clone(),
                after: fetch_timeout,
            }),
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled { url: url.clone() }),
        result = fetch => result,
    };

    match result {
        Ok(resource) => {
            debug!(index, url = %url, bytes = resource.bytes.len(), "fetch succeeded");
            FetchOutcome::fetched(index, url, resource.bytes, resource.content_type)
        }
        Err(e) => {
            warn!(index, url = %url, error = %e, "fetch failed");
            FetchOutcome::failed(index, url, e.to_string())
        }
    }
}
