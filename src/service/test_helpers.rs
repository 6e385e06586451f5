//! Shared test helpers for creating ArchiveService instances and scripted transports in tests.

use crate::config::Config;
use crate::service::ArchiveService;
use crate::transport::{FetchedResource, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::Semaphore;

/// How the scripted transport answers one URL
#[derive(Clone)]
enum Script {
    Respond {
        body: Vec<u8>,
        content_type: Option<String>,
        delay: Duration,
    },
    /// Waits for a permit on `gate` before answering
    Gated {
        gate: Arc<Semaphore>,
        body: Vec<u8>,
        content_type: Option<String>,
    },
    Fail {
        reason: String,
    },
}

/// In-memory transport answering from a per-URL script
///
/// URLs without a script answer HTTP 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(
        self,
        url: &str,
        body: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Self {
        self.respond_after(url, body, content_type, Duration::ZERO)
    }

    pub(crate) fn respond_after(
        mut self,
        url: &str,
        body: impl Into<Vec<u8>>,
        content_type: Option<&str>,
        delay: Duration,
    ) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Respond {
                body: body.into(),
                content_type: content_type.map(str::to_string),
                delay,
            },
        );
        self
    }

    /// Answer `url` only once a permit is added to `gate`
    pub(crate) fn gated(
        mut self,
        url: &str,
        gate: Arc<Semaphore>,
        body: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Gated {
                gate,
                body: body.into(),
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }

    pub(crate) fn fail(mut self, url: &str, reason: &str) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Fail {
                reason: reason.to_string(),
            },
        );
        self
    }

    /// Total number of `get` calls made
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `get` calls that were running at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, url: &str) -> Result<FetchedResource, TransportError> {
        match self.scripts.get(url).cloned() {
            Some(Script::Respond {
                body,
                content_type,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(FetchedResource {
                    bytes: body,
                    content_type,
                })
            }
            Some(Script::Gated {
                gate,
                body,
                content_type,
            }) => {
                let _permit = gate.acquire().await.map_err(|_| TransportError::Cancelled {
                    url: url.to_string(),
                })?;
                Ok(FetchedResource {
                    bytes: body,
                    content_type,
                })
            }
            Some(Script::Fail { reason }) => Err(TransportError::Connect {
                url: url.to_string(),
                reason,
            }),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<FetchedResource, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.answer(url).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Config rooted in a fresh temp dir with short timeouts
pub(crate) fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.archive.work_dir = temp_dir.path().join("archives");
    config.fetch.worker_pool_size = 4;
    config.fetch.fetch_timeout = Duration::from_secs(5);
    config.jobs.job_timeout = Some(Duration::from_secs(10));
    config.jobs.shutdown_grace = Duration::from_secs(2);
    config
}

/// Helper to create a test ArchiveService over a scripted transport.
/// Returns the service and the tempdir (which must be kept alive).
pub(crate) async fn create_test_service(
    transport: ScriptedTransport,
) -> (ArchiveService, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    let service = ArchiveService::with_transport(config, Arc::new(transport))
        .await
        .unwrap();
    (service, temp_dir)
}

/// Entry names and contents of a zip archive, in archive order
pub(crate) fn read_entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).unwrap();
            (file.name().to_string(), contents)
        })
        .collect()
}

/// Poll until `check` holds or two seconds pass
pub(crate) async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
