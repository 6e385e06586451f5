//! Custom test assertions for end-to-end tests

use std::io::{Cursor, Read};
use std::time::Duration;
use service_archiver::{ArchiveService, Event, OwnerKey};
use tokio::sync::broadcast;

/// Result of waiting for a job to settle
#[derive(Debug)]
pub enum WaitResult {
    /// The archive is ready, with this many entries
    Completed(usize),
    /// The job ended in the error state
    Failed(String),
    /// Timeout waiting for the job
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for the owner's job to complete or fail
///
/// `events` must be subscribed before the job is submitted, or the terminal
/// event can be missed.
pub async fn wait_for_job(
    events: &mut broadcast::Receiver<Event>,
    owner: &str,
    timeout: Duration,
) -> WaitResult {
    let owner = OwnerKey::parse(owner).unwrap();

    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::JobCompleted {
                    owner: event_owner,
                    entries,
                    ..
                }) if event_owner == owner => return WaitResult::Completed(entries),
                Ok(Event::JobFailed {
                    owner: event_owner,
                    error,
                    ..
                }) if event_owner == owner => return WaitResult::Failed(error),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Entry names and contents of a zip archive, in archive order
pub fn zip_entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
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

/// Assert the owner's job is not retrievable yet or at all
pub async fn assert_not_retrievable(service: &ArchiveService, owner: &str) {
    let result = service.retrieve_result(owner).await;
    assert!(result.is_err(), "archive for {owner} should not be retrievable");
}
