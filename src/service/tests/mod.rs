use super::test_helpers::{
    ScriptedTransport, create_test_service, read_entries, test_config, wait_until,
};
use super::*;
use crate::error::JobError;
use crate::types::{Progression, SubmitStatus};
use std::time::Duration;
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    read_entries(bytes).into_iter().map(|(name, _)| name).collect()
}

/// Wait until the owner's job reaches a terminal state and return it
async fn settle(service: &ArchiveService, owner: &str) -> Progression {
    let settled = wait_until(|| {
        let service = service.clone();
        let owner = owner.to_string();
        async move {
            service
                .poll_status(&owner)
                .await
                .map(|state| state.is_terminal())
                .unwrap_or(false)
        }
    })
    .await;
    assert!(settled, "job for {owner} did not settle");
    service.poll_status(owner).await.unwrap()
}

fn three_urls_second_failing() -> ScriptedTransport {
    ScriptedTransport::new()
        .respond("http://svc/wfs?layer=1", "id,name\n1,a\n", Some("text/csv"))
        .fail("http://svc/wfs?layer=2", "connection reset")
        .respond("http://svc/wfs?layer=3", "id,name\n3,c\n", Some("text/csv"))
}

// ---------------------------------------------------------------------------
// Synchronous path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_download_skips_failed_url() {
    let (service, _dir) = create_test_service(three_urls_second_failing()).await;

    let download = service
        .submit_sync(
            &urls(&[
                "http://svc/wfs?layer=1",
                "http://svc/wfs?layer=2",
                "http://svc/wfs?layer=3",
            ]),
            None,
            None,
        )
        .await
        .unwrap();

    let names = entry_names(&download.bytes);
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("1_") && names[0].ends_with(".csv"));
    assert!(names[1].starts_with("3_") && names[1].ends_with(".csv"));
    assert!(download.contains_csv());
    assert_eq!(download.display_name, "CSVDownload.zip");
}

#[tokio::test]
async fn sync_csv_override_selects_csv_display_name() {
    let transport = ScriptedTransport::new().respond(
        "http://svc/wfs?outputFormat=csv",
        "a,b\n1,2\n",
        Some("text/plain"),
    );
    let (service, _dir) = create_test_service(transport).await;

    let download = service
        .submit_sync(&urls(&["http://svc/wfs?outputFormat=csv"]), Some("csv"), None)
        .await
        .unwrap();

    assert!(download.contains_csv());
    assert_eq!(download.display_name, "CSVDownload.zip");
    assert!(entry_names(&download.bytes)[0].ends_with(".csv"));
}

#[tokio::test]
async fn sync_non_csv_download_uses_gml_display_name() {
    let transport = ScriptedTransport::new().respond(
        "http://svc/features.gml",
        "<gml:FeatureCollection/>",
        Some("application/gml+xml"),
    );
    let (service, _dir) = create_test_service(transport).await;

    let download = service
        .submit_sync(&urls(&["http://svc/features.gml"]), None, None)
        .await
        .unwrap();

    assert_eq!(entry_names(&download.bytes), vec!["features.gml"]);
    assert_eq!(download.display_name, "GMLDownload.zip");
}

#[tokio::test]
async fn sync_explicit_filename_wins() {
    let transport =
        ScriptedTransport::new().respond("http://svc/a.csv", "h\n1\n", Some("text/csv"));
    let (service, _dir) = create_test_service(transport).await;

    let download = service
        .submit_sync(&urls(&["http://svc/a.csv"]), None, Some("boreholes"))
        .await
        .unwrap();

    assert_eq!(download.display_name, "boreholes.zip");
}

#[tokio::test]
async fn sync_with_no_urls_is_a_validation_error() {
    let (service, _dir) = create_test_service(ScriptedTransport::new()).await;

    let result = service.submit_sync(&[], None, None).await;

    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn collate_keeps_short_payloads_and_names_by_filename() {
    let transport = ScriptedTransport::new()
        .respond("http://svc/one.csv", "header only\n", Some("text/csv"))
        .respond("http://svc/map", "PNG", Some("image/png"));
    let (service, _dir) = create_test_service(transport).await;
    let batch = urls(&["http://svc/one.csv", "http://svc/map"]);

    let named = service.collate(&batch, Some("layers")).await.unwrap();
    let unnamed = service.collate(&batch, None).await.unwrap();

    let names = entry_names(&named.bytes);
    assert_eq!(names[0], "one.csv");
    assert!(names[1].starts_with("2_") && names[1].ends_with(".png"));
    assert_eq!(named.display_name, "layers.zip");
    assert_eq!(unnamed.display_name, "DataDownload.zip");
}

// ---------------------------------------------------------------------------
// Asynchronous path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn async_job_completes_and_is_retrievable() {
    let (service, _dir) = create_test_service(three_urls_second_failing()).await;
    let owner = "someone@example.com";

    let status = service
        .submit_async(
            owner,
            urls(&[
                "http://svc/wfs?layer=1",
                "http://svc/wfs?layer=2",
                "http://svc/wfs?layer=3",
            ]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(status, SubmitStatus::Accepted);
    assert_eq!(settle(&service, owner).await, Progression::Completed);

    let download = service.retrieve_result(owner).await.unwrap();
    assert_eq!(entry_names(&download.bytes).len(), 2);
    assert_eq!(download.display_name, "CSVDownload.zip");

    let again = service.retrieve_result(owner).await.unwrap();
    assert_eq!(download.bytes, again.bytes);
}

#[tokio::test]
async fn async_submit_conflicts_while_running() {
    let gate = Arc::new(Semaphore::new(0));
    let transport =
        ScriptedTransport::new().gated("http://svc/slow.csv", gate.clone(), "h\n1\n", None);
    let (service, _dir) = create_test_service(transport).await;
    let owner = "someone@example.com";
    let batch = urls(&["http://svc/slow.csv"]);

    let first = service
        .submit_async(owner, batch.clone(), None)
        .await
        .unwrap();
    let second = service.submit_async(owner, batch, None).await.unwrap();

    assert_eq!(first, SubmitStatus::Accepted);
    assert_eq!(second, SubmitStatus::Conflict);
    assert_eq!(
        service.poll_status(owner).await.unwrap(),
        Progression::InProgress
    );

    gate.add_permits(10);
    settle(&service, owner).await;
}

#[tokio::test]
async fn poll_and_retrieve_without_submission() {
    let (service, _dir) = create_test_service(ScriptedTransport::new()).await;

    assert_eq!(
        service.poll_status("nobody@example.com").await.unwrap(),
        Progression::NotStarted
    );
    assert!(matches!(
        service.retrieve_result("nobody@example.com").await,
        Err(Error::Job(JobError::NotFound { .. }))
    ));
    assert!(service.status("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn blank_owner_is_rejected() {
    let (service, _dir) = create_test_service(ScriptedTransport::new()).await;

    assert!(matches!(
        service
            .submit_async("  ", urls(&["http://svc/a.csv"]), None)
            .await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.poll_status("").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn cancel_moves_running_job_to_error() {
    let gate = Arc::new(Semaphore::new(0));
    let transport =
        ScriptedTransport::new().gated("http://svc/slow.csv", gate.clone(), "h\n1\n", None);
    let (service, _dir) = create_test_service(transport).await;
    let owner = "someone@example.com";

    service
        .submit_async(owner, urls(&["http://svc/slow.csv"]), None)
        .await
        .unwrap();
    service.cancel(owner).await.unwrap();

    assert_eq!(settle(&service, owner).await, Progression::Error);
    let snapshot = service.status(owner).await.unwrap().unwrap();
    assert!(snapshot.error.is_some());
}

// ---------------------------------------------------------------------------
// Retention and shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_evicts_expired_jobs() {
    let transport =
        ScriptedTransport::new().respond("http://svc/a.csv", "h\n1\n", Some("text/csv"));
    let (service, _dir) = create_test_service(transport).await;
    let owner = "someone@example.com";

    service
        .submit_async(owner, urls(&["http://svc/a.csv"]), None)
        .await
        .unwrap();
    settle(&service, owner).await;

    assert_eq!(service.sweep_expired(Duration::from_secs(3600)).await, 0);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(service.sweep_expired(Duration::ZERO).await, 1);
    assert_eq!(
        service.poll_status(owner).await.unwrap(),
        Progression::NotStarted
    );
}

#[tokio::test]
async fn sweeper_without_retention_exits_immediately() {
    let (service, _dir) = create_test_service(ScriptedTransport::new()).await;

    let handle = service.start_retention_sweeper();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn sweeper_evicts_in_background_and_stops_on_shutdown() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.jobs.retention = Some(Duration::ZERO);
    config.jobs.sweep_interval = Duration::from_millis(20);
    let transport =
        ScriptedTransport::new().respond("http://svc/a.csv", "h\n1\n", Some("text/csv"));
    let service = ArchiveService::with_transport(config, Arc::new(transport))
        .await
        .unwrap();
    let owner = "someone@example.com";

    let handle = service.start_retention_sweeper();
    service
        .submit_async(owner, urls(&["http://svc/a.csv"]), None)
        .await
        .unwrap();

    let evicted = wait_until(|| {
        let service = service.clone();
        async move {
            service.poll_status(owner).await.unwrap() == Progression::NotStarted
        }
    })
    .await;
    assert!(evicted);

    service.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn shutdown_cancels_jobs_and_rejects_new_work() {
    let gate = Arc::new(Semaphore::new(0));
    let transport =
        ScriptedTransport::new().gated("http://svc/slow.csv", gate.clone(), "h\n1\n", None);
    let (service, _dir) = create_test_service(transport).await;
    let mut events = service.subscribe();
    let owner = "someone@example.com";

    service
        .submit_async(owner, urls(&["http://svc/slow.csv"]), None)
        .await
        .unwrap();
    service.shutdown().await.unwrap();

    assert!(!service.is_accepting());
    assert_eq!(
        service.poll_status(owner).await.unwrap(),
        Progression::Error
    );
    assert!(matches!(
        service
            .submit_async("other@example.com", urls(&["http://svc/slow.csv"]), None)
            .await,
        Err(Error::ShuttingDown)
    ));
    assert!(matches!(
        service
            .submit_sync(&urls(&["http://svc/slow.csv"]), None, None)
            .await,
        Err(Error::ShuttingDown)
    ));

    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::Shutdown) {
            saw_shutdown = true;
        }
    }
    assert!(saw_shutdown);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.fetch.worker_pool_size = 0;

    let result = ArchiveService::with_transport(config, Arc::new(ScriptedTransport::new())).await;

    assert!(matches!(result, Err(Error::Config { .. })));
}
