//! Health probing and the reachability-driven replay trigger

use crate::common::*;
use complaint_sync::client::auth::MemoryCredentialStore;
use complaint_sync::client::local_db::LocalDatabase;
use complaint_sync::client::offline::SyncEvent;
use complaint_sync::client::sync::ConnectivityMonitor;
use complaint_sync::client::SyncClient;
use complaint_sync::shared::WriteMethod;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_probe_success_marks_backend_reachable() {
    let server = healthy_backend().await;
    let monitor = ConnectivityMonitor::new(&config_for(&server)).unwrap();

    assert!(!monitor.is_effectively_online());
    assert!(monitor.probe_once().await);
    assert!(monitor.is_effectively_online());
}

#[tokio::test]
async fn test_probe_error_status_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let monitor = ConnectivityMonitor::new(&config_for(&server)).unwrap();
    monitor.set_backend_reachable(true);

    assert!(!monitor.probe_once().await);
    assert!(!monitor.state().backend_reachable);
}

#[tokio::test]
async fn test_slow_probe_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let monitor = ConnectivityMonitor::new(&config_for(&server)).unwrap();

    assert!(!monitor.probe_once().await);
}

#[tokio::test]
async fn test_transport_offline_overrides_reachable_backend() {
    let server = healthy_backend().await;
    let monitor = ConnectivityMonitor::new(&config_for(&server)).unwrap();
    monitor.probe_once().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = monitor.on_reachability_change(move |state| {
        let _ = tx.send(state.effective_online());
    });

    monitor.set_transport_online(false);
    assert_eq!(rx.recv().await, Some(false));
    // Probe success while the link is down does not flip anything
    monitor.probe_once().await;
    monitor.set_transport_online(true);
    assert_eq!(rx.recv().await, Some(true));

    watcher.abort();
}

#[tokio::test]
async fn test_start_probes_immediately() {
    let server = healthy_backend().await;
    let monitor = Arc::new(ConnectivityMonitor::new(&config_for(&server)).unwrap());
    let mut state = monitor.subscribe();

    monitor.start();
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| s.effective_online()))
        .await
        .unwrap()
        .unwrap();
    monitor.stop();
}

#[tokio::test]
async fn test_queued_writes_replay_when_backend_comes_back() {
    let server = healthy_backend().await;
    let store = ComplaintStore::with_records(vec![json!({"id": 21, "status": "open"})]);
    store.mount(&server).await;

    let client = SyncClient::assemble(
        config_for(&server),
        Arc::new(MemoryCredentialStore::new()),
        LocalDatabase::in_memory().await.unwrap(),
    )
    .unwrap();
    let mut events = client.offline().subscribe();

    // Backend not probed yet, so this is queued
    let outcome = client
        .offline()
        .write(WriteMethod::Put, "/complaints/21", Some(json!({"status": "closed"})), vec![])
        .await
        .unwrap();
    assert!(outcome.is_pending());

    client.start();
    expect_event!(events, SyncEvent::Replayed { .. });
    client.stop();

    assert_eq!(store.get(21).unwrap()["status"], "closed");
    assert_eq!(client.offline().status().await.unwrap().pending, 0);
}
