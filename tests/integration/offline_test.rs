//! Offline queue: FIFO replay, failure handling, reconciliation

use crate::common::*;
use assert_matches::assert_matches;
use complaint_sync::client::offline::{SkipReason, SyncEvent};
use complaint_sync::shared::{ListPage, ListQuery, Pagination, WriteMethod};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_offline_edits_replay_in_order() {
    let server = healthy_backend().await;
    let store = ComplaintStore::with_records(vec![json!({"id": 1, "work_order_number": null})]);
    store.mount(&server).await;
    let h = Harness::new(&server).await;

    let a = h
        .manager
        .write(WriteMethod::Put, "/complaints/1", Some(json!({"work_order_number": "A"})), vec![])
        .await
        .unwrap();
    let b = h
        .manager
        .write(WriteMethod::Put, "/complaints/1", Some(json!({"work_order_number": "B"})), vec![])
        .await
        .unwrap();
    assert!(a.is_pending() && b.is_pending());
    assert!(server.received_requests().await.unwrap().is_empty());

    h.go_online();
    let report = h.manager.replay_pending().await.unwrap();

    assert_eq!(report.replayed, 2);
    assert!(report.is_drained());
    assert_eq!(store.get(1).unwrap()["work_order_number"], "B");

    let keys = store.idempotency_keys();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
}

#[tokio::test]
async fn test_online_write_goes_straight_through() {
    let server = healthy_backend().await;
    let store = ComplaintStore::with_records(vec![json!({"id": 5, "status": "open"})]);
    store.mount(&server).await;
    let h = Harness::new(&server).await;
    h.go_online();

    let outcome = h
        .manager
        .write(WriteMethod::Put, "/complaints/5", Some(json!({"status": "closed"})), vec![])
        .await
        .unwrap();

    assert!(!outcome.is_pending());
    assert_eq!(outcome.status(), 200);
    assert_eq!(outcome.response().unwrap().body.as_ref().unwrap()["status"], "closed");
    assert_eq!(h.manager.status().await.unwrap().pending, 0);
}

#[tokio::test]
async fn test_online_write_error_is_returned_unchanged() {
    let server = healthy_backend().await;
    Mock::given(method("POST"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(422).set_body_string("title required"))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    h.go_online();

    let err = h
        .manager
        .write(WriteMethod::Post, "/complaints", Some(json!({})), vec![])
        .await
        .unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(h.manager.status().await.unwrap().pending, 0);
}

#[tokio::test]
async fn test_rejected_replay_is_reported_and_dropped() {
    let server = healthy_backend().await;
    Mock::given(method("PUT"))
        .and(path("/complaints/2"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid status"))
        .expect(1)
        .mount(&server)
        .await;
    let store = ComplaintStore::with_records(vec![json!({"id": 3})]);
    store.mount(&server).await;

    let h = Harness::new(&server).await;
    let mut events = h.manager.subscribe();
    h.manager
        .write(WriteMethod::Put, "/complaints/2", Some(json!({"status": "bogus"})), vec![])
        .await
        .unwrap();
    h.manager
        .write(WriteMethod::Put, "/complaints/3", Some(json!({"status": "closed"})), vec![])
        .await
        .unwrap();

    h.go_online();
    let report = h.manager.replay_pending().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].status, Some(422));
    assert_eq!(report.replayed, 1);
    assert_eq!(report.remaining, 0);
    assert_eq!(store.get(3).unwrap()["status"], "closed");

    let event = expect_event!(events, SyncEvent::Failed(_));
    assert_matches!(event, SyncEvent::Failed(failure) if failure.url == "/complaints/2");

    let failures = h.manager.sync_failures().await.unwrap();
    assert_eq!(failures.len(), 1);
    assert!(h.manager.dismiss_failure(failures[0].id).await.unwrap());
    assert_eq!(h.manager.status().await.unwrap().failures, 0);
}

#[tokio::test]
async fn test_transient_replay_failure_waits_for_next_trigger() {
    let server = healthy_backend().await;
    Mock::given(method("DELETE"))
        .and(path("/complaints/8"))
        .respond_with(ResponseTemplate::new(503))
        .expect(6)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    h.manager
        .write(WriteMethod::Delete, "/complaints/8", None, vec![])
        .await
        .unwrap();
    h.manager
        .write(WriteMethod::Delete, "/complaints/9", None, vec![])
        .await
        .unwrap();

    h.go_online();
    let report = h.manager.replay_pending().await.unwrap();

    assert!(report.deferred.is_some());
    assert_eq!(report.replayed, 0);
    assert_eq!(report.remaining, 2);
    // Nothing behind the stuck entry was sent
    assert_sent!(server, "DELETE", "/complaints/9", 0);
}

#[tokio::test]
async fn test_replay_skipped_when_offline() {
    let server = MockServer::start().await;
    let h = Harness::new(&server).await;
    h.manager
        .write(WriteMethod::Delete, "/complaints/1", None, vec![])
        .await
        .unwrap();

    let report = h.manager.replay_pending().await.unwrap();
    assert_eq!(report.skipped, Some(SkipReason::Offline));
}

#[tokio::test]
async fn test_edit_updates_cached_pages_without_refetch() {
    let server = healthy_backend().await;
    let h = Harness::new(&server).await;

    let open = ListQuery::new().filter("status", ["open"]);
    let all = ListQuery::new();
    let record = json!({"id": 4, "status": "open", "title": "Wrong part"});
    h.cache()
        .put(&open, ListPage::new(vec![record.clone()], Pagination::new(1, 1, 10)))
        .await;
    h.cache()
        .put(&all, ListPage::new(vec![json!({"id": 1}), record.clone()], Pagination::new(2, 1, 10)))
        .await;
    h.detail().open(record);

    h.manager
        .write(WriteMethod::Put, "/complaints/4", Some(json!({"title": "Wrong part, 3 units"})), vec![])
        .await
        .unwrap();

    assert_eq!(h.cache().get(&open).await.unwrap().items[0]["title"], "Wrong part, 3 units");
    assert_eq!(h.cache().get(&all).await.unwrap().items[1]["title"], "Wrong part, 3 units");
    let detail = h.detail().current().unwrap();
    assert_eq!(detail.record["title"], "Wrong part, 3 units");
    assert!(detail.unreconciled);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_confirmed_response_overwrites_optimistic_value() {
    let server = healthy_backend().await;
    let store = ComplaintStore::with_records(vec![json!({"id": 6, "status": "open"})]);
    store.mount(&server).await;
    let h = Harness::new(&server).await;
    h.detail().open(json!({"id": 6, "status": "open"}));

    h.manager
        .write(WriteMethod::Put, "/complaints/6", Some(json!({"status": "closed"})), vec![])
        .await
        .unwrap();
    assert!(h.detail().current().unwrap().record.get("version").is_none());

    h.go_online();
    h.manager.replay_pending().await.unwrap();

    let detail = h.detail().current().unwrap();
    assert!(!detail.unreconciled);
    assert_eq!(detail.record["status"], "closed");
    // Server-computed field from the authoritative response
    assert_eq!(detail.record["version"], 1);
}

#[tokio::test]
async fn test_deferred_edit_stays_in_cached_pages() {
    let server = healthy_backend().await;
    Mock::given(method("PUT"))
        .and(path("/complaints/1"))
        .and(body_partial_json(json!({"work_order_number": "A"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "work_order_number": "A"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/complaints/1"))
        .and(body_partial_json(json!({"work_order_number": "B"})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;

    let query = ListQuery::new();
    let record = json!({"id": 1, "work_order_number": null});
    h.cache()
        .put(&query, ListPage::new(vec![record.clone()], Pagination::new(1, 1, 10)))
        .await;
    h.detail().open(record);
    for number in ["A", "B"] {
        h.manager
            .write(WriteMethod::Put, "/complaints/1", Some(json!({"work_order_number": number})), vec![])
            .await
            .unwrap();
    }

    h.go_online();
    let report = h.manager.replay_pending().await.unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(report.remaining, 1);

    assert_eq!(h.cache().get(&query).await.unwrap().items[0]["work_order_number"], "B");
    let detail = h.detail().current().unwrap();
    assert_eq!(detail.record["work_order_number"], "B");
    assert!(detail.unreconciled);
}

#[tokio::test]
async fn test_delete_closes_open_detail_view() {
    let server = healthy_backend().await;
    let store = ComplaintStore::with_records(vec![json!({"id": 11})]);
    store.mount(&server).await;
    let h = Harness::new(&server).await;
    h.go_online();

    let query = ListQuery::new();
    h.cache()
        .put(&query, ListPage::new(vec![json!({"id": 11}), json!({"id": 12})], Pagination::new(2, 1, 10)))
        .await;
    h.detail().open(json!({"id": 11}));

    h.manager
        .write(WriteMethod::Delete, "/complaints/11", None, vec![])
        .await
        .unwrap();

    assert!(!h.detail().is_open());
    let page = h.cache().get(&query).await.unwrap();
    assert_eq!(page.items, vec![json!({"id": 12})]);
    assert_eq!(page.pagination.total, 1);
    assert!(store.get(11).is_none());
}

#[tokio::test]
async fn test_submit_draft_online() {
    let server = healthy_backend().await;
    Mock::given(method("POST"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 40, "title": "Short shipment"})))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    h.go_online();

    h.manager
        .save_draft(&json!({"title": "Short shipment"}))
        .await
        .unwrap();
    let outcome = h.manager.submit_draft("/complaints").await.unwrap().unwrap();

    assert_eq!(outcome.status(), 201);
    assert!(h.manager.load_draft().await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_draft_submission_keeps_draft() {
    let server = healthy_backend().await;
    Mock::given(method("POST"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    h.go_online();

    h.manager.save_draft(&json!({"title": ""})).await.unwrap();
    assert!(h.manager.submit_draft("/complaints").await.is_err());
    assert!(h.manager.load_draft().await.unwrap().is_some());
}
