//! Read cache in front of the list endpoint

use crate::common::*;
use complaint_sync::shared::{ListQuery, WriteMethod};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn list_body() -> serde_json::Value {
    json!({
        "items": [
            {"id": 1, "status": "open", "title": "Cracked housing"},
            {"id": 2, "status": "closed", "title": "Late delivery"}
        ],
        "total": 2,
        "page": 1,
        "size": 20
    })
}

#[tokio::test]
async fn test_equivalent_queries_share_one_fetch() {
    let server = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body()))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;

    let first = ListQuery::new().filter("status", ["open", "closed"]);
    let reordered = ListQuery::new().filter("status", ["closed", "open"]);

    let a = h.manager.read_list("/complaints", &first).await.unwrap();
    let b = h.manager.read_list("/complaints", &reordered).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a.pagination.total, 2);
}

#[tokio::test]
async fn test_filters_are_sent_as_repeated_params() {
    let server = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .and(query_param("status", "open"))
        .and(query_param("skip", "20"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;

    let query = ListQuery::new().filter("status", ["open"]).page(2, 20);
    let page = h.manager.read_list("/complaints", &query).await.unwrap();
    assert!(page.is_empty());
    assert_eq!(page.pagination.page, 2);
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let server = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body()))
        .expect(2)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    let query = ListQuery::new();

    h.manager.read_list("/complaints", &query).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(299));
    h.manager.read_list("/complaints", &query).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(2));
    h.manager.read_list("/complaints", &query).await.unwrap();
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let server = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    let query = ListQuery::new();

    assert!(h.manager.read_list("/complaints", &query).await.is_err());
    assert!(h.manager.read_list("/complaints", &query).await.is_err());
    assert!(h.cache().is_empty().await);
}

#[tokio::test]
async fn test_queued_edit_shows_in_cached_list() {
    let server = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body()))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    let query = ListQuery::new();

    h.manager.read_list("/complaints", &query).await.unwrap();
    h.manager
        .write(WriteMethod::Put, "/complaints/2", Some(json!({"status": "reopened"})), vec![])
        .await
        .unwrap();

    let page = h.manager.read_list("/complaints", &query).await.unwrap();
    assert_eq!(page.items[1]["status"], "reopened");
    assert_eq!(page.items[1]["title"], "Late delivery");
}

#[tokio::test]
async fn test_created_record_invalidates_lists() {
    let server = healthy_backend().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body()))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 3})))
        .mount(&server)
        .await;
    let h = Harness::new(&server).await;
    h.go_online();
    let query = ListQuery::new();

    h.manager.read_list("/complaints", &query).await.unwrap();
    let before = h.cache().last_refresh().await;
    h.manager
        .write(WriteMethod::Post, "/complaints", Some(json!({"title": "New"})), vec![])
        .await
        .unwrap();
    assert_ne!(h.cache().last_refresh().await, before);
    h.manager.read_list("/complaints", &query).await.unwrap();
}
