//! Request dispatcher: URL normalisation, retry ceiling, list decoding

use crate::common::*;
use assert_matches::assert_matches;
use complaint_sync::client::api::{ApiRequest, DispatchError};
use complaint_sync::client::auth::AuthSession;
use complaint_sync::client::Config;
use complaint_sync::shared::{AppConfig, ListQuery};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_always_503_is_attempted_six_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(6)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let (dispatcher, sleeper) = dispatcher_for(&config, Arc::new(AuthSession::anonymous(&config).unwrap()));

    let err = dispatcher
        .send(ApiRequest::get("/complaints"))
        .await
        .unwrap_err();

    assert_matches!(err, DispatchError::Server { status: 503, attempts: 6, .. });
    assert!(err.is_transient());
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(800),
            Duration::from_millis(1600),
        ]
    );
}

#[tokio::test]
async fn test_400_is_attempted_once() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/complaints/4"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad status"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let (dispatcher, sleeper) = dispatcher_for(&config, Arc::new(AuthSession::anonymous(&config).unwrap()));

    let err = dispatcher
        .send(ApiRequest::put("/complaints/4").json(json!({"status": "??"})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DispatchError::Client {
            status: 400,
            body: "bad status".into()
        }
    );
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/complaints/2"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/complaints/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2})))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let (dispatcher, sleeper) = dispatcher_for(&config, Arc::new(AuthSession::anonymous(&config).unwrap()));

    let response = assert_ok!(dispatcher.send(ApiRequest::get("/complaints/2")).await);
    assert_eq!(response.status, 200);
    assert_eq!(response.body, Some(json!({"id": 2})));
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_frontend_origin_is_rerouted_to_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/complaints/7"))
        .and(query_param("expand", "actions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::from_app(
        AppConfig::builder()
            .server_url(server.uri())
            .frontend_origin("http://localhost:5173")
            .build()
            .unwrap(),
    )
    .unwrap();
    let (dispatcher, _) = dispatcher_for(&config, Arc::new(AuthSession::anonymous(&config).unwrap()));

    let response = dispatcher
        .send(ApiRequest::get("http://localhost:5173/complaints/7?expand=actions"))
        .await
        .unwrap();
    assert_eq!(response.body, Some(json!({"id": 7})));
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/companies/"))
        .and(header("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let (dispatcher, _) = dispatcher_for(&config, session_with(&config, "abc", None));
    assert_ok!(dispatcher.send(ApiRequest::get("/companies")).await);
}

#[tokio::test]
async fn test_list_shapes_normalize_to_one_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/complaints/"))
        .and(query_param("status", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 1}, {"id": 2}],
            "total": 12,
            "page": 1,
            "size": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/parts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 9}])))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let (dispatcher, _) = dispatcher_for(&config, Arc::new(AuthSession::anonymous(&config).unwrap()));

    let page = dispatcher
        .get_list("/complaints", &ListQuery::new().filter("status", ["open"]).page(1, 2))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page.pagination.total, 12);
    assert_eq!(page.pagination.total_pages, 6);

    let bare = dispatcher.get_list("/parts", &ListQuery::new()).await.unwrap();
    assert_eq!(bare.items, vec![json!({"id": 9})]);
    assert_eq!(bare.pagination.total, 1);
}

#[tokio::test]
async fn test_empty_body_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/complaints/3"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let (dispatcher, _) = dispatcher_for(&config, Arc::new(AuthSession::anonymous(&config).unwrap()));
    let response = dispatcher.send(ApiRequest::delete("/complaints/3")).await.unwrap();
    assert_eq!(response.status, 204);
    assert_eq!(response.body, None);
}
