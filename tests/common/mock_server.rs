//! Fake backend for integration tests
//!
//! A wiremock server plus a small stateful complaint store that applies
//! PUT/DELETE requests in arrival order, so tests can check what the
//! backend ended up holding.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Start a backend whose health endpoint answers 200
pub async fn healthy_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    server
}

/// In-memory complaint records keyed by id
#[derive(Debug, Clone, Default)]
pub struct ComplaintStore {
    records: Arc<Mutex<BTreeMap<i64, Value>>>,
    idempotency_keys: Arc<Mutex<Vec<String>>>,
}

impl ComplaintStore {
    pub fn with_records(records: Vec<Value>) -> Self {
        let store = Self::default();
        {
            let mut map = store.records.lock().unwrap();
            for record in records {
                let id = record["id"].as_i64().unwrap();
                map.insert(id, record);
            }
        }
        store
    }

    pub fn get(&self, id: i64) -> Option<Value> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Idempotency keys seen, in arrival order
    pub fn idempotency_keys(&self) -> Vec<String> {
        self.idempotency_keys.lock().unwrap().clone()
    }

    /// Serve `PUT` and `DELETE` on `/complaints/{id}`
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(path_regex(r"^/complaints/\d+$"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }
}

impl Respond for ComplaintStore {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if let Some(key) = request.headers.get("Idempotency-Key") {
            if let Ok(key) = key.to_str() {
                self.idempotency_keys.lock().unwrap().push(key.to_string());
            }
        }

        let id: i64 = match request
            .url
            .path_segments()
            .and_then(|mut segments| segments.nth(1))
            .and_then(|raw| raw.parse().ok())
        {
            Some(id) => id,
            None => return ResponseTemplate::new(404),
        };

        let mut records = self.records.lock().unwrap();
        match request.method.as_str() {
            "PUT" => {
                let changes: Value = request.body_json().unwrap_or(Value::Null);
                let record = records.entry(id).or_insert_with(|| json!({"id": id}));
                if let (Some(record), Some(changes)) = (record.as_object_mut(), changes.as_object())
                {
                    for (name, value) in changes {
                        record.insert(name.clone(), value.clone());
                    }
                    let version = record.get("version").and_then(Value::as_i64).unwrap_or(0);
                    record.insert("version".into(), json!(version + 1));
                }
                ResponseTemplate::new(200).set_body_json(record.clone())
            }
            "DELETE" => match records.remove(&id) {
                Some(_) => ResponseTemplate::new(204),
                None => ResponseTemplate::new(404),
            },
            "GET" => match records.get(&id) {
                Some(record) => ResponseTemplate::new(200).set_body_json(record.clone()),
                None => ResponseTemplate::new(404),
            },
            _ => ResponseTemplate::new(405),
        }
    }
}
