//! Shared test fixtures: in-memory roster, recording SMS channel

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use fairway_common::config::Config;
use fairway_common::db::golfers::insert_golfer;
use fairway_common::db::init_memory_database;
use fairway_common::db::models::{Golfer, Tier};
use fairway_common::notify::{Dispatcher, MemoryChannel};
use fairway_sms::{build_router, AppState};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

pub const MANAGER: &str = "+15559990000";

pub struct TestApp {
    pub state: AppState,
    pub channel: Arc<MemoryChannel>,
}

impl TestApp {
    pub async fn new(capacity: u32) -> Self {
        let pool = init_memory_database().await.unwrap();
        let channel = Arc::new(MemoryChannel::new());
        let dispatcher = Dispatcher::new(channel.clone(), Duration::from_secs(1));

        let config = Config {
            root_folder: PathBuf::from("."),
            db_path: PathBuf::from(":memory:"),
            bind_addr: "127.0.0.1:0".to_string(),
            capacity,
            manager_phones: vec![MANAGER.to_string()],
            dry_run: true,
            sms: None,
            delivery_timeout: Duration::from_secs(1),
            log_level: "info".to_string(),
        };

        Self {
            state: AppState::new(pool, config, dispatcher),
            channel,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn add_golfer(&self, name: &str, phone: &str, tier: Option<Tier>) -> Golfer {
        let mut conn = self.state.db.acquire().await.unwrap();
        insert_golfer(&mut conn, name, phone, tier).await.unwrap()
    }

    /// Golfers G1..Gn with phones +1555000000n
    pub async fn add_golfers(&self, count: usize) -> Vec<Golfer> {
        let mut added = Vec::new();
        for i in 1..=count {
            added.push(
                self.add_golfer(&format!("G{}", i), &format!("+1555000{:04}", i), None)
                    .await,
            );
        }
        added
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn sms_request(from: &str, body: &str) -> Request<Body> {
    let form = format!("From={}&Body={}", form_encode(from), form_encode(body));
    Request::builder()
        .method("POST")
        .uri("/sms")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

fn form_encode(value: &str) -> String {
    let mut out = String::new();
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}
