#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use ecocal_alert::engine::{AlertMatcher, MatcherConfig};
use ecocal_alert::DeliveryChannel;
use ecocal_common::types::{CategoryRule, EconomicEvent};
use ecocal_server::app;
use ecocal_server::config::ServerConfig;
use ecocal_server::state::AppState;
use ecocal_storage::Store;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;

/// Captures every grouped delivery instead of sending it.
#[derive(Default)]
pub struct RecordingChannel {
    pub deliveries: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn deliver(
        &self,
        destination: &str,
        events: &[EconomicEvent],
        _rule: &CategoryRule,
    ) -> Result<()> {
        self.deliveries.lock().unwrap().push((
            destination.to_string(),
            events.iter().map(|e| e.name.clone()).collect(),
        ));
        Ok(())
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<Store>,
    pub channel: Arc<RecordingChannel>,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context() -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(Store::open_in(temp_dir.path()).await?);
    let channel = Arc::new(RecordingChannel::default());

    let matcher = Arc::new(AlertMatcher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        channel.clone(),
        MatcherConfig::default(),
    ));

    let config = ServerConfig {
        data_dir: temp_dir.path().to_string_lossy().to_string(),
        ..Default::default()
    };

    let state = AppState {
        store: store.clone(),
        matcher,
        start_time: Utc::now(),
        config: Arc::new(config),
    };
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        store,
        channel,
        state,
        app,
    })
}

pub async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}
