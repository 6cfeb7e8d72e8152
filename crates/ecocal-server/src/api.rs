use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ecocal_alert::engine::{TickReport, TickTrigger};
use serde::Serialize;

/// Body of `/v1/cron/alerts`. External cron services only look at the
/// status code and `success`.
#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TickReport>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    pub poll_interval_secs: u64,
    pub events: u64,
    pub active_rules: usize,
}

/// Runs one matcher tick on behalf of an external scheduler.
async fn trigger_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    match state.matcher.run_tick_from(TickTrigger::Webhook).await {
        Ok(report) => (
            StatusCode::OK,
            Json(CronResponse {
                success: true,
                message: "Alerts checked successfully".to_string(),
                timestamp: Utc::now(),
                trace_id: trace_id.to_string(),
                report: Some(report),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(trace_id = %trace_id.0, error = %e, "Webhook-triggered tick failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CronResponse {
                    success: false,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                    trace_id: trace_id.to_string(),
                    report: None,
                }),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let events = state.store.count_events().await;
    let rules = state.store.list_active_category_rules().await;
    match (events, rules) {
        (Ok(events), Ok(rules)) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: (Utc::now() - state.start_time).num_seconds(),
                poll_interval_secs: state.config.matcher.poll_interval_secs,
                events,
                active_rules: rules.len(),
            }),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Health check could not reach the store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/cron/alerts", get(trigger_alerts).post(trigger_alerts))
}
