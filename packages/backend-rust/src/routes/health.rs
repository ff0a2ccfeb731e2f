use std::time::SystemTime;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::{iso_from, now_iso};
use crate::state::AppState;

const SERVICE_NAME: &str = "CareerNavigator Backend";

pub fn api_router() -> Router<AppState> {
    Router::new().route("/", get(root))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/ready", get(ready))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
    database: &'static str,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    started_at: String,
    version: &'static str,
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    timestamp: String,
    database: &'static str,
    otp_entries: usize,
}

async fn root(State(state): State<AppState>) -> Response {
    let connected = state.db().ping().await;
    Json(HealthResponse {
        status: "OK",
        timestamp: now_iso(),
        service: SERVICE_NAME,
        database: if connected { "connected" } else { "disconnected" },
    })
    .into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    Json(LivenessResponse {
        status: "alive",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
        started_at: system_time_iso(state.started_at_system()),
        version: env!("CARGO_PKG_VERSION"),
    })
    .into_response()
}

async fn ready(State(state): State<AppState>) -> Response {
    let connected = state.db().ping().await;
    let status_code = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadinessResponse {
        status: if connected { "ready" } else { "not_ready" },
        timestamp: now_iso(),
        database: if connected { "connected" } else { "disconnected" },
        otp_entries: state.otp().statistics().active,
    };
    (status_code, Json(body)).into_response()
}

fn system_time_iso(value: SystemTime) -> String {
    iso_from(DateTime::<Utc>::from(value))
}
