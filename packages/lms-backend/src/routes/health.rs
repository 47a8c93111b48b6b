use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/info", get(info))
        .route("/live", get(live))
        .route("/database", get(database))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: &'static str,
    start_time: String,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseStatusResponse {
    r#type: &'static str,
    configured: bool,
    healthy: bool,
    degraded: bool,
    latency: Option<u64>,
    consecutive_failures: u32,
    error: Option<String>,
    checked_at: Option<String>,
}

async fn root(State(state): State<AppState>) -> Response {
    let connected = match state.db_proxy() {
        Some(proxy) => proxy.ping().await,
        None => false,
    };

    let response = HealthResponse {
        status: if connected { "ok" } else { "degraded" },
        database: if connected { "connected" } else { "disconnected" },
        timestamp: now_iso(),
    };

    let status_code = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn live(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
    })
}

async fn info(State(state): State<AppState>) -> Json<HealthInfoResponse> {
    Json(HealthInfoResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        start_time: system_time_iso(state.started_at_system()),
        uptime: state.uptime_seconds(),
    })
}

async fn database(State(state): State<AppState>) -> Json<DatabaseStatusResponse> {
    let Some(proxy) = state.db_proxy() else {
        return Json(DatabaseStatusResponse {
            r#type: "postgresql",
            configured: false,
            healthy: false,
            degraded: false,
            latency: None,
            consecutive_failures: 0,
            error: Some("database not configured".to_string()),
            checked_at: None,
        });
    };

    let snapshot = proxy.health_status().await;
    Json(DatabaseStatusResponse {
        r#type: "postgresql",
        configured: true,
        healthy: snapshot.healthy,
        degraded: snapshot.degraded,
        latency: snapshot.latency_ms,
        consecutive_failures: snapshot.consecutive_failures,
        error: snapshot.error,
        checked_at: snapshot.timestamp_ms.map(unix_ms_to_iso),
    })
}

fn system_time_iso(time: std::time::SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn unix_ms_to_iso(ms: u64) -> String {
    system_time_iso(std::time::UNIX_EPOCH + std::time::Duration::from_millis(ms))
}

fn now_iso() -> String {
    system_time_iso(std::time::SystemTime::now())
}
