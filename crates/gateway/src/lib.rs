//! HTTP control plane for Parley.
//!
//! Exposes the bridge's start/stop/status/log operations as JSON endpoints,
//! plus a health check and a service status page.
//!
//! Built on Axum. Bridge errors map to HTTP statuses with a stable
//! `{"error": code, "message": text}` body.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Query};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use parley_agents::{HttpResponderClient, HttpSubjectClient};
use parley_bridge::{
    Bridge, BridgeSettings, JsonFileStore, LogPage, Phase, StartReceipt, StartRequest,
    StatusReport, StopReceipt,
};
use parley_core::BridgeError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Default page size of the log endpoint.
const DEFAULT_LOG_LIMIT: usize = 100;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub bridge: Arc<Bridge>,
    pub subject_url: String,
    pub responder_url: String,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, permissive_cors: bool) -> Router {
    let cors = if permissive_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(service_status_handler))
        .route("/api/bridge/start", post(start_handler))
        .route("/api/bridge/stop", post(stop_handler))
        .route("/api/bridge/status", get(bridge_status_handler))
        .route("/api/bridge/log", get(log_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds both agent clients and the bridge from config, serves until
/// Ctrl-C, then stops any active run and waits for its session log to be
/// written.
pub async fn start(config: parley_config::AppConfig) -> parley_core::Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let probe_timeout = Duration::from_secs(config.bridge.probe_timeout_secs);

    let subject = Arc::new(HttpSubjectClient::from_config(&config.subject, probe_timeout)?);
    let responder = Arc::new(HttpResponderClient::from_config(
        &config.responder,
        config.bridge.history_horizon,
        probe_timeout,
    )?);
    let store = Arc::new(JsonFileStore::new(config.bridge.log_dir.clone()));
    let bridge = Arc::new(Bridge::new(
        subject,
        responder,
        store,
        BridgeSettings::from_config(&config),
    )?);

    let state = Arc::new(GatewayState {
        bridge: bridge.clone(),
        subject_url: config.subject.url.clone(),
        responder_url: config.responder.url.clone(),
        started_at: Utc::now(),
    });
    let app = build_router(state, config.gateway.permissive_cors);

    info!(
        addr = %addr,
        subject = %config.subject.url,
        responder = %config.responder.url,
        log_dir = %config.bridge.log_dir.display(),
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bridge.shutdown().await;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C, serving until killed"),
    }
}

// --- Errors ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// A bridge error rendered as an HTTP response.
pub struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            BridgeError::AlreadyRunning | BridgeError::NotRunning => StatusCode::CONFLICT,
            BridgeError::DependencyUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BridgeError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self.0, "Bridge request rejected");
        (
            status,
            Json(ErrorBody {
                error: self.0.code().into(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: "invalid_request".into(),
            message,
        }),
    )
        .into_response()
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service: String,
    pub version: String,
    pub subject_url: String,
    pub responder_url: String,
    pub subject_reachable: bool,
    pub responder_reachable: bool,
    pub bridge_phase: Phase,
    pub uptime_secs: i64,
    pub timestamp: DateTime<Utc>,
}

async fn service_status_handler(State(state): State<SharedState>) -> Json<ServiceStatus> {
    let report = state.bridge.status().await;
    let now = Utc::now();
    Json(ServiceStatus {
        service: "parley".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        subject_url: state.subject_url.clone(),
        responder_url: state.responder_url.clone(),
        subject_reachable: report.subject_reachable,
        responder_reachable: report.responder_reachable,
        bridge_phase: report.phase,
        uptime_secs: (now - state.started_at).num_seconds(),
        timestamp: now,
    })
}

/// `POST /api/bridge/start`. An empty body starts with configured defaults.
async fn start_handler(State(state): State<SharedState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        match serde_json::from_slice::<StartRequest>(&body) {
            Ok(request) => request,
            Err(e) => return bad_request(format!("Invalid start request: {e}")),
        }
    };

    let params = request.resolve(&state.bridge.settings().defaults);
    match state.bridge.start(params).await {
        Ok(receipt) => Json::<StartReceipt>(receipt).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn stop_handler(State(state): State<SharedState>) -> Result<Json<StopReceipt>, ApiError> {
    Ok(Json(state.bridge.stop()?))
}

async fn bridge_status_handler(State(state): State<SharedState>) -> Json<StatusReport> {
    Json(state.bridge.status().await)
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    limit: Option<usize>,
}

async fn log_handler(
    State(state): State<SharedState>,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(query)) => {
            Json::<LogPage>(state.bridge.log(query.limit.unwrap_or(DEFAULT_LOG_LIMIT)))
                .into_response()
        }
        Err(e) => bad_request(format!("Invalid log query: {}", e.body_text())),
    }
}
