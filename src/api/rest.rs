// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Reads come straight from the published
// snapshot; control endpoints forward a `Command` to the chart driver and
// answer with its acknowledgement.
//
// CORS is configured permissively; the API is meant for a local renderer.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::driver::{Command, CommandAck, CommandError};
use crate::indicators::{PrimaryOverlay, SecondaryPane};
use crate::session::GestureTarget;
use crate::types::{DateRange, Timestamp};

type ApiError = (StatusCode, Json<serde_json::Value>);

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Reads ───────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/products", get(products))
        // ── Control ─────────────────────────────────────────────────
        .route("/api/v1/control/product", post(control_product))
        .route("/api/v1/control/period", post(control_period))
        .route("/api/v1/control/reset", post(control_reset))
        .route("/api/v1/control/pan", post(control_pan))
        .route("/api/v1/control/zoom", post(control_zoom))
        .route("/api/v1/control/brush", post(control_brush))
        .route("/api/v1/control/crosshair", post(control_crosshair))
        .route("/api/v1/control/indicator", post(control_indicator))
        .route("/api/v1/notifications/dismiss", post(dismiss_notification))
        // ── WebSocket (handled separately in ws module but mounted here) ─
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Reads
// =============================================================================

async fn chart(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn products(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.products())
}

// =============================================================================
// Control
// =============================================================================

fn error_status(err: &CommandError) -> StatusCode {
    match err {
        CommandError::Chart(_) => StatusCode::BAD_REQUEST,
        CommandError::DriverStopped => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn run(state: &AppState, command: Command) -> Result<Json<CommandAck>, ApiError> {
    match state.execute(command).await {
        Ok(ack) => Ok(Json(ack)),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                warn!(error = %e, "command could not be delivered");
            } else {
                debug!(error = %e, "command rejected");
            }
            Err((status, Json(serde_json::json!({ "error": e.to_string() }))))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductRequest {
    product: String,
    #[serde(default)]
    period: Option<String>,
}

async fn control_product(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(
        &state,
        Command::ChangeProduct {
            product: req.product,
            period: req.period,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
struct PeriodRequest {
    period: String,
}

async fn control_period(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PeriodRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(&state, Command::ChangePeriod { period: req.period }).await
}

async fn control_reset(State(state): State<Arc<AppState>>) -> Result<Json<CommandAck>, ApiError> {
    run(&state, Command::ResetToLatest).await
}

/// Horizontal drag in pixels; positive moves towards older data.
#[derive(Debug, Deserialize)]
struct PanRequest {
    #[serde(default)]
    target: GestureTarget,
    dx: f64,
}

async fn control_pan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PanRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(&state, Command::Pan { target: req.target, dx: req.dx }).await
}

/// Scale factor about a pixel anchor; factor > 1 zooms in.
#[derive(Debug, Deserialize)]
struct ZoomRequest {
    #[serde(default)]
    target: GestureTarget,
    factor: f64,
    anchor: f64,
}

async fn control_zoom(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ZoomRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(
        &state,
        Command::Zoom {
            target: req.target,
            factor: req.factor,
            anchor: req.anchor,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
struct BrushRequest {
    start: Timestamp,
    end: Timestamp,
    #[serde(default)]
    ended: bool,
}

async fn control_brush(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BrushRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(
        &state,
        Command::Brush {
            extent: DateRange::new(req.start, req.end),
            ended: req.ended,
        },
    )
    .await
}

/// `date: null` clears the crosshair.
#[derive(Debug, Deserialize)]
struct CrosshairRequest {
    date: Option<Timestamp>,
}

async fn control_crosshair(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CrosshairRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(&state, Command::Crosshair { date: req.date }).await
}

/// `{"overlay": "moving_average"}` or `{"pane": "rsi"}`.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum IndicatorRequest {
    Overlay(PrimaryOverlay),
    Pane(SecondaryPane),
}

impl From<IndicatorRequest> for Command {
    fn from(req: IndicatorRequest) -> Self {
        match req {
            IndicatorRequest::Overlay(overlay) => Command::ToggleOverlay(overlay),
            IndicatorRequest::Pane(pane) => Command::TogglePane(pane),
        }
    }
}

async fn control_indicator(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndicatorRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(&state, req.into()).await
}

#[derive(Debug, Deserialize)]
struct DismissRequest {
    id: Uuid,
}

async fn dismiss_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DismissRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    run(&state, Command::DismissNotification(req.id)).await
}
