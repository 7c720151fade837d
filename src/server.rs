//! Optional HTTP status API: axum router and request handlers.
//!
//! The server runs on the tokio runtime in the main thread while the
//! scheduler runs on a plain `std::thread`. Handlers read the shared
//! [`DaemonStatus`] snapshot and send [`SchedulerCommand`]s through an
//! `std::sync::mpsc` channel; they never touch a monitor directly.

use crate::monitor::{MonitorKind, MonitorStatus};
use crate::scheduler::{DaemonStatus, SchedulerCommand};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Deserialize;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the scheduler thread
    pub command_tx: Sender<SchedulerCommand>,
    /// Snapshot published by the scheduler after every tick
    pub status: Arc<Mutex<DaemonStatus>>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(get_status, post_brightness, post_stop),
    components(schemas(DaemonStatus, MonitorStatus, MonitorKind, BrightnessRequest)),
    tags(
        (name = "system", description = "Daemon status and control"),
    ),
    info(
        title = "Keyboard LED Monitor API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Status and control API for the keyboard backlight monitor daemon"
    )
)]
pub struct ApiDoc;

// ── Request types ────────────────────────────────────────────────────

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BrightnessRequest {
    /// Brightness level (0-100)
    #[schema(example = 75, minimum = 0, maximum = 100)]
    value: u8,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/brightness", post(post_brightness))
        .route("/api/v1/stop", post(post_stop))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status: current colors, brightness and tick count
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current daemon status", body = DaemonStatus),
        (status = 500, description = "Status lock poisoned")
    )
)]
async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<DaemonStatus>, (StatusCode, String)> {
    let status = state
        .status
        .lock()
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Status unavailable".to_string()))?
        .clone();
    Ok(Json(status))
}

/// POST /api/v1/brightness: set keyboard brightness (0-100)
#[utoipa::path(
    post,
    path = "/api/v1/brightness",
    tag = "system",
    request_body = BrightnessRequest,
    responses(
        (status = 202, description = "Brightness change queued"),
        (status = 400, description = "Value out of range")
    )
)]
async fn post_brightness(
    State(state): State<AppState>,
    Json(req): Json<BrightnessRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if req.value > 100 {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Brightness must be 0-100, got {}", req.value),
        ));
    }

    send(&state, SchedulerCommand::SetBrightness(req.value))
}

/// POST /api/v1/stop: stop the scheduler; the daemon then exits
#[utoipa::path(
    post,
    path = "/api/v1/stop",
    tag = "system",
    responses(
        (status = 202, description = "Stop queued"),
    )
)]
async fn post_stop(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    send(&state, SchedulerCommand::Stop)
}

fn send(state: &AppState, command: SchedulerCommand) -> Result<StatusCode, (StatusCode, String)> {
    state.command_tx.send(command).map_err(|_| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Scheduler thread gone".to_string(),
        )
    })?;

    Ok(StatusCode::ACCEPTED)
}

// ── Tests ──────────────────────────────────────────────────────────
