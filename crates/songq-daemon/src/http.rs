use crate::core::{CycleReport, PollCore, PollEvent, PollPhase};
use crate::RecentWarnings;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    core: Arc<PollCore>,
    event_tx: mpsc::Sender<PollEvent>,
    warnings: RecentWarnings,
}

#[derive(Serialize)]
struct ApiStatus {
    phase: PollPhase,
    skipped: u64,
    #[serde(flatten)]
    report: CycleReport,
    recent_warnings: Vec<String>,
}

pub fn router(
    core: Arc<PollCore>,
    event_tx: mpsc::Sender<PollEvent>,
    warnings: RecentWarnings,
) -> Router {
    let app_state = HttpState {
        core,
        event_tx,
        warnings,
    };

    Router::new()
        .route("/api/queue", get(get_queue))
        .route("/api/queue.txt", get(get_queue_text))
        .route("/api/status", get(get_status))
        .route("/api/refresh", post(refresh))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    core: Arc<PollCore>,
    event_tx: mpsc::Sender<PollEvent>,
    warnings: RecentWarnings,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(core, event_tx, warnings);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

/// Latest view, or 204 until the first cycle has completed.
async fn get_queue(State(state): State<HttpState>) -> Response {
    match state.core.view().await {
        Some(view) => Json(view).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_queue_text(State(state): State<HttpState>) -> Response {
    match state.core.view().await {
        Some(view) => view.to_text().into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_status(State(state): State<HttpState>) -> Json<ApiStatus> {
    Json(ApiStatus {
        phase: state.core.phase(),
        skipped: state.core.skipped(),
        report: state.core.report().await,
        recent_warnings: state.warnings.snapshot(),
    })
}

async fn refresh(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: refresh requested");
    if state.event_tx.send(PollEvent::Refresh).await.is_err() {
        error!("Failed to send refresh event");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::ACCEPTED
}
