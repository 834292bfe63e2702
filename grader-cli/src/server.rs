use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use grader_core::ProficiencyScorer;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};

use crate::config::ServerConfig;
use crate::request::{ErrorResponse, ProficiencyResponse, handle_payload};

#[derive(Clone)]
struct AppState {
    scorer: Arc<ProficiencyScorer>,
}

pub fn router(scorer: ProficiencyScorer, max_body_bytes: usize) -> Router {
    let state = AppState {
        scorer: Arc::new(scorer),
    };

    Router::new()
        .route("/health", get(health))
        .route("/calculate_proficiency", post(calculate_proficiency))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

pub async fn run_server(config: &ServerConfig, scorer: ProficiencyScorer) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen_addr '{}': {e}", config.listen_addr))?;

    let app = router(scorer, config.max_body_bytes);

    log::info!("Grader HTTP server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// GET /health
// ═══════════════════════════════════════════════════════════════

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

// ═══════════════════════════════════════════════════════════════
// POST /calculate_proficiency
// ═══════════════════════════════════════════════════════════════

async fn calculate_proficiency(State(st): State<AppState>, body: String) -> Response {
    let scorer = st.scorer.clone();
    // Analysis is CPU bound; keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || handle_payload(&body, &scorer)).await;

    match result {
        Ok(Ok(proficiency)) => (StatusCode::OK, Json(ProficiencyResponse { proficiency })).into_response(),
        Ok(Err(e)) => {
            let status = if e.is_internal() {
                log::error!("{e}");
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                log::warn!("Rejected request: {e}");
                StatusCode::UNPROCESSABLE_ENTITY
            };
            (status, Json(ErrorResponse { error: e.to_string() })).into_response()
        }
        Err(e) => {
            log::error!("Scoring task failed: {e}");
            let body = ErrorResponse {
                error: format!("Unexpected error: scoring task failed: {e}"),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
