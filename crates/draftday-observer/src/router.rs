//! Axum router construction for the observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, operator, ws};

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /health` -- liveness
/// - `GET /ws/drafts/{id}` -- `WebSocket` subscription to one draft
/// - `GET /api/items` -- the item pool
/// - `POST /api/drafts` -- create a draft
/// - `GET /api/drafts/{id}` -- full current state
/// - `POST /api/drafts/{id}/{start,picks,cancel,reset,expire}` -- administration
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // WebSocket
        .route("/ws/drafts/{id}", get(ws::ws_draft))
        // Queries
        .route("/api/items", get(handlers::list_items))
        .route("/api/drafts/{id}", get(handlers::get_draft))
        // Administration
        .route("/api/drafts", post(operator::create_draft))
        .route("/api/drafts/{id}/start", post(operator::start_draft))
        .route("/api/drafts/{id}/picks", post(operator::submit_pick))
        .route("/api/drafts/{id}/cancel", post(operator::cancel_draft))
        .route("/api/drafts/{id}/reset", post(operator::reset_draft))
        .route("/api/drafts/{id}/expire", post(operator::force_expire))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
