//! Read-only REST handlers.
//!
//! The full-state query here and the `state` command on the `WebSocket`
//! are the same call on the manager, so polling clients and subscribed
//! clients always see identical snapshots.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and running-timer count |
//! | `GET` | `/api/items` | Full item pool |
//! | `GET` | `/api/drafts/{id}` | Current full state of one draft |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use draftday_types::DraftId;
use uuid::Uuid;

use crate::error::ObserverError;
use crate::state::AppState;

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "running_timers": state.manager.running_timers(),
    }))
}

/// `GET /api/items`
pub async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let items = state.manager.list_items().await?;
    Ok(Json(serde_json::json!({
        "count": items.len(),
        "items": items,
    })))
}

/// `GET /api/drafts/{id}`
///
/// Draft, seats, picks, the remaining pool, whose turn it is, and the
/// seconds left on the running countdown.
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft_id = parse_draft_id(&id)?;
    let snapshot = state.manager.current_state(draft_id).await?;
    Ok(Json(snapshot))
}

/// Parse a path segment into a [`DraftId`].
pub(crate) fn parse_draft_id(s: &str) -> Result<DraftId, ObserverError> {
    s.parse::<Uuid>()
        .map(DraftId::from)
        .map_err(|e| ObserverError::InvalidUuid(format!("{s}: {e}")))
}
