//! Administrative REST handlers.
//!
//! Every mutation goes through [`DraftManager`](draftday_core::DraftManager),
//! which serializes it against the draft's timer. Rejections come back as
//! [`ObserverError`] with the engine's reason code in the body.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/drafts` | Create a draft |
//! | `POST` | `/api/drafts/{id}/start` | Begin the preparation countdown |
//! | `POST` | `/api/drafts/{id}/picks` | Submit a manual pick |
//! | `POST` | `/api/drafts/{id}/cancel` | Cancel the draft |
//! | `POST` | `/api/drafts/{id}/reset` | Clear picks and return to not-started |
//! | `POST` | `/api/drafts/{id}/expire` | Expire the running countdown now |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use draftday_types::{ItemId, NewDraft, ParticipantId};

use crate::error::ObserverError;
use crate::handlers::parse_draft_id;
use crate::state::AppState;

/// Request body for `POST /api/drafts/{id}/picks`.
#[derive(Debug, serde::Deserialize)]
pub struct PickRequest {
    /// Seat making the pick.
    pub participant_id: ParticipantId,
    /// Item being claimed.
    pub item_id: ItemId,
}

/// `POST /api/drafts`
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewDraft>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft = state.manager.create_draft(request).await?;
    Ok((StatusCode::CREATED, Json(draft)))
}

/// `POST /api/drafts/{id}/start`
pub async fn start_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft_id = parse_draft_id(&id)?;
    let draft = state.manager.start_draft(draft_id).await?;
    Ok(Json(draft))
}

/// `POST /api/drafts/{id}/picks`
pub async fn submit_pick(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PickRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft_id = parse_draft_id(&id)?;
    let pick = state
        .manager
        .submit_pick(draft_id, request.participant_id, request.item_id)
        .await?;
    Ok((StatusCode::CREATED, Json(pick)))
}

/// `POST /api/drafts/{id}/cancel`
pub async fn cancel_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft_id = parse_draft_id(&id)?;
    let draft = state.manager.cancel_draft(draft_id).await?;
    Ok(Json(draft))
}

/// `POST /api/drafts/{id}/reset`
pub async fn reset_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft_id = parse_draft_id(&id)?;
    let draft = state.manager.reset_draft(draft_id).await?;
    Ok(Json(draft))
}

/// `POST /api/drafts/{id}/expire`
///
/// Responds with the fallback pick, or `null` when a preparation
/// countdown was cut short.
pub async fn force_expire(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft_id = parse_draft_id(&id)?;
    let pick = state.manager.force_expire(draft_id).await?;
    Ok(Json(serde_json::json!({ "pick": pick })))
}
