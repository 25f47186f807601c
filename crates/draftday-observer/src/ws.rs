//! `WebSocket` subscription channel for one draft.
//!
//! Clients connect to `GET /ws/drafts/{id}`. The first frame is always a
//! full [`DraftEvent::Snapshot`]; after that the client receives every
//! event the draft generates, in order, as JSON text frames.
//!
//! Clients may send exactly two things, both as JSON text frames:
//! `{"type":"state"}` for a fresh snapshot and `{"type":"pong","nonce":..}`
//! in answer to a heartbeat ping. Anything else is ignored.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use draftday_types::{DraftEvent, DraftId, ObserverCommand};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::handlers::parse_draft_id;
use crate::state::AppState;

/// Upgrade to a `WebSocket` subscribed to one draft.
///
/// Unknown drafts are rejected with `404` before the upgrade.
///
/// # Route
///
/// `GET /ws/drafts/{id}`
pub async fn ws_draft(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let draft_id = parse_draft_id(&id)?;
    state.manager.current_state(draft_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, draft_id)))
}

/// Serialize and send one event. `false` means the socket is gone.
async fn send_event(socket: &mut WebSocket, event: &DraftEvent) -> bool {
    let json = match serde_json::to_string(event).map_err(ObserverError::from) {
        Ok(json) => json,
        Err(e) => {
            warn!(kind = event.kind(), error = %e, "dropping unserializable event");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn send_snapshot(socket: &mut WebSocket, state: &AppState, draft_id: DraftId) -> bool {
    match state.manager.current_state(draft_id).await {
        Ok(snapshot) => send_event(socket, &DraftEvent::Snapshot(snapshot)).await,
        Err(e) => {
            warn!(%draft_id, error = %e, "state query failed for observer");
            true
        }
    }
}

/// Subscribe, send the opening snapshot, then relay until either side
/// hangs up.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, draft_id: DraftId) {
    let fanout = Arc::clone(state.manager.fanout());
    // Subscribe before the opening snapshot so nothing generated in
    // between is lost.
    let mut subscription = fanout.subscribe(draft_id);
    let observer = subscription.id;
    debug!(%draft_id, %observer, "observer connected");

    if send_snapshot(&mut socket, &state, draft_id).await {
        loop {
            tokio::select! {
                event = subscription.receiver.recv() => {
                    match event {
                        Some(event) => {
                            if !send_event(&mut socket, &event).await {
                                debug!(%observer, "observer disconnected (send failed)");
                                break;
                            }
                        }
                        None => {
                            debug!(%observer, "observer dropped by fan-out");
                            break;
                        }
                    }
                }
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ObserverCommand>(text.as_str()) {
                                Ok(ObserverCommand::State) => {
                                    if !send_snapshot(&mut socket, &state, draft_id).await {
                                        break;
                                    }
                                }
                                Ok(ObserverCommand::Pong { .. }) => {
                                    fanout.record_pong(draft_id, observer);
                                }
                                Err(e) => {
                                    debug!(%observer, error = %e, "ignoring observer message");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if socket.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(%observer, "observer disconnected");
                            break;
                        }
                        Some(Err(e)) => {
                            debug!(%observer, error = %e, "WebSocket error");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    fanout.unsubscribe(draft_id, observer);
}
