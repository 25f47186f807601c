//! Messages exchanged with draft observers.
//!
//! [`DraftEvent`] flows from the engine to observers. [`ObserverCommand`]
//! is the only thing observers may send back: a request for the full
//! current state, or a liveness response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{DraftId, ParticipantId};
use crate::structs::{DraftSnapshot, Pick, TurnSlot};

/// A state change pushed to every observer of one draft.
///
/// Serialized with a `type` tag, e.g. `{"type":"timer_tick", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DraftEvent {
    /// Full current state.
    Snapshot(DraftSnapshot),
    /// The preparation countdown began.
    DraftStarting {
        /// Draft that is starting.
        draft_id: DraftId,
        /// Length of the preparation countdown.
        seconds: u32,
    },
    /// The preparation countdown finished and picks are now accepted.
    DraftStarted {
        /// Draft that became active.
        draft_id: DraftId,
    },
    /// One tick of the preparation countdown.
    Countdown {
        /// Draft that is starting.
        draft_id: DraftId,
        /// Seconds until the first turn.
        remaining_seconds: i64,
    },
    /// A participant's turn clock began.
    TurnStarted {
        /// Draft the turn belongs to.
        draft_id: DraftId,
        /// Who is on the clock, and at which pick.
        slot: TurnSlot,
        /// Turn length in seconds.
        duration_seconds: u32,
        /// When the clock started.
        started_at: DateTime<Utc>,
    },
    /// A participant picked manually.
    PickMade {
        /// Draft the pick belongs to.
        draft_id: DraftId,
        /// The recorded pick.
        pick: Pick,
    },
    /// The fallback selector picked for a participant.
    AutoPickMade {
        /// Draft the pick belongs to.
        draft_id: DraftId,
        /// The recorded pick (`is_auto_pick` is always set).
        pick: Pick,
    },
    /// One tick of a participant's turn clock.
    TimerTick {
        /// Draft the turn belongs to.
        draft_id: DraftId,
        /// Participant on the clock.
        participant_id: ParticipantId,
        /// Pick number being timed.
        pick_number: u32,
        /// Seconds left.
        remaining_seconds: i64,
    },
    /// Every pick has been made.
    DraftCompleted {
        /// Draft that completed.
        draft_id: DraftId,
        /// Number of picks recorded.
        total_picks: u32,
    },
    /// A fallback pick found nothing to select; the draft is frozen.
    DraftStalled {
        /// Draft that stalled.
        draft_id: DraftId,
        /// Human-readable cause.
        reason: String,
    },
    /// The draft was canceled.
    DraftCanceled {
        /// Draft that was canceled.
        draft_id: DraftId,
    },
    /// The draft was reset to `not_started`.
    DraftReset {
        /// Draft that was reset.
        draft_id: DraftId,
    },
    /// Liveness probe; observers answer with [`ObserverCommand::Pong`].
    Ping {
        /// Round number of the liveness sweep.
        nonce: u64,
    },
}

impl DraftEvent {
    /// The `type` tag this event serializes with.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::DraftStarting { .. } => "draft_starting",
            Self::DraftStarted { .. } => "draft_started",
            Self::Countdown { .. } => "countdown",
            Self::TurnStarted { .. } => "turn_started",
            Self::PickMade { .. } => "pick_made",
            Self::AutoPickMade { .. } => "auto_pick_made",
            Self::TimerTick { .. } => "timer_tick",
            Self::DraftCompleted { .. } => "draft_completed",
            Self::DraftStalled { .. } => "draft_stalled",
            Self::DraftCanceled { .. } => "draft_canceled",
            Self::DraftReset { .. } => "draft_reset",
            Self::Ping { .. } => "ping",
        }
    }

    /// The draft this event concerns (`None` for liveness probes).
    pub const fn draft_id(&self) -> Option<DraftId> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot.draft.id),
            Self::DraftStarting { draft_id, .. }
            | Self::Countdown { draft_id, .. }
            | Self::TurnStarted { draft_id, .. }
            | Self::PickMade { draft_id, .. }
            | Self::AutoPickMade { draft_id, .. }
            | Self::TimerTick { draft_id, .. }
            | Self::DraftCompleted { draft_id, .. }
            | Self::DraftStalled { draft_id, .. }
            | Self::DraftStarted { draft_id }
            | Self::DraftCanceled { draft_id }
            | Self::DraftReset { draft_id } => Some(*draft_id),
            Self::Ping { .. } => None,
        }
    }
}

/// A message an observer may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ObserverCommand {
    /// Ask for the full current state.
    State,
    /// Answer a liveness probe.
    Pong {
        /// Nonce from the [`DraftEvent::Ping`] being answered.
        #[serde(default)]
        nonce: u64,
    },
}
