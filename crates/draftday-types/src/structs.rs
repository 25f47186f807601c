//! Core entity structs: drafts, participants, items, picks, timers, and
//! the full-state snapshot served to observers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AutopickStrategy, DraftStatus, ParticipantKind, TimerKind};
use crate::ids::{DraftId, ItemId, ParticipantId, PickId};

// ---------------------------------------------------------------------------
// Item pool
// ---------------------------------------------------------------------------

/// A claimable item from the shared pool.
///
/// `attributes` holds free-form tags (for example `conference` and
/// `division`). The eligibility rule derives an item's category from a
/// configured subset of these attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Item {
    /// Unique item identifier.
    pub id: ItemId,
    /// Human-readable name (also the key for alphabetical autopicks).
    pub name: String,
    /// Attribute tags keyed by attribute name.
    pub attributes: BTreeMap<String, String>,
}

impl Item {
    /// Build an item from a name and `(attribute, value)` pairs.
    pub fn new(name: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            id: ItemId::new(),
            name: name.to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    /// Look up a single attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// A seat in a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Participant {
    /// Unique participant identifier.
    pub id: ParticipantId,
    /// Name shown to observers.
    pub display_name: String,
    /// Human or scripted.
    #[serde(default)]
    pub kind: ParticipantKind,
    /// Selection strategy used when this participant is autopicked.
    #[serde(default)]
    pub strategy: AutopickStrategy,
    /// Ordered preferences consulted by [`AutopickStrategy::PreferenceOrder`].
    #[serde(default)]
    pub preferences: Vec<ItemId>,
}

impl Participant {
    /// A human participant with default autopick settings.
    pub fn human(display_name: &str) -> Self {
        Self {
            id: ParticipantId::new(),
            display_name: display_name.to_owned(),
            kind: ParticipantKind::Human,
            strategy: AutopickStrategy::Random,
            preferences: Vec::new(),
        }
    }

    /// A scripted participant using the given strategy.
    pub fn scripted(display_name: &str, strategy: AutopickStrategy) -> Self {
        Self {
            id: ParticipantId::new(),
            display_name: display_name.to_owned(),
            kind: ParticipantKind::Scripted,
            strategy,
            preferences: Vec::new(),
        }
    }

    /// Whether every pick for this seat is made by the fallback selector.
    pub const fn is_scripted(&self) -> bool {
        matches!(self.kind, ParticipantKind::Scripted)
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// One instance of the draft process.
///
/// `order` is fixed at creation. `current_pick` spans all rounds and starts
/// at 1; `current_round` is always `ceil(current_pick / order.len())` while
/// picks remain. Once every pick is made `current_pick` rests at
/// `total_picks() + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Draft {
    /// Unique draft identifier.
    pub id: DraftId,
    /// Turn order for odd rounds (even rounds run it in reverse).
    pub order: Vec<ParticipantId>,
    /// Number of rounds.
    pub total_rounds: u32,
    /// Seconds each participant has to pick.
    pub pick_seconds: u32,
    /// Current round (1-indexed).
    pub current_round: u32,
    /// Current pick number across the whole draft (1-indexed).
    pub current_pick: u32,
    /// Lifecycle status.
    pub status: DraftStatus,
    /// When the draft was created.
    pub created_at: DateTime<Utc>,
    /// Last time the status or turn pointer changed.
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// Number of seats, saturated into `u32`.
    pub fn participant_count(&self) -> u32 {
        u32::try_from(self.order.len()).unwrap_or(u32::MAX)
    }

    /// Total number of picks across all rounds.
    pub fn total_picks(&self) -> u32 {
        self.total_rounds.saturating_mul(self.participant_count())
    }

    /// Whether `current_pick` has run past the final pick.
    pub fn all_picks_made(&self) -> bool {
        self.current_pick > self.total_picks()
    }

    /// Whether `participant` holds a seat in this draft.
    pub fn has_participant(&self, participant: ParticipantId) -> bool {
        self.order.contains(&participant)
    }
}

/// Request payload for creating a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewDraft {
    /// Seats, in turn order unless `randomize_order` is set.
    pub participants: Vec<Participant>,
    /// Number of rounds.
    pub total_rounds: u32,
    /// Seconds per pick; the configured default applies when absent.
    #[serde(default)]
    pub pick_seconds: Option<u32>,
    /// Shuffle the seats before the order is persisted.
    #[serde(default)]
    pub randomize_order: bool,
}

// ---------------------------------------------------------------------------
// Picks
// ---------------------------------------------------------------------------

/// An immutable record of one participant claiming one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Pick {
    /// Unique pick identifier.
    pub id: PickId,
    /// Draft the pick belongs to.
    pub draft_id: DraftId,
    /// Participant who made (or was given) the pick.
    pub participant_id: ParticipantId,
    /// Claimed item.
    pub item_id: ItemId,
    /// Round the pick was made in.
    pub round: u32,
    /// Pick number across the whole draft.
    pub pick_number: u32,
    /// Whether the fallback selector chose the item.
    pub is_auto_pick: bool,
    /// When the pick was recorded.
    pub picked_at: DateTime<Utc>,
}

/// The turn currently owed: who picks, and at which position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TurnSlot {
    /// Round (1-indexed).
    pub round: u32,
    /// Pick number across the whole draft (1-indexed).
    pub pick_number: u32,
    /// Position within the round (1-indexed).
    pub pick_in_round: u32,
    /// Participant owed the pick.
    pub participant_id: ParticipantId,
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// A persisted countdown.
///
/// Remaining time is always derived from `started_at` and
/// `duration_seconds`; it is never stored as a decrementing counter, so a
/// restart recomputes it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TimerRecord {
    /// Draft the timer belongs to.
    pub draft_id: DraftId,
    /// Preparation countdown or turn clock.
    pub kind: TimerKind,
    /// Participant owed a pick (`None` for the preparation countdown).
    pub participant_id: Option<ParticipantId>,
    /// Pick number the turn clock is for (`None` for preparation).
    pub pick_number: Option<u32>,
    /// Countdown length in seconds.
    pub duration_seconds: u32,
    /// When the countdown started.
    pub started_at: DateTime<Utc>,
}

impl TimerRecord {
    /// A turn clock for `slot` starting at `started_at`.
    pub const fn turn(
        draft_id: DraftId,
        slot: &TurnSlot,
        duration_seconds: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            draft_id,
            kind: TimerKind::Turn,
            participant_id: Some(slot.participant_id),
            pick_number: Some(slot.pick_number),
            duration_seconds,
            started_at,
        }
    }

    /// A preparation countdown starting at `started_at`.
    pub const fn preparation(
        draft_id: DraftId,
        duration_seconds: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            draft_id,
            kind: TimerKind::Preparation,
            participant_id: None,
            pick_number: None,
            duration_seconds,
            started_at,
        }
    }

    /// Instant at which the countdown reaches zero.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at
            .checked_add_signed(chrono::TimeDelta::seconds(i64::from(self.duration_seconds)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Milliseconds left at `now`. Negative once the deadline has passed.
    pub fn remaining_millis(&self, now: DateTime<Utc>) -> i64 {
        self.deadline()
            .signed_duration_since(now)
            .num_milliseconds()
    }

    /// Whole seconds left at `now`, rounded up and floored at zero.
    ///
    /// A countdown with 59.2s left reports 60; one that has expired
    /// reports 0.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let millis = self.remaining_millis(now);
        if millis <= 0 {
            return 0;
        }
        millis.saturating_add(999) / 1000
    }

    /// Whether the countdown has run out at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_millis(now) <= 0
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Full current state of a draft.
///
/// Every broadcast event is derivable from a sequence of these, which is
/// what lets reconnecting observers and polling clients resynchronize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DraftSnapshot {
    /// Draft metadata and turn pointer.
    pub draft: Draft,
    /// Seat profiles in turn order.
    pub participants: Vec<Participant>,
    /// Picks recorded so far, ordered by pick number.
    pub picks: Vec<Pick>,
    /// Items nobody has claimed yet.
    pub available: Vec<Item>,
    /// The turn currently owed, if the draft is active.
    pub on_the_clock: Option<TurnSlot>,
    /// The running countdown, if any.
    pub timer: Option<TimerRecord>,
    /// Seconds left on `timer` when the snapshot was produced.
    pub seconds_remaining: Option<i64>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn timer_at(start: DateTime<Utc>) -> TimerRecord {
        TimerRecord::preparation(DraftId::new(), 60, start)
    }

    #[test]
    fn remaining_is_derived_from_start() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).single();
        let Some(start) = start else {
            return;
        };
        let timer = timer_at(start);
        let now = start + chrono::TimeDelta::seconds(15);
        assert_eq!(timer.remaining_seconds(now), 45);
        assert!(!timer.is_expired(now));
    }

    #[test]
    fn overdue_timer_reports_zero_and_negative_millis() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).single();
        let Some(start) = start else {
            return;
        };
        let timer = timer_at(start);
        let now = start + chrono::TimeDelta::seconds(70);
        assert_eq!(timer.remaining_seconds(now), 0);
        assert_eq!(timer.remaining_millis(now), -10_000);
        assert!(timer.is_expired(now));
    }

    #[test]
    fn partial_seconds_round_up() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).single();
        let Some(start) = start else {
            return;
        };
        let timer = timer_at(start);
        let now = start + chrono::TimeDelta::milliseconds(800);
        assert_eq!(timer.remaining_seconds(now), 60);
    }

    #[test]
    fn draft_counts() {
        let draft = Draft {
            id: DraftId::new(),
            order: vec![ParticipantId::new(), ParticipantId::new(), ParticipantId::new()],
            total_rounds: 4,
            pick_seconds: 30,
            current_round: 1,
            current_pick: 13,
            status: DraftStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(draft.participant_count(), 3);
        assert_eq!(draft.total_picks(), 12);
        assert!(draft.all_picks_made());
    }
}
