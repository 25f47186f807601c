//! Snake-order turn engine.
//!
//! Pure functions over a [`Draft`]: who is owed the current pick, whether a
//! candidate pick is legal, and how the turn pointer moves afterwards. No
//! I/O happens here; the manager feeds in the pool and picks it loaded.
//!
//! Pick numbers span the whole draft and start at 1. For `N` participants,
//! pick `k` falls in round `ceil(k / N)` at position `((k - 1) mod N) + 1`.
//! Odd rounds walk the order forward, even rounds walk it backward, so the
//! last picker of one round picks first in the next.

use chrono::{DateTime, Utc};
use draftday_types::{Draft, DraftStatus, Item, ItemId, ParticipantId, Pick, TurnSlot};

use crate::eligibility::{CategoryRule, Eligibility};
use crate::error::DraftError;

/// Result of moving the turn pointer past a recorded pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Another pick is owed.
    Next(TurnSlot),
    /// Every pick has been made; the draft is now completed.
    Completed,
}

/// Round containing `pick_number`, i.e. `ceil(pick_number / participants)`.
///
/// Returns `None` for pick 0 or an empty draft.
pub const fn round_for_pick(pick_number: u32, participants: u32) -> Option<u32> {
    if pick_number == 0 || participants == 0 {
        return None;
    }
    match pick_number.checked_sub(1) {
        Some(zero_based) => match zero_based.checked_div(participants) {
            Some(round) => round.checked_add(1),
            None => None,
        },
        None => None,
    }
}

/// Index into the turn order for a position within a round.
///
/// `pick_in_round` is 1-indexed. Odd rounds map position `p` to `p - 1`;
/// even rounds map it to `N - p`.
pub const fn order_index(round: u32, pick_in_round: u32, participants: u32) -> Option<u32> {
    if round == 0 || pick_in_round == 0 || pick_in_round > participants {
        return None;
    }
    let Some(forward) = pick_in_round.checked_sub(1) else {
        return None;
    };
    if round & 1 == 1 {
        Some(forward)
    } else {
        match participants.checked_sub(1) {
            Some(last) => last.checked_sub(forward),
            None => None,
        }
    }
}

/// The slot for an arbitrary pick number, ignoring draft status.
///
/// Returns `None` when `pick_number` is outside `1..=total_picks`.
pub fn slot_for_pick(draft: &Draft, pick_number: u32) -> Option<TurnSlot> {
    let participants = draft.participant_count();
    if pick_number > draft.total_picks() {
        return None;
    }
    let round = round_for_pick(pick_number, participants)?;
    let pick_in_round = pick_number.checked_sub(1)?.checked_rem(participants)?.checked_add(1)?;
    let index = order_index(round, pick_in_round, participants)?;
    let participant_id = *draft.order.get(usize::try_from(index).ok()?)?;
    Some(TurnSlot {
        round,
        pick_number,
        pick_in_round,
        participant_id,
    })
}

/// The turn currently owed, or `None` unless the draft is active with picks
/// remaining.
pub fn current_slot(draft: &Draft) -> Option<TurnSlot> {
    if draft.status != DraftStatus::Active {
        return None;
    }
    slot_for_pick(draft, draft.current_pick)
}

/// The participant currently owed a pick.
pub fn current_participant(draft: &Draft) -> Option<ParticipantId> {
    current_slot(draft).map(|slot| slot.participant_id)
}

/// Everything the engine needs to judge a pick besides the draft itself.
#[derive(Debug, Clone, Copy)]
pub struct PickContext<'a> {
    /// The full item pool.
    pub pool: &'a [Item],
    /// Picks recorded so far in this draft.
    pub picks: &'a [Pick],
}

impl<'a> PickContext<'a> {
    /// Items nobody in this draft has claimed.
    pub fn available(&self) -> Vec<&'a Item> {
        self.pool
            .iter()
            .filter(|item| !self.picks.iter().any(|pick| pick.item_id == item.id))
            .collect()
    }

    /// Items already claimed by `participant`.
    pub fn held_by(&self, participant: ParticipantId) -> Vec<&'a Item> {
        self.picks
            .iter()
            .filter(|pick| pick.participant_id == participant)
            .filter_map(|pick| self.pool.iter().find(|item| item.id == pick.item_id))
            .collect()
    }

    /// Eligibility of every available item for `participant`.
    pub fn eligibility(&self, rule: &CategoryRule, participant: ParticipantId) -> Eligibility<'a> {
        Eligibility::evaluate(rule, &self.held_by(participant), &self.available())
    }
}

/// Check a candidate pick against status, turn, availability and the
/// category cap. Returns the slot being filled.
///
/// # Errors
///
/// - [`DraftError::InvalidState`] if the draft is not active.
/// - [`DraftError::NotFound`] if the participant has no seat or the item is
///   not in the pool.
/// - [`DraftError::WrongTurn`] if someone else is owed the pick.
/// - [`DraftError::ItemUnavailable`] if the item was already claimed.
/// - [`DraftError::EligibilityViolation`] if the cap rejects the item and a
///   legal alternative exists.
pub fn validate_pick(
    draft: &Draft,
    participant: ParticipantId,
    item_id: ItemId,
    context: &PickContext<'_>,
    rule: &CategoryRule,
) -> Result<TurnSlot, DraftError> {
    if draft.status != DraftStatus::Active {
        return Err(DraftError::invalid_state(draft.id, draft.status, "pick in"));
    }
    if !draft.has_participant(participant) {
        return Err(DraftError::NotFound {
            entity: "participant",
            id: participant.to_string(),
        });
    }
    let slot = current_slot(draft)
        .ok_or_else(|| DraftError::invalid_state(draft.id, draft.status, "pick in"))?;
    if slot.participant_id != participant {
        return Err(DraftError::WrongTurn {
            participant_id: participant,
            pick_number: slot.pick_number,
        });
    }

    let Some(item) = context.pool.iter().find(|item| item.id == item_id) else {
        return Err(DraftError::NotFound {
            entity: "item",
            id: item_id.to_string(),
        });
    };
    if context.picks.iter().any(|pick| pick.item_id == item_id) {
        return Err(DraftError::ItemUnavailable { item_id });
    }

    let eligibility = context.eligibility(rule, participant);
    if !eligibility.permits(item_id) {
        return Err(DraftError::EligibilityViolation {
            item_id,
            category: rule.category_of(item),
            cap: rule.cap(),
        });
    }
    Ok(slot)
}

/// Move the turn pointer past the current pick.
///
/// Marks the draft completed once the final pick is passed. The round is
/// only recomputed while picks remain, so a completed draft keeps its last
/// round.
pub fn advance(draft: &mut Draft, now: DateTime<Utc>) -> Advance {
    let next_pick = draft.current_pick.saturating_add(1);
    draft.current_pick = next_pick;
    draft.updated_at = now;

    if next_pick > draft.total_picks() {
        draft.status = DraftStatus::Completed;
        return Advance::Completed;
    }
    if let Some(round) = round_for_pick(next_pick, draft.participant_count()) {
        draft.current_round = round;
    }
    match current_slot(draft) {
        Some(slot) => Advance::Next(slot),
        None => Advance::Completed,
    }
}

/// Align the turn pointer with the number of durably recorded picks.
///
/// Picks are written before the pointer, so a crash between the two leaves
/// the stored pointer one behind. Returns `true` if the pointer moved.
pub fn reconcile(draft: &mut Draft, recorded_picks: u32) -> bool {
    let expected_pick = recorded_picks.saturating_add(1);
    let expected_round = round_for_pick(
        expected_pick.min(draft.total_picks().max(1)),
        draft.participant_count(),
    )
    .unwrap_or(1);
    if draft.current_pick == expected_pick && draft.current_round == expected_round {
        return false;
    }
    draft.current_pick = expected_pick;
    draft.current_round = expected_round;
    true
}
