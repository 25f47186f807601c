//! Durable store contract.
//!
//! The manager reads and writes every piece of draft state through
//! [`DraftStore`]. Implementations must enforce one pick per
//! `(draft, pick_number)` and one item per draft at the storage layer; the
//! manager relies on that as the final guard against double recording.
//!
//! `draftday-db` provides the `PostgreSQL` implementation;
//! [`InMemoryStore`](crate::memory::InMemoryStore) backs tests and
//! single-process runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draftday_types::{Draft, DraftId, DraftStatus, Item, ItemId, Participant, Pick, TimerRecord};

/// Errors raised by a durable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A pick already exists for this pick number.
    #[error("pick {pick_number} already recorded for draft {draft_id}")]
    PickConflict {
        /// The draft.
        draft_id: DraftId,
        /// The contested pick number.
        pick_number: u32,
    },

    /// The item was already claimed in this draft.
    #[error("item {item_id} already claimed in draft {draft_id}")]
    ItemTaken {
        /// The draft.
        draft_id: DraftId,
        /// The contested item.
        item_id: ItemId,
    },

    /// The backend failed (connection, query or decoding error).
    #[error("store backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// Durable persistence for drafts, picks, items and timers.
#[async_trait]
pub trait DraftStore: Send + Sync + core::fmt::Debug {
    /// Persist a new draft and its seats, in the order given.
    async fn create_draft(&self, draft: &Draft, participants: &[Participant])
    -> Result<(), StoreError>;

    /// Load a draft by id.
    async fn get_draft(&self, draft_id: DraftId) -> Result<Option<Draft>, StoreError>;

    /// Seat profiles of a draft, in turn order.
    async fn participants(&self, draft_id: DraftId) -> Result<Vec<Participant>, StoreError>;

    /// Every draft whose status is one of `statuses`.
    async fn list_drafts_by_status(
        &self,
        statuses: &[DraftStatus],
    ) -> Result<Vec<Draft>, StoreError>;

    /// Move the turn pointer.
    async fn update_turn_pointer(
        &self,
        draft_id: DraftId,
        round: u32,
        pick: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Change the lifecycle status.
    async fn set_status(
        &self,
        draft_id: DraftId,
        status: DraftStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Record a pick.
    ///
    /// Fails with [`StoreError::PickConflict`] if the pick number is taken
    /// and [`StoreError::ItemTaken`] if the item was already claimed.
    async fn record_pick(&self, pick: &Pick) -> Result<(), StoreError>;

    /// Picks of a draft ordered by pick number.
    async fn list_picks(&self, draft_id: DraftId) -> Result<Vec<Pick>, StoreError>;

    /// Delete every pick of a draft. Returns the number removed.
    async fn clear_picks(&self, draft_id: DraftId) -> Result<u64, StoreError>;

    /// Insert pool items. Returns the number inserted.
    async fn seed_items(&self, items: &[Item]) -> Result<u64, StoreError>;

    /// The whole item pool, ordered by name.
    async fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    /// Pool items nobody in the draft has claimed, ordered by name.
    async fn list_available_items(&self, draft_id: DraftId) -> Result<Vec<Item>, StoreError>;

    /// Persist a countdown, replacing any existing one for the draft.
    async fn start_timer(&self, timer: &TimerRecord) -> Result<(), StoreError>;

    /// The countdown persisted for a draft.
    async fn get_timer(&self, draft_id: DraftId) -> Result<Option<TimerRecord>, StoreError>;

    /// Remove the countdown for a draft in one operation. Returns whether a
    /// record existed.
    async fn delete_timer(&self, draft_id: DraftId) -> Result<bool, StoreError>;

    /// Mirror a running countdown. Re-creates the record if an earlier
    /// write was lost.
    async fn record_timer_tick(
        &self,
        timer: &TimerRecord,
        remaining_seconds: i64,
    ) -> Result<(), StoreError>;

    /// Every persisted countdown across all drafts.
    async fn list_active_timers(&self) -> Result<Vec<TimerRecord>, StoreError>;
}
