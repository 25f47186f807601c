//! In-process implementations of [`DraftStore`] and [`StateCache`].
//!
//! Used when no `PostgreSQL` or `Dragonfly` URL is configured, and by the
//! test suites. The store enforces the same uniqueness rules as the SQL
//! schema and can be told to fail writes or pool reads so failure paths
//! are testable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draftday_types::{
    Draft, DraftId, DraftSnapshot, DraftStatus, Item, Participant, Pick, TimerRecord,
};
use tokio::sync::{Mutex, RwLock};

use crate::cache::{CacheError, StateCache};
use crate::store::{DraftStore, StoreError};

#[derive(Debug, Default)]
struct StoreState {
    drafts: BTreeMap<DraftId, Draft>,
    participants: BTreeMap<DraftId, Vec<Participant>>,
    picks: BTreeMap<DraftId, Vec<Pick>>,
    items: Vec<Item>,
    timers: BTreeMap<DraftId, StoredTimer>,
}

#[derive(Debug, Clone)]
struct StoredTimer {
    record: TimerRecord,
    last_remaining: Option<i64>,
}

impl StoreState {
    fn draft_mut(&mut self, draft_id: DraftId) -> Result<&mut Draft, StoreError> {
        self.drafts.get_mut(&draft_id).ok_or_else(|| StoreError::NotFound {
            entity: "draft",
            id: draft_id.to_string(),
        })
    }
}

/// A [`DraftStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    fail_pick_writes: AtomicBool,
    fail_timer_writes: AtomicBool,
    fail_item_reads: AtomicBool,
    pick_writes: AtomicU64,
}

impl InMemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `record_pick` fail (or succeed again).
    pub fn fail_pick_writes(&self, fail: bool) {
        self.fail_pick_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent timer write fail (or succeed again).
    pub fn fail_timer_writes(&self, fail: bool) {
        self.fail_timer_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `list_items` fail (or succeed again).
    pub fn fail_item_reads(&self, fail: bool) {
        self.fail_item_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `record_pick` calls.
    pub fn pick_writes(&self) -> u64 {
        self.pick_writes.load(Ordering::SeqCst)
    }

    /// Remaining seconds written by the last timer mirror for a draft.
    pub async fn last_mirrored_remaining(&self, draft_id: DraftId) -> Option<i64> {
        self.state
            .lock()
            .await
            .timers
            .get(&draft_id)
            .and_then(|timer| timer.last_remaining)
    }

    fn backend_failure(operation: &str) -> StoreError {
        StoreError::Backend {
            message: format!("{operation} rejected by injected failure"),
        }
    }
}

#[async_trait]
impl DraftStore for InMemoryStore {
    async fn create_draft(
        &self,
        draft: &Draft,
        participants: &[Participant],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.drafts.insert(draft.id, draft.clone());
        state.participants.insert(draft.id, participants.to_vec());
        state.picks.insert(draft.id, Vec::new());
        Ok(())
    }

    async fn get_draft(&self, draft_id: DraftId) -> Result<Option<Draft>, StoreError> {
        Ok(self.state.lock().await.drafts.get(&draft_id).cloned())
    }

    async fn participants(&self, draft_id: DraftId) -> Result<Vec<Participant>, StoreError> {
        let state = self.state.lock().await;
        let Some(draft) = state.drafts.get(&draft_id) else {
            return Err(StoreError::NotFound {
                entity: "draft",
                id: draft_id.to_string(),
            });
        };
        let seats = state.participants.get(&draft_id).cloned().unwrap_or_default();
        Ok(draft
            .order
            .iter()
            .filter_map(|id| seats.iter().find(|seat| seat.id == *id).cloned())
            .collect())
    }

    async fn list_drafts_by_status(
        &self,
        statuses: &[DraftStatus],
    ) -> Result<Vec<Draft>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .drafts
            .values()
            .filter(|draft| statuses.contains(&draft.status))
            .cloned()
            .collect())
    }

    async fn update_turn_pointer(
        &self,
        draft_id: DraftId,
        round: u32,
        pick: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let draft = state.draft_mut(draft_id)?;
        draft.current_round = round;
        draft.current_pick = pick;
        draft.updated_at = at;
        Ok(())
    }

    async fn set_status(
        &self,
        draft_id: DraftId,
        status: DraftStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let draft = state.draft_mut(draft_id)?;
        draft.status = status;
        draft.updated_at = at;
        Ok(())
    }

    async fn record_pick(&self, pick: &Pick) -> Result<(), StoreError> {
        if self.fail_pick_writes.load(Ordering::SeqCst) {
            return Err(Self::backend_failure("record_pick"));
        }
        let mut state = self.state.lock().await;
        state.draft_mut(pick.draft_id)?;
        let picks = state.picks.entry(pick.draft_id).or_default();
        if picks.iter().any(|p| p.pick_number == pick.pick_number) {
            return Err(StoreError::PickConflict {
                draft_id: pick.draft_id,
                pick_number: pick.pick_number,
            });
        }
        if picks.iter().any(|p| p.item_id == pick.item_id) {
            return Err(StoreError::ItemTaken {
                draft_id: pick.draft_id,
                item_id: pick.item_id,
            });
        }
        picks.push(pick.clone());
        picks.sort_by_key(|p| p.pick_number);
        self.pick_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_picks(&self, draft_id: DraftId) -> Result<Vec<Pick>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .picks
            .get(&draft_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_picks(&self, draft_id: DraftId) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let removed = state
            .picks
            .get_mut(&draft_id)
            .map(std::mem::take)
            .unwrap_or_default();
        Ok(u64::try_from(removed.len()).unwrap_or(u64::MAX))
    }

    async fn seed_items(&self, items: &[Item]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut inserted: u64 = 0;
        for item in items {
            if state.items.iter().all(|existing| existing.id != item.id) {
                state.items.push(item.clone());
                inserted = inserted.saturating_add(1);
            }
        }
        state.items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(inserted)
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        if self.fail_item_reads.load(Ordering::SeqCst) {
            return Err(Self::backend_failure("list_items"));
        }
        Ok(self.state.lock().await.items.clone())
    }

    async fn list_available_items(&self, draft_id: DraftId) -> Result<Vec<Item>, StoreError> {
        let state = self.state.lock().await;
        let picks = state.picks.get(&draft_id).map(Vec::as_slice).unwrap_or_default();
        Ok(state
            .items
            .iter()
            .filter(|item| picks.iter().all(|pick| pick.item_id != item.id))
            .cloned()
            .collect())
    }

    async fn start_timer(&self, timer: &TimerRecord) -> Result<(), StoreError> {
        if self.fail_timer_writes.load(Ordering::SeqCst) {
            return Err(Self::backend_failure("start_timer"));
        }
        self.state.lock().await.timers.insert(
            timer.draft_id,
            StoredTimer {
                record: timer.clone(),
                last_remaining: None,
            },
        );
        Ok(())
    }

    async fn get_timer(&self, draft_id: DraftId) -> Result<Option<TimerRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .timers
            .get(&draft_id)
            .map(|timer| timer.record.clone()))
    }

    async fn delete_timer(&self, draft_id: DraftId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.timers.remove(&draft_id).is_some())
    }

    async fn record_timer_tick(
        &self,
        timer: &TimerRecord,
        remaining_seconds: i64,
    ) -> Result<(), StoreError> {
        if self.fail_timer_writes.load(Ordering::SeqCst) {
            return Err(Self::backend_failure("record_timer_tick"));
        }
        self.state.lock().await.timers.insert(
            timer.draft_id,
            StoredTimer {
                record: timer.clone(),
                last_remaining: Some(remaining_seconds),
            },
        );
        Ok(())
    }

    async fn list_active_timers(&self) -> Result<Vec<TimerRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .timers
            .values()
            .map(|timer| timer.record.clone())
            .collect())
    }
}

/// A [`StateCache`] held in a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    timers: RwLock<BTreeMap<DraftId, TimerRecord>>,
    snapshots: RwLock<BTreeMap<DraftId, DraftSnapshot>>,
}

impl InMemoryCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateCache for InMemoryCache {
    async fn set_timer(&self, timer: &TimerRecord) -> Result<(), CacheError> {
        self.timers.write().await.insert(timer.draft_id, timer.clone());
        Ok(())
    }

    async fn timer(&self, draft_id: DraftId) -> Result<Option<TimerRecord>, CacheError> {
        Ok(self.timers.read().await.get(&draft_id).cloned())
    }

    async fn clear_timer(&self, draft_id: DraftId) -> Result<(), CacheError> {
        self.timers.write().await.remove(&draft_id);
        Ok(())
    }

    async fn put_snapshot(&self, snapshot: &DraftSnapshot) -> Result<(), CacheError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.draft.id, snapshot.clone());
        Ok(())
    }

    async fn snapshot(&self, draft_id: DraftId) -> Result<Option<DraftSnapshot>, CacheError> {
        Ok(self.snapshots.read().await.get(&draft_id).cloned())
    }

    async fn evict(&self, draft_id: DraftId) -> Result<(), CacheError> {
        self.timers.write().await.remove(&draft_id);
        self.snapshots.write().await.remove(&draft_id);
        Ok(())
    }
}
