//! The draft manager service.
//!
//! [`DraftManager`] is constructed once at startup and cloned into every
//! request handler and background task. It owns no global state: the store,
//! cache, fan-out hub and clock are injected through [`DraftManagerBuilder`].
//!
//! All mutations of one draft run under that draft's own async mutex, and
//! every mutation reloads the draft from the durable store before acting.
//! Drafts never share a lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use draftday_types::{
    Draft, DraftEvent, DraftId, DraftSnapshot, DraftStatus, Item, ItemId, NewDraft, Participant,
    ParticipantId, Pick, PickId, TimerKind, TimerRecord,
};
use rand::seq::SliceRandom;

use crate::autopick::Autopicker;
use crate::cache::StateCache;
use crate::clock::{Clock, SystemClock};
use crate::config::DraftdayConfig;
use crate::eligibility::CategoryRule;
use crate::error::DraftError;
use crate::fanout::FanOut;
use crate::memory::InMemoryCache;
use crate::pool;
use crate::store::{DraftStore, StoreError};
use crate::timer::{ArmMode, ExpiryCause, TimerRegistry};
use crate::turn::{self, Advance, PickContext};

/// Downstream hook run once when a draft records its final pick.
#[async_trait]
pub trait PoolInitializer: Send + Sync + core::fmt::Debug {
    /// Called after the draft is durably marked completed.
    async fn draft_completed(&self, draft: &Draft, picks: &[Pick]);
}

/// A [`PoolInitializer`] that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPoolInitializer;

#[async_trait]
impl PoolInitializer for LoggingPoolInitializer {
    async fn draft_completed(&self, draft: &Draft, picks: &[Pick]) {
        tracing::info!(draft_id = %draft.id, picks = picks.len(), "draft completed, pools ready for initialization");
    }
}

#[derive(Debug)]
struct ManagerInner {
    store: Arc<dyn DraftStore>,
    cache: Arc<dyn StateCache>,
    fanout: Arc<FanOut>,
    clock: Arc<dyn Clock>,
    pool_initializer: Arc<dyn PoolInitializer>,
    config: DraftdayConfig,
    rule: CategoryRule,
    autopicker: Autopicker,
    locks: Mutex<HashMap<DraftId, Arc<tokio::sync::Mutex<()>>>>,
    timers: TimerRegistry,
}

/// Builder for [`DraftManager`].
#[derive(Debug)]
pub struct DraftManagerBuilder {
    store: Arc<dyn DraftStore>,
    config: DraftdayConfig,
    cache: Option<Arc<dyn StateCache>>,
    fanout: Option<Arc<FanOut>>,
    clock: Option<Arc<dyn Clock>>,
    pool_initializer: Option<Arc<dyn PoolInitializer>>,
}

impl DraftManagerBuilder {
    /// Use `cache` instead of a process-local cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn StateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share an existing fan-out hub.
    #[must_use]
    pub fn fanout(mut self, fanout: Arc<FanOut>) -> Self {
        self.fanout = Some(fanout);
        self
    }

    /// Read time from `clock` instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Run `initializer` when a draft completes.
    #[must_use]
    pub fn pool_initializer(mut self, initializer: Arc<dyn PoolInitializer>) -> Self {
        self.pool_initializer = Some(initializer);
        self
    }

    /// Finish construction.
    pub fn build(self) -> DraftManager {
        let fanout = self
            .fanout
            .unwrap_or_else(|| Arc::new(FanOut::new(self.config.fanout.channel_capacity)));
        DraftManager {
            inner: Arc::new(ManagerInner {
                store: self.store,
                cache: self
                    .cache
                    .unwrap_or_else(|| Arc::new(InMemoryCache::new())),
                fanout,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                pool_initializer: self
                    .pool_initializer
                    .unwrap_or_else(|| Arc::new(LoggingPoolInitializer)),
                rule: self.config.eligibility.rule(),
                autopicker: Autopicker::new(&self.config.autopick),
                config: self.config,
                locks: Mutex::new(HashMap::new()),
                timers: TimerRegistry::default(),
            }),
        }
    }
}

/// Runs every draft hosted by this process.
#[derive(Debug, Clone)]
pub struct DraftManager {
    inner: Arc<ManagerInner>,
}

impl DraftManager {
    /// Start building a manager over `store` with `config`.
    pub fn builder(store: Arc<dyn DraftStore>, config: DraftdayConfig) -> DraftManagerBuilder {
        DraftManagerBuilder {
            store,
            config,
            cache: None,
            fanout: None,
            clock: None,
            pool_initializer: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The durable store.
    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.inner.store
    }

    /// The ephemeral cache.
    pub fn cache(&self) -> &Arc<dyn StateCache> {
        &self.inner.cache
    }

    /// The observer hub.
    pub fn fanout(&self) -> &Arc<FanOut> {
        &self.inner.fanout
    }

    /// The clock every countdown is measured against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Effective configuration.
    pub fn config(&self) -> &DraftdayConfig {
        &self.inner.config
    }

    /// The category cap rule in force.
    pub fn rule(&self) -> &CategoryRule {
        &self.inner.rule
    }

    pub(crate) fn autopicker(&self) -> &Autopicker {
        &self.inner.autopicker
    }

    pub(crate) fn timers(&self) -> &TimerRegistry {
        &self.inner.timers
    }

    /// Whether this process is running a countdown (or transition) for the
    /// draft.
    pub fn has_running_timer(&self, draft_id: DraftId) -> bool {
        self.inner.timers.contains(draft_id)
    }

    /// Number of drafts with a running countdown or transition.
    pub fn running_timers(&self) -> usize {
        self.inner.timers.len()
    }

    /// The mutex serializing mutations of one draft.
    pub(crate) fn draft_lock(&self, draft_id: DraftId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.inner
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(draft_id)
                .or_default(),
        )
    }

    // =========================================================================
    // Item pool
    // =========================================================================

    /// Seed the default pool if the store holds no items yet.
    pub async fn seed_default_pool(&self) -> Result<u64, DraftError> {
        if !self.inner.store.list_items().await?.is_empty() {
            return Ok(0);
        }
        let inserted = self.inner.store.seed_items(&pool::default_pool()).await?;
        tracing::info!(items = inserted, "seeded default item pool");
        Ok(inserted)
    }

    /// The whole item pool.
    pub async fn list_items(&self) -> Result<Vec<Item>, DraftError> {
        Ok(self.inner.store.list_items().await?)
    }

    // =========================================================================
    // Administrative operations
    // =========================================================================

    /// Validate and persist a new draft in the `not_started` state.
    ///
    /// The seat order is shuffled first when `randomize_order` is set.
    pub async fn create_draft(&self, request: NewDraft) -> Result<Draft, DraftError> {
        let NewDraft {
            mut participants,
            total_rounds,
            pick_seconds,
            randomize_order,
        } = request;

        if participants.is_empty() {
            return Err(invalid("a draft needs at least one participant"));
        }
        if total_rounds == 0 {
            return Err(invalid("total_rounds must be at least 1"));
        }
        let pick_seconds = pick_seconds.unwrap_or(self.inner.config.draft.default_pick_seconds);
        if pick_seconds == 0 {
            return Err(invalid("pick_seconds must be at least 1"));
        }
        for (index, seat) in participants.iter().enumerate() {
            if participants.iter().skip(index.saturating_add(1)).any(|other| other.id == seat.id) {
                return Err(invalid(&format!("participant {} is seated twice", seat.id)));
            }
        }
        let seats = u32::try_from(participants.len()).unwrap_or(u32::MAX);
        let total_picks = u64::from(seats).saturating_mul(u64::from(total_rounds));
        let pool_size = u64::try_from(self.inner.store.list_items().await?.len()).unwrap_or(u64::MAX);
        if pool_size < total_picks {
            return Err(invalid(&format!(
                "pool holds {pool_size} items but the draft needs {total_picks} picks"
            )));
        }

        if randomize_order {
            participants.shuffle(&mut rand::rng());
        }

        let now = self.inner.clock.now();
        let draft = Draft {
            id: DraftId::new(),
            order: participants.iter().map(|seat| seat.id).collect(),
            total_rounds,
            pick_seconds,
            current_round: 1,
            current_pick: 1,
            status: DraftStatus::NotStarted,
            created_at: now,
            updated_at: now,
        };
        self.inner.store.create_draft(&draft, &participants).await?;
        tracing::info!(
            draft_id = %draft.id,
            participants = seats,
            rounds = total_rounds,
            pick_seconds,
            "draft created"
        );
        Ok(draft)
    }

    /// Move a draft to `starting` and run the preparation countdown.
    pub async fn start_draft(&self, draft_id: DraftId) -> Result<Draft, DraftError> {
        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;

        let mut draft = self.load_draft(draft_id).await?;
        if !draft.status.can_transition_to(DraftStatus::Starting) {
            return Err(DraftError::invalid_state(draft_id, draft.status, "start"));
        }
        let now = self.inner.clock.now();
        self.inner
            .store
            .set_status(draft_id, DraftStatus::Starting, now)
            .await?;
        draft.status = DraftStatus::Starting;
        draft.updated_at = now;
        self.invalidate(draft_id).await;

        let seconds = self.inner.config.draft.preparation_seconds;
        tracing::info!(%draft_id, seconds, "draft starting");
        self.inner
            .fanout
            .publish(draft_id, &DraftEvent::DraftStarting { draft_id, seconds });
        let record = TimerRecord::preparation(draft_id, seconds, now);
        self.arm_clock(&draft, record, ArmMode::Fresh).await;
        Ok(draft)
    }

    /// Record a manual pick for the participant currently on the clock.
    pub async fn submit_pick(
        &self,
        draft_id: DraftId,
        participant_id: ParticipantId,
        item_id: ItemId,
    ) -> Result<Pick, DraftError> {
        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;

        let mut draft = self.load_draft(draft_id).await?;
        let pool = self.inner.store.list_items().await?;
        let picks = self.inner.store.list_picks(draft_id).await?;
        let context = PickContext {
            pool: &pool,
            picks: &picks,
        };
        self.commit_pick(&mut draft, participant_id, item_id, false, &context)
            .await
    }

    /// Cancel a draft. Terminal.
    pub async fn cancel_draft(&self, draft_id: DraftId) -> Result<Draft, DraftError> {
        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;

        let mut draft = self.load_draft(draft_id).await?;
        if !draft.status.can_transition_to(DraftStatus::Canceled) {
            return Err(DraftError::invalid_state(draft_id, draft.status, "cancel"));
        }
        self.stop_clock(draft_id).await;
        let now = self.inner.clock.now();
        self.inner
            .store
            .set_status(draft_id, DraftStatus::Canceled, now)
            .await?;
        draft.status = DraftStatus::Canceled;
        draft.updated_at = now;
        self.invalidate(draft_id).await;

        tracing::info!(%draft_id, "draft canceled");
        self.inner
            .fanout
            .publish(draft_id, &DraftEvent::DraftCanceled { draft_id });
        Ok(draft)
    }

    /// Stop every timer, delete every pick and return the draft to
    /// `not_started` so it can be started again.
    pub async fn reset_draft(&self, draft_id: DraftId) -> Result<Draft, DraftError> {
        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;

        let mut draft = self.load_draft(draft_id).await?;
        self.stop_clock(draft_id).await;
        let removed = self.inner.store.clear_picks(draft_id).await?;
        let now = self.inner.clock.now();
        self.inner
            .store
            .update_turn_pointer(draft_id, 1, 1, now)
            .await?;
        self.inner
            .store
            .set_status(draft_id, DraftStatus::NotStarted, now)
            .await?;
        draft.current_round = 1;
        draft.current_pick = 1;
        draft.status = DraftStatus::NotStarted;
        draft.updated_at = now;
        self.invalidate(draft_id).await;

        tracing::info!(%draft_id, removed_picks = removed, "draft reset");
        self.inner
            .fanout
            .publish(draft_id, &DraftEvent::DraftReset { draft_id });
        Ok(draft)
    }

    /// Expire the running countdown now.
    ///
    /// During preparation this ends the countdown early and returns
    /// `None`; during a turn it autopicks for the owed participant with no
    /// pacing delay.
    pub async fn force_expire(&self, draft_id: DraftId) -> Result<Option<Pick>, DraftError> {
        if !self.inner.config.operator.allow_force_expire {
            return Err(invalid("force-expire is disabled"));
        }
        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;

        let draft = self.load_draft(draft_id).await?;
        let record = match draft.status {
            DraftStatus::Starting => self.inner.timers.record(draft_id).unwrap_or_else(|| {
                TimerRecord::preparation(draft_id, 0, self.inner.clock.now())
            }),
            DraftStatus::Active => {
                let Some(slot) = turn::current_slot(&draft) else {
                    return Err(DraftError::invalid_state(draft_id, draft.status, "force-expire"));
                };
                self.inner
                    .timers
                    .record(draft_id)
                    .filter(|record| record.pick_number == Some(slot.pick_number))
                    .unwrap_or_else(|| {
                        TimerRecord::turn(draft_id, &slot, draft.pick_seconds, self.inner.clock.now())
                    })
            }
            status => return Err(DraftError::invalid_state(draft_id, status, "force-expire")),
        };

        tracing::info!(%draft_id, kind = record.kind.as_str(), "forcing timer expiry");
        let lease = self.inner.timers.reserve(draft_id, Some(record.clone()));
        match record.kind {
            TimerKind::Preparation => {
                self.finish_preparation_locked(lease).await?;
                Ok(None)
            }
            TimerKind::Turn => self.expire_turn_locked(lease, ExpiryCause::Forced).await,
        }
    }

    /// Stop this process's background work for every draft.
    pub fn shutdown(&self) -> usize {
        let stopped = self.inner.timers.release_all();
        tracing::info!(stopped, "draft timers stopped");
        stopped
    }

    // =========================================================================
    // State queries
    // =========================================================================

    /// Full current state of a draft.
    ///
    /// Served from the cache when possible; the remaining seconds are
    /// always recomputed from the timer's start timestamp.
    pub async fn current_state(&self, draft_id: DraftId) -> Result<DraftSnapshot, DraftError> {
        let now = self.inner.clock.now();
        match self.inner.cache.snapshot(draft_id).await {
            Ok(Some(mut snapshot)) => {
                snapshot.seconds_remaining =
                    snapshot.timer.as_ref().map(|timer| timer.remaining_seconds(now));
                return Ok(snapshot);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(%draft_id, error = %e, "cache snapshot read failed"),
        }

        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;
        let snapshot = self.build_snapshot(draft_id).await?;
        if let Err(e) = self.inner.cache.put_snapshot(&snapshot).await {
            tracing::debug!(%draft_id, error = %e, "cache snapshot write failed");
        }
        Ok(snapshot)
    }

    async fn build_snapshot(&self, draft_id: DraftId) -> Result<DraftSnapshot, DraftError> {
        let draft = self.load_draft(draft_id).await?;
        let participants = self.inner.store.participants(draft_id).await?;
        let picks = self.inner.store.list_picks(draft_id).await?;
        let available = self.inner.store.list_available_items(draft_id).await?;
        let cached_timer = match self.inner.cache.timer(draft_id).await {
            Ok(timer) => timer,
            Err(e) => {
                tracing::debug!(%draft_id, error = %e, "cache timer read failed");
                None
            }
        };
        let timer = match self.inner.timers.record(draft_id).or(cached_timer) {
            Some(record) => Some(record),
            None => self.inner.store.get_timer(draft_id).await?,
        };
        let now = self.inner.clock.now();
        Ok(DraftSnapshot {
            on_the_clock: turn::current_slot(&draft),
            seconds_remaining: timer.as_ref().map(|t| t.remaining_seconds(now)),
            draft,
            participants,
            picks,
            available,
            timer,
        })
    }

    // =========================================================================
    // Shared internals
    // =========================================================================

    /// Load a draft and repair its turn pointer against the recorded picks.
    pub(crate) async fn load_draft(&self, draft_id: DraftId) -> Result<Draft, DraftError> {
        let mut draft = self
            .inner
            .store
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| DraftError::draft_not_found(draft_id))?;

        if matches!(draft.status, DraftStatus::Active | DraftStatus::Stalled) {
            let recorded = self.inner.store.list_picks(draft_id).await?.len();
            let recorded = u32::try_from(recorded).unwrap_or(u32::MAX);
            if turn::reconcile(&mut draft, recorded) {
                tracing::warn!(
                    %draft_id,
                    pick = draft.current_pick,
                    round = draft.current_round,
                    "turn pointer behind recorded picks, repairing"
                );
                if let Err(e) = self
                    .inner
                    .store
                    .update_turn_pointer(draft_id, draft.current_round, draft.current_pick, self.inner.clock.now())
                    .await
                {
                    tracing::warn!(%draft_id, error = %e, "failed to persist repaired turn pointer");
                }
            }
        }
        Ok(draft)
    }

    /// Seat profile of one participant.
    pub(crate) async fn participant(
        &self,
        draft_id: DraftId,
        participant_id: ParticipantId,
    ) -> Result<Participant, DraftError> {
        self.inner
            .store
            .participants(draft_id)
            .await?
            .into_iter()
            .find(|seat| seat.id == participant_id)
            .ok_or_else(|| DraftError::NotFound {
                entity: "participant",
                id: participant_id.to_string(),
            })
    }

    /// Validate, record and broadcast one pick, then move the turn on.
    ///
    /// Manual and fallback picks both come through here. Must be called
    /// holding the draft lock with `draft` freshly loaded. The turn pointer
    /// only moves once the pick is durable.
    pub(crate) async fn commit_pick(
        &self,
        draft: &mut Draft,
        participant_id: ParticipantId,
        item_id: ItemId,
        is_auto_pick: bool,
        context: &PickContext<'_>,
    ) -> Result<Pick, DraftError> {
        let draft_id = draft.id;
        let slot = turn::validate_pick(draft, participant_id, item_id, context, &self.inner.rule)?;

        let now = self.inner.clock.now();
        let pick = Pick {
            id: PickId::new(),
            draft_id,
            participant_id,
            item_id,
            round: slot.round,
            pick_number: slot.pick_number,
            is_auto_pick,
            picked_at: now,
        };
        self.inner
            .store
            .record_pick(&pick)
            .await
            .map_err(|e| match e {
                StoreError::PickConflict { pick_number, .. } => DraftError::WrongTurn {
                    participant_id,
                    pick_number,
                },
                StoreError::ItemTaken { item_id, .. } => DraftError::ItemUnavailable { item_id },
                other => DraftError::from(other),
            })?;

        // The pick is durable; the owed turn is over.
        self.stop_clock(draft_id).await;

        let outcome = turn::advance(draft, now);
        if let Err(e) = self
            .inner
            .store
            .update_turn_pointer(draft_id, draft.current_round, draft.current_pick, now)
            .await
        {
            tracing::warn!(%draft_id, error = %e, "failed to persist turn pointer, will reconcile on next load");
        }
        self.invalidate(draft_id).await;

        tracing::info!(
            %draft_id,
            %participant_id,
            pick_number = pick.pick_number,
            %item_id,
            auto = is_auto_pick,
            "pick recorded"
        );
        let event = if is_auto_pick {
            DraftEvent::AutoPickMade {
                draft_id,
                pick: pick.clone(),
            }
        } else {
            DraftEvent::PickMade {
                draft_id,
                pick: pick.clone(),
            }
        };
        self.inner.fanout.publish(draft_id, &event);

        match outcome {
            Advance::Next(next) => self.schedule_turn(draft_id, next),
            Advance::Completed => self.complete(draft).await,
        }
        Ok(pick)
    }

    async fn complete(&self, draft: &Draft) {
        let draft_id = draft.id;
        if let Err(e) = self
            .inner
            .store
            .set_status(draft_id, DraftStatus::Completed, draft.updated_at)
            .await
        {
            tracing::error!(%draft_id, error = %e, "failed to persist completed status");
        }
        self.invalidate(draft_id).await;
        let total_picks = draft.total_picks();
        tracing::info!(%draft_id, total_picks, "draft completed");
        self.inner
            .fanout
            .publish(draft_id, &DraftEvent::DraftCompleted { draft_id, total_picks });

        match self.inner.store.list_picks(draft_id).await {
            Ok(picks) => self.inner.pool_initializer.draft_completed(draft, &picks).await,
            Err(e) => tracing::error!(%draft_id, error = %e, "could not load picks for pool initialization"),
        }
    }

    /// Mark an active draft whose picks are all recorded as completed.
    pub(crate) async fn complete_if_finished(&self, draft: &mut Draft) -> bool {
        if draft.status != DraftStatus::Active || !draft.all_picks_made() {
            return false;
        }
        draft.status = DraftStatus::Completed;
        draft.updated_at = self.inner.clock.now();
        self.complete(draft).await;
        true
    }

    /// Stop the countdown and discard its durable record.
    pub(crate) async fn stop_clock(&self, draft_id: DraftId) {
        self.inner.timers.release(draft_id);
        if let Err(e) = self.inner.store.delete_timer(draft_id).await {
            tracing::warn!(%draft_id, error = %e, "failed to delete timer record");
        }
    }

    /// Drop cached state for a draft after it changed.
    pub(crate) async fn invalidate(&self, draft_id: DraftId) {
        if let Err(e) = self.inner.cache.evict(draft_id).await {
            tracing::debug!(%draft_id, error = %e, "cache eviction failed");
        }
    }
}

fn invalid(reason: &str) -> DraftError {
    DraftError::InvalidRequest {
        reason: reason.to_owned(),
    }
}
