//! Timer supervisor.
//!
//! Each draft has at most one entry in the [`TimerRegistry`]. An entry owns
//! the background tasks driving the draft's countdown: the 1 Hz tick loop,
//! the scripted-seat companion, or the post-pick transition delay. Every
//! entry carries a generation number handed to its tasks as a [`Lease`].
//!
//! Expiry is exactly-once: a task must [`claim`](TimerRegistry::claim) its
//! lease while holding the draft lock before it may act, and claiming
//! removes the entry and aborts every sibling task. A second contender (a
//! manual pick, a scripted companion, a force-expire, or recovery) finds
//! the lease gone and backs off.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use draftday_types::{
    Draft, DraftEvent, DraftId, DraftStatus, Participant, Pick, TimerKind, TimerRecord, TurnSlot,
};
use tokio::task::JoinHandle;

use crate::error::DraftError;
use crate::manager::DraftManager;
use crate::turn::{self, PickContext};

/// Proof that a task belongs to the current countdown of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lease {
    pub(crate) draft_id: DraftId,
    generation: u64,
}

#[derive(Debug)]
struct TimerEntry {
    generation: u64,
    record: Option<TimerRecord>,
    tasks: Vec<JoinHandle<()>>,
}

/// In-process map of running countdowns.
#[derive(Debug, Default)]
pub(crate) struct TimerRegistry {
    entries: Mutex<HashMap<DraftId, TimerEntry>>,
    generation: AtomicU64,
}

/// Abort `tasks`, sparing the task calling this function.
fn abort_others(tasks: Vec<JoinHandle<()>>) {
    let current = tokio::task::try_id();
    for task in tasks {
        if Some(task.id()) != current {
            task.abort();
        }
    }
}

impl TimerRegistry {
    /// Replace any countdown for the draft with a fresh entry.
    ///
    /// `record` is `None` while a transition delay is pending.
    pub(crate) fn reserve(&self, draft_id: DraftId, record: Option<TimerRecord>) -> Lease {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                draft_id,
                TimerEntry {
                    generation,
                    record,
                    tasks: Vec::new(),
                },
            );
        if let Some(previous) = previous {
            abort_others(previous.tasks);
        }
        Lease {
            draft_id,
            generation,
        }
    }

    /// Track a task spawned for `lease`.
    ///
    /// A task attached to a superseded lease is left to notice on its own;
    /// every loop checks [`is_current`](Self::is_current) before acting.
    pub(crate) fn attach(&self, lease: Lease, task: JoinHandle<()>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries
            .get_mut(&lease.draft_id)
            .filter(|entry| entry.generation == lease.generation)
        {
            entry.tasks.push(task);
        }
    }

    /// Whether `lease` is still the draft's current countdown.
    pub(crate) fn is_current(&self, lease: Lease) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&lease.draft_id)
            .is_some_and(|entry| entry.generation == lease.generation)
    }

    /// Take ownership of the countdown if `lease` is still current.
    ///
    /// Returns the countdown record, or `None` if another party already
    /// claimed or replaced it. Sibling tasks are aborted.
    pub(crate) fn claim(&self, lease: Lease) -> Option<TimerRecord> {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let current = entries
                .get(&lease.draft_id)
                .is_some_and(|entry| entry.generation == lease.generation);
            if !current {
                return None;
            }
            entries.remove(&lease.draft_id)?
        };
        abort_others(entry.tasks);
        entry.record
    }

    /// Stop whatever countdown the draft has. Returns whether one existed.
    pub(crate) fn release(&self, draft_id: DraftId) -> bool {
        let entry = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&draft_id);
        entry.is_some_and(|entry| {
            abort_others(entry.tasks);
            true
        })
    }

    /// Stop every countdown.
    pub(crate) fn release_all(&self) -> usize {
        let drained: Vec<TimerEntry> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        let count = drained.len();
        for entry in drained {
            abort_others(entry.tasks);
        }
        count
    }

    /// Whether the draft has a countdown or pending transition.
    pub(crate) fn contains(&self, draft_id: DraftId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&draft_id)
    }

    /// The running countdown of a draft, if it has one.
    pub(crate) fn record(&self, draft_id: DraftId) -> Option<TimerRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&draft_id)
            .and_then(|entry| entry.record.clone())
    }

    /// Number of drafts with a countdown or pending transition.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// How a countdown is being armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArmMode {
    /// A new countdown: persist it and announce it.
    Fresh,
    /// A countdown recovered from the store after a restart.
    Resume,
}

/// What ended a turn without a manual pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiryCause {
    /// The countdown reached zero.
    Timeout,
    /// A scripted seat's pacing delay elapsed.
    Scripted,
    /// An operator forced the expiry.
    Forced,
    /// Recovery found the countdown already overdue.
    Recovery,
}

impl ExpiryCause {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Scripted => "scripted",
            Self::Forced => "forced",
            Self::Recovery => "recovery",
        }
    }
}

impl DraftManager {
    /// Start (or resume) a countdown and its background tasks.
    ///
    /// Must be called holding the draft lock.
    ///
    /// Boxed so the clock tasks that re-enter it stay `Send`.
    pub(crate) fn arm_clock<'a>(
        &'a self,
        draft: &'a Draft,
        record: TimerRecord,
        mode: ArmMode,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let draft_id = draft.id;
            let lease = self.timers().reserve(draft_id, Some(record.clone()));

            if mode == ArmMode::Fresh {
                if let Err(e) = self.store().start_timer(&record).await {
                    tracing::warn!(%draft_id, error = %e, "failed to persist timer, continuing in memory");
                }
            }
            self.invalidate(draft_id).await;
            if let Err(e) = self.cache().set_timer(&record).await {
                tracing::debug!(%draft_id, error = %e, "cache timer write failed");
            }

            let scripted_seat = match (record.kind, record.participant_id) {
                (TimerKind::Turn, Some(participant_id)) => {
                    self.scripted_participant(draft_id, participant_id).await
                }
                _ => None,
            };

            match record.kind {
                TimerKind::Preparation => {
                    tracing::info!(%draft_id, seconds = record.duration_seconds, "preparation countdown running");
                }
                TimerKind::Turn => {
                    if let Some(slot) = record.pick_number.and_then(|n| turn::slot_for_pick(draft, n)) {
                        tracing::info!(
                            %draft_id,
                            participant_id = %slot.participant_id,
                            pick_number = slot.pick_number,
                            seconds = record.duration_seconds,
                            "turn clock running"
                        );
                        self.fanout().publish(
                            draft_id,
                            &DraftEvent::TurnStarted {
                                draft_id,
                                slot,
                                duration_seconds: record.duration_seconds,
                                started_at: record.started_at,
                            },
                        );
                    }
                }
            }

            let ticker = {
                let manager = self.clone();
                let record = record.clone();
                tokio::spawn(async move { manager.run_clock(lease, record).await })
            };
            self.timers().attach(lease, ticker);

            if let Some(seat) = scripted_seat {
                let elapsed = self
                    .clock()
                    .now()
                    .signed_duration_since(record.started_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                let delay = self.autopicker().delay_for(&seat).saturating_sub(elapsed);
                let manager = self.clone();
                let companion = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = manager.expire_turn(lease, ExpiryCause::Scripted).await {
                        tracing::error!(draft_id = %lease.draft_id, error = %e, "scripted pick failed");
                    }
                });
                self.timers().attach(lease, companion);
            }
        })
    }

    /// Tick loop for one countdown.
    ///
    /// Remaining time is recomputed from the record's start timestamp on
    /// every iteration; the sleep only decides when to look again.
    async fn run_clock(self, lease: Lease, record: TimerRecord) {
        let draft_id = lease.draft_id;
        let interval = self.config().draft.tick_interval();
        let persist_every = self.config().draft.persist_every_ticks;
        let mut ticks: u32 = 0;

        loop {
            if !self.timers().is_current(lease) {
                return;
            }
            let now = self.clock().now();
            let remaining_ms = record.remaining_millis(now);
            let remaining_seconds = record.remaining_seconds(now);

            let event = match record.kind {
                TimerKind::Preparation => DraftEvent::Countdown {
                    draft_id,
                    remaining_seconds,
                },
                TimerKind::Turn => DraftEvent::TimerTick {
                    draft_id,
                    participant_id: record.participant_id.unwrap_or_default(),
                    pick_number: record.pick_number.unwrap_or_default(),
                    remaining_seconds,
                },
            };
            self.fanout().publish(draft_id, &event);
            tracing::debug!(%draft_id, remaining = remaining_seconds, "tick");

            if remaining_ms <= 0 {
                let outcome = match record.kind {
                    TimerKind::Preparation => self.finish_preparation(lease).await,
                    TimerKind::Turn => self.expire_turn(lease, ExpiryCause::Timeout).await.map(|_| ()),
                };
                if let Err(e) = outcome {
                    tracing::error!(%draft_id, error = %e, "countdown expiry failed");
                }
                return;
            }

            ticks = ticks.saturating_add(1);
            if persist_every > 0 && ticks.checked_rem(persist_every) == Some(0) {
                if let Err(e) = self.store().record_timer_tick(&record, remaining_seconds).await {
                    tracing::warn!(%draft_id, error = %e, "timer mirror write failed, retrying next tick");
                }
            }

            let until_deadline = Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0));
            tokio::time::sleep(interval.min(until_deadline)).await;
        }
    }

    /// Expire the turn guarded by `lease`.
    pub(crate) async fn expire_turn(
        &self,
        lease: Lease,
        cause: ExpiryCause,
    ) -> Result<Option<Pick>, DraftError> {
        let lock = self.draft_lock(lease.draft_id);
        let _guard = lock.lock().await;
        self.expire_turn_locked(lease, cause).await
    }

    /// Expiry handling proper. Must be called holding the draft lock.
    ///
    /// Returns `Ok(None)` when the lease was already claimed or the turn
    /// moved on.
    pub(crate) async fn expire_turn_locked(
        &self,
        lease: Lease,
        cause: ExpiryCause,
    ) -> Result<Option<Pick>, DraftError> {
        let draft_id = lease.draft_id;
        let Some(record) = self.timers().claim(lease) else {
            tracing::debug!(%draft_id, cause = cause.as_str(), "countdown already handled");
            return Ok(None);
        };

        // The record goes first so a concurrent recovery pass sees no timer.
        if let Err(e) = self.store().delete_timer(draft_id).await {
            tracing::warn!(%draft_id, error = %e, "failed to delete expired timer");
        }
        self.invalidate(draft_id).await;

        match self.autopick_expired(&record, cause).await {
            Ok(pick) => Ok(pick),
            Err(e @ (DraftError::PoolExhausted { .. } | DraftError::NotFound { .. })) => Err(e),
            Err(e) => {
                tracing::error!(%draft_id, error = %e, "autopick failed, retrying");
                self.retry_later(draft_id, record);
                Err(e)
            }
        }
    }

    /// Pick for the seat `record` was counting down for, if it still owns
    /// the open turn.
    async fn autopick_expired(
        &self,
        record: &TimerRecord,
        cause: ExpiryCause,
    ) -> Result<Option<Pick>, DraftError> {
        let draft_id = record.draft_id;
        let mut draft = self.load_draft(draft_id).await?;
        let Some(slot) = turn::current_slot(&draft) else {
            tracing::warn!(%draft_id, status = %draft.status, "expired timer for a draft with no open turn");
            return Ok(None);
        };
        if record.participant_id != Some(slot.participant_id)
            || record.pick_number != Some(slot.pick_number)
        {
            tracing::warn!(
                %draft_id,
                pick_number = slot.pick_number,
                "expired timer does not match the current turn, skipping"
            );
            return Ok(None);
        }

        let participant = self.participant(draft_id, slot.participant_id).await?;
        let pool = self.store().list_items().await?;
        let picks = self.store().list_picks(draft_id).await?;
        let context = PickContext {
            pool: &pool,
            picks: &picks,
        };
        let eligibility = context.eligibility(self.rule(), slot.participant_id);
        let Some(item_id) = self
            .autopicker()
            .choose(&participant, &eligibility)
            .map(|item| item.id)
        else {
            self.stall(&mut draft, &slot).await;
            return Err(DraftError::PoolExhausted { draft_id });
        };

        tracing::info!(
            %draft_id,
            participant_id = %slot.participant_id,
            pick_number = slot.pick_number,
            %item_id,
            cause = cause.as_str(),
            overridden = eligibility.is_overridden(),
            "autopicking"
        );

        self.commit_pick(&mut draft, slot.participant_id, item_id, true, &context)
            .await
            .map(Some)
    }

    /// Re-arm an expired countdown so its expiry is attempted again after
    /// one tick interval.
    fn retry_later(&self, draft_id: DraftId, record: TimerRecord) {
        let kind = record.kind;
        let lease = self.timers().reserve(draft_id, Some(record));
        let manager = self.clone();
        let delay = self.config().draft.tick_interval();
        let retry = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = match kind {
                TimerKind::Preparation => manager.finish_preparation(lease).await,
                TimerKind::Turn => manager
                    .expire_turn(lease, ExpiryCause::Timeout)
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = outcome {
                tracing::error!(%draft_id, error = %e, "countdown expiry retry failed");
            }
        });
        self.timers().attach(lease, retry);
    }

    /// Freeze a draft whose owed participant has nothing left to pick.
    async fn stall(&self, draft: &mut Draft, slot: &TurnSlot) {
        let draft_id = draft.id;
        let reason = format!(
            "no item left for participant {} at pick {}",
            slot.participant_id, slot.pick_number
        );
        tracing::error!(%draft_id, pick_number = slot.pick_number, "item pool exhausted, stalling draft");

        self.timers().release(draft_id);
        let now = self.clock().now();
        draft.status = DraftStatus::Stalled;
        draft.updated_at = now;
        if let Err(e) = self.store().set_status(draft_id, DraftStatus::Stalled, now).await {
            tracing::error!(%draft_id, error = %e, "failed to persist stalled status");
        }
        self.invalidate(draft_id).await;
        self.fanout()
            .publish(draft_id, &DraftEvent::DraftStalled { draft_id, reason });
    }

    /// Finish the preparation countdown guarded by `lease`.
    pub(crate) async fn finish_preparation(&self, lease: Lease) -> Result<(), DraftError> {
        let lock = self.draft_lock(lease.draft_id);
        let _guard = lock.lock().await;
        self.finish_preparation_locked(lease).await
    }

    /// Move a starting draft to active and start the first turn clock.
    /// Must be called holding the draft lock.
    pub(crate) async fn finish_preparation_locked(&self, lease: Lease) -> Result<(), DraftError> {
        let draft_id = lease.draft_id;
        let Some(record) = self.timers().claim(lease) else {
            return Ok(());
        };
        if let Err(e) = self.store().delete_timer(draft_id).await {
            tracing::warn!(%draft_id, error = %e, "failed to delete preparation timer");
        }

        let mut draft = self.load_draft(draft_id).await?;
        if draft.status != DraftStatus::Starting {
            tracing::warn!(%draft_id, status = %draft.status, "preparation ended for a draft that is not starting");
            return Ok(());
        }
        let now = self.clock().now();
        if let Err(e) = self.store().set_status(draft_id, DraftStatus::Active, now).await {
            tracing::error!(%draft_id, error = %e, "could not activate draft, retrying");
            self.retry_later(draft_id, record);
            return Err(e.into());
        }
        draft.status = DraftStatus::Active;
        draft.updated_at = now;
        self.invalidate(draft_id).await;

        tracing::info!(%draft_id, "draft is active");
        self.fanout()
            .publish(draft_id, &DraftEvent::DraftStarted { draft_id });

        if let Some(slot) = turn::current_slot(&draft) {
            let record = TimerRecord::turn(draft_id, &slot, draft.pick_seconds, now);
            self.arm_clock(&draft, record, ArmMode::Fresh).await;
        }
        Ok(())
    }

    /// Wait out the transition delay, then start the clock for `slot`.
    /// Must be called holding the draft lock.
    pub(crate) fn schedule_turn(&self, draft_id: DraftId, slot: TurnSlot) {
        let lease = self.timers().reserve(draft_id, None);
        let delay = self.config().draft.transition_delay();
        let manager = self.clone();
        let transition = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = manager.begin_scheduled_turn(lease, slot).await {
                tracing::error!(%draft_id, error = %e, "failed to start next turn");
            }
        });
        self.timers().attach(lease, transition);
    }

    async fn begin_scheduled_turn(&self, lease: Lease, slot: TurnSlot) -> Result<(), DraftError> {
        let draft_id = lease.draft_id;
        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;
        if !self.timers().is_current(lease) {
            return Ok(());
        }

        let draft = self.load_draft(draft_id).await?;
        if turn::current_slot(&draft) != Some(slot) {
            tracing::warn!(
                %draft_id,
                pick_number = slot.pick_number,
                "turn changed during transition, not starting a timer"
            );
            self.timers().claim(lease);
            return Ok(());
        }
        let record = TimerRecord::turn(draft_id, &slot, draft.pick_seconds, self.clock().now());
        self.arm_clock(&draft, record, ArmMode::Fresh).await;
        Ok(())
    }

    async fn scripted_participant(
        &self,
        draft_id: DraftId,
        participant_id: draftday_types::ParticipantId,
    ) -> Option<Participant> {
        match self.participant(draft_id, participant_id).await {
            Ok(seat) if seat.is_scripted() => Some(seat),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(%draft_id, %participant_id, error = %e, "could not load participant profile");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn prep(draft_id: DraftId) -> TimerRecord {
        TimerRecord::preparation(draft_id, 10, Utc::now())
    }

    #[tokio::test]
    async fn claim_succeeds_once() {
        let registry = TimerRegistry::default();
        let draft_id = DraftId::new();
        let lease = registry.reserve(draft_id, Some(prep(draft_id)));
        assert!(registry.is_current(lease));
        assert!(registry.claim(lease).is_some());
        assert!(registry.claim(lease).is_none());
        assert!(!registry.contains(draft_id));
    }

    #[tokio::test]
    async fn reserving_again_supersedes_the_old_lease() {
        let registry = TimerRegistry::default();
        let draft_id = DraftId::new();
        let old = registry.reserve(draft_id, Some(prep(draft_id)));
        let new = registry.reserve(draft_id, None);
        assert!(!registry.is_current(old));
        assert!(registry.claim(old).is_none());
        assert!(registry.is_current(new));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn release_aborts_attached_tasks() {
        let registry = TimerRegistry::default();
        let draft_id = DraftId::new();
        let lease = registry.reserve(draft_id, Some(prep(draft_id)));
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let abort = task.abort_handle();
        registry.attach(lease, task);

        assert!(registry.release(draft_id));
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
        assert!(!registry.release(draft_id));
    }

    #[tokio::test]
    async fn release_all_empties_the_registry() {
        let registry = TimerRegistry::default();
        registry.reserve(DraftId::new(), None);
        registry.reserve(DraftId::new(), None);
        assert_eq!(registry.release_all(), 2);
        assert_eq!(registry.len(), 0);
    }
}
