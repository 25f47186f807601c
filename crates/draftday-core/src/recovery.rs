//! Startup recovery.
//!
//! Runs once before the process accepts picks. Every draft persisted as
//! `starting` or `active` gets its countdown rebuilt from the durable timer
//! record: resumed with its true remaining time, restarted if the record is
//! missing, or expired on the spot if it ran out while the process was
//! down. Drafts this process is already running are left alone, so a
//! second pass changes nothing.

use std::collections::HashMap;

use draftday_types::{Draft, DraftId, DraftStatus, TimerKind, TimerRecord};

use crate::error::DraftError;
use crate::manager::DraftManager;
use crate::timer::{ArmMode, ExpiryCause};
use crate::turn;

/// What a recovery pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Drafts already running in this process and skipped.
    pub already_running: usize,
    /// Countdowns resumed with their remaining time.
    pub resumed: usize,
    /// Countdowns started fresh because no usable record existed.
    pub restarted: usize,
    /// Overdue countdowns expired immediately.
    pub expired: usize,
    /// Active drafts found with every pick already recorded.
    pub completed: usize,
    /// Timer records discarded as stale.
    pub discarded_timers: usize,
}

/// What to do with one draft's countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Restart(TimerRecord),
    Resume(TimerRecord),
    Expire(TimerRecord),
}

impl DraftManager {
    /// Rebuild every in-flight countdown from durable state.
    pub async fn recover(&self) -> Result<RecoveryReport, DraftError> {
        let mut report = RecoveryReport::default();
        let mut timers: HashMap<DraftId, TimerRecord> = self
            .store()
            .list_active_timers()
            .await?
            .into_iter()
            .map(|timer| (timer.draft_id, timer))
            .collect();
        let drafts = self
            .store()
            .list_drafts_by_status(&[DraftStatus::Starting, DraftStatus::Active])
            .await?;
        tracing::info!(drafts = drafts.len(), timers = timers.len(), "recovery started");

        for draft in drafts {
            let timer = timers.remove(&draft.id);
            if let Err(e) = self.recover_draft(draft.id, timer, &mut report).await {
                tracing::error!(draft_id = %draft.id, error = %e, "failed to recover draft");
            }
        }

        // Whatever is left belongs to drafts that are no longer in flight.
        for draft_id in timers.into_keys() {
            if self.has_running_timer(draft_id) {
                continue;
            }
            match self.store().delete_timer(draft_id).await {
                Ok(_) => report.discarded_timers = report.discarded_timers.saturating_add(1),
                Err(e) => tracing::warn!(%draft_id, error = %e, "failed to discard orphan timer"),
            }
        }

        tracing::info!(?report, "recovery finished");
        Ok(report)
    }

    async fn recover_draft(
        &self,
        draft_id: DraftId,
        timer: Option<TimerRecord>,
        report: &mut RecoveryReport,
    ) -> Result<(), DraftError> {
        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;

        if self.has_running_timer(draft_id) {
            report.already_running = report.already_running.saturating_add(1);
            return Ok(());
        }

        let mut draft = self.load_draft(draft_id).await?;
        if self.complete_if_finished(&mut draft).await {
            if timer.is_some() {
                self.stop_clock(draft_id).await;
            }
            report.completed = report.completed.saturating_add(1);
            return Ok(());
        }

        let now = self.clock().now();
        let Some(plan) = self.plan(&draft, timer, report) else {
            return Ok(());
        };

        match plan {
            Plan::Restart(record) => {
                tracing::info!(%draft_id, kind = record.kind.as_str(), "no usable timer, starting fresh");
                self.arm_clock(&draft, record, ArmMode::Fresh).await;
                report.restarted = report.restarted.saturating_add(1);
            }
            Plan::Resume(record) => {
                tracing::info!(
                    %draft_id,
                    kind = record.kind.as_str(),
                    remaining = record.remaining_seconds(now),
                    "resuming timer"
                );
                self.arm_clock(&draft, record, ArmMode::Resume).await;
                report.resumed = report.resumed.saturating_add(1);
            }
            Plan::Expire(record) => {
                tracing::info!(
                    %draft_id,
                    kind = record.kind.as_str(),
                    overdue_ms = record.remaining_millis(now).saturating_neg(),
                    "timer expired while down, expiring now"
                );
                let kind = record.kind;
                let lease = self.timers().reserve(draft_id, Some(record));
                match kind {
                    TimerKind::Preparation => self.finish_preparation_locked(lease).await?,
                    TimerKind::Turn => {
                        self.expire_turn_locked(lease, ExpiryCause::Recovery).await?;
                    }
                }
                report.expired = report.expired.saturating_add(1);
            }
        }
        Ok(())
    }

    /// Decide between resuming, restarting and expiring.
    ///
    /// A record that does not describe the draft's current countdown (wrong
    /// kind, or a turn other than the one owed) is discarded.
    fn plan(
        &self,
        draft: &Draft,
        timer: Option<TimerRecord>,
        report: &mut RecoveryReport,
    ) -> Option<Plan> {
        let now = self.clock().now();
        let fresh = match draft.status {
            DraftStatus::Starting => {
                TimerRecord::preparation(draft.id, self.config().draft.preparation_seconds, now)
            }
            DraftStatus::Active => {
                let slot = turn::current_slot(draft)?;
                TimerRecord::turn(draft.id, &slot, draft.pick_seconds, now)
            }
            _ => return None,
        };

        let usable = timer.filter(|record| {
            let matches = record.kind == fresh.kind
                && record.participant_id == fresh.participant_id
                && record.pick_number == fresh.pick_number;
            if !matches {
                tracing::warn!(
                    draft_id = %draft.id,
                    stale_pick = ?record.pick_number,
                    "discarding timer that does not match the current turn"
                );
                report.discarded_timers = report.discarded_timers.saturating_add(1);
            }
            matches
        });

        Some(match usable {
            None => Plan::Restart(fresh),
            Some(record) if record.is_expired(now) => Plan::Expire(record),
            Some(record) => Plan::Resume(record),
        })
    }
}
