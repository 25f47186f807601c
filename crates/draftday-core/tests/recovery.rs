//! Restart scenarios: a second manager over the same store picks up where
//! the first left off.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

mod common;

use std::sync::Arc;

use chrono::TimeDelta;
use common::{activate, create, draft, harness, harness_on, humans, run_for, test_config};
use draftday_core::RecoveryReport;
use draftday_core::store::DraftStore;
use draftday_core::turn;
use draftday_types::{DraftStatus, TimerKind, TimerRecord};

#[tokio::test(start_paused = true)]
async fn overdue_turn_is_expired_once_on_restart() {
    let first = harness().await;
    let created = create(&first.manager, humans(3), 2, 60).await;
    activate(&first.manager, created.id).await;
    first.manager.shutdown();

    // The process died 70 seconds into a 60 second turn.
    let current = draft(&first.manager, created.id).await;
    let slot = turn::current_slot(&current).unwrap();
    let now = first.manager.clock().now();
    let overdue = TimerRecord::turn(created.id, &slot, 60, now - TimeDelta::seconds(70));
    first.store.start_timer(&overdue).await.unwrap();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.resumed, 0);

    let picks = second.store.list_picks(created.id).await.unwrap();
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].pick_number, 1);
    assert_eq!(picks[0].participant_id, created.order[0]);
    assert!(picks[0].is_auto_pick);
    assert_eq!(draft(&second.manager, created.id).await.current_pick, 2);

    // A second pass finds the pending transition and leaves it alone.
    let again = second.manager.recover().await.unwrap();
    assert_eq!(again.expired, 0);
    assert_eq!(again.already_running, 1);
    assert_eq!(second.store.list_picks(created.id).await.unwrap().len(), 1);

    second.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn running_turn_resumes_with_its_true_remaining_time() {
    let first = harness().await;
    let created = create(&first.manager, humans(2), 2, 60).await;
    activate(&first.manager, created.id).await;
    first.manager.shutdown();

    let current = draft(&first.manager, created.id).await;
    let slot = turn::current_slot(&current).unwrap();
    let now = first.manager.clock().now();
    let started = now - TimeDelta::seconds(20);
    first
        .store
        .start_timer(&TimerRecord::turn(created.id, &slot, 60, started))
        .await
        .unwrap();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            resumed: 1,
            ..RecoveryReport::default()
        }
    );
    let snapshot = second.manager.current_state(created.id).await.unwrap();
    assert_eq!(snapshot.seconds_remaining, Some(40));
    assert_eq!(snapshot.timer.map(|t| t.started_at), Some(started));

    // Running recovery again changes nothing.
    let again = second.manager.recover().await.unwrap();
    assert_eq!(again.already_running, 1);
    assert_eq!(again.resumed, 0);
    let unchanged = draft(&second.manager, created.id).await;
    assert_eq!(unchanged.current_pick, 1);
    assert!(second.store.list_picks(created.id).await.unwrap().is_empty());

    // The resumed clock still fires at the original deadline.
    run_for(39.5).await;
    assert!(second.store.list_picks(created.id).await.unwrap().is_empty());
    run_for(1.0).await;
    let picks = second.store.list_picks(created.id).await.unwrap();
    assert_eq!(picks.len(), 1);
    assert!(picks[0].is_auto_pick);

    second.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn missing_timer_restarts_the_turn() {
    let first = harness().await;
    let created = create(&first.manager, humans(2), 1, 45).await;
    activate(&first.manager, created.id).await;
    first.manager.shutdown();
    first.store.delete_timer(created.id).await.unwrap();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(report.restarted, 1);

    let timer = second.store.get_timer(created.id).await.unwrap().unwrap();
    assert_eq!(timer.kind, TimerKind::Turn);
    assert_eq!(timer.pick_number, Some(1));
    assert_eq!(timer.duration_seconds, 45);
    assert!(second.manager.has_running_timer(created.id));

    second.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn timer_for_a_past_turn_is_discarded() {
    let first = harness().await;
    let created = create(&first.manager, humans(2), 2, 30).await;
    activate(&first.manager, created.id).await;
    first.manager.shutdown();

    let current = draft(&first.manager, created.id).await;
    let mut stale_slot = turn::current_slot(&current).unwrap();
    stale_slot.pick_number = 3;
    let now = first.manager.clock().now();
    first
        .store
        .start_timer(&TimerRecord::turn(created.id, &stale_slot, 30, now))
        .await
        .unwrap();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(report.discarded_timers, 1);
    assert_eq!(report.restarted, 1);
    let timer = second.store.get_timer(created.id).await.unwrap().unwrap();
    assert_eq!(timer.pick_number, Some(1));

    second.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn preparation_countdown_survives_a_restart() {
    let first = harness().await;
    let created = create(&first.manager, humans(2), 1, 30).await;
    first.manager.start_draft(created.id).await.unwrap();
    first.manager.shutdown();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(report.resumed, 1);
    assert_eq!(draft(&second.manager, created.id).await.status, DraftStatus::Starting);

    run_for(3.5).await;
    assert_eq!(draft(&second.manager, created.id).await.status, DraftStatus::Active);

    second.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn overdue_preparation_activates_on_restart() {
    let first = harness().await;
    let created = create(&first.manager, humans(2), 1, 30).await;
    first.manager.start_draft(created.id).await.unwrap();
    first.manager.shutdown();

    let now = first.manager.clock().now();
    first
        .store
        .start_timer(&TimerRecord::preparation(created.id, 3, now - TimeDelta::seconds(30)))
        .await
        .unwrap();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(draft(&second.manager, created.id).await.status, DraftStatus::Active);
    let timer = second.store.get_timer(created.id).await.unwrap().unwrap();
    assert_eq!(timer.kind, TimerKind::Turn);

    second.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn active_draft_with_every_pick_recorded_is_completed() {
    let first = harness().await;
    let created = create(&first.manager, humans(1), 1, 30).await;
    activate(&first.manager, created.id).await;
    first.manager.shutdown();

    // The pick landed but the process died before the status flipped.
    let current = draft(&first.manager, created.id).await;
    let slot = turn::current_slot(&current).unwrap();
    let item = first.store.list_items().await.unwrap()[0].clone();
    let pick = draftday_types::Pick {
        id: draftday_types::PickId::new(),
        draft_id: created.id,
        participant_id: slot.participant_id,
        item_id: item.id,
        round: 1,
        pick_number: 1,
        is_auto_pick: false,
        picked_at: first.manager.clock().now(),
    };
    first.store.record_pick(&pick).await.unwrap();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(draft(&second.manager, created.id).await.status, DraftStatus::Completed);
    assert!(second.store.get_timer(created.id).await.unwrap().is_none());
    assert!(!second.manager.has_running_timer(created.id));
    assert_eq!(second.initializer.completed.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn orphan_timers_are_removed() {
    let first = harness().await;
    let created = create(&first.manager, humans(2), 1, 30).await;
    let now = first.manager.clock().now();
    first
        .store
        .start_timer(&TimerRecord::preparation(created.id, 10, now))
        .await
        .unwrap();

    let second = harness_on(Arc::clone(&first.store), test_config());
    let report = second.manager.recover().await.unwrap();
    assert_eq!(report.discarded_timers, 1);
    assert!(second.store.get_timer(created.id).await.unwrap().is_none());
    assert_eq!(draft(&second.manager, created.id).await.status, DraftStatus::NotStarted);
}
