//! End-to-end draft runs against the in-memory store under paused time.
//!
//! Every test runs on a paused tokio clock; `MonotonicClock` follows it, so
//! sleeping in the test drives countdowns deterministically.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::too_many_lines)]

mod common;

use std::collections::BTreeSet;

use common::{activate, create, drain, draft, harness, humans, legal_item, run_for};
use draftday_core::cache::StateCache;
use draftday_core::error::DraftError;
use draftday_core::store::DraftStore;
use draftday_core::turn;
use draftday_types::{AutopickStrategy, DraftEvent, DraftStatus, ItemId, Participant};

#[tokio::test(start_paused = true)]
async fn six_players_five_rounds_all_manual() {
    let h = harness().await;
    let created = create(&h.manager, humans(6), 5, 30).await;
    activate(&h.manager, created.id).await;

    for expected_pick in 1..=30_u32 {
        let current = draft(&h.manager, created.id).await;
        assert_eq!(current.current_pick, expected_pick);
        let participant = turn::current_participant(&current).unwrap();
        let item = legal_item(&h.manager, created.id, participant).await;
        let pick = h
            .manager
            .submit_pick(created.id, participant, item)
            .await
            .unwrap();
        assert_eq!(pick.pick_number, expected_pick);
        assert!(!pick.is_auto_pick);
    }

    let finished = draft(&h.manager, created.id).await;
    assert_eq!(finished.status, DraftStatus::Completed);
    assert_eq!(h.store.pick_writes(), 30);

    let picks = h.store.list_picks(created.id).await.unwrap();
    let numbers: Vec<u32> = picks.iter().map(|p| p.pick_number).collect();
    assert_eq!(numbers, (1..=30).collect::<Vec<_>>());
    assert!(!h.manager.has_running_timer(created.id));
    assert!(h.store.get_timer(created.id).await.unwrap().is_none());

    let completed = h.initializer.completed.lock().unwrap().clone();
    assert_eq!(completed, vec![(created.id, 30)]);

    // The snake order holds on the recorded picks too.
    let order = &finished.order;
    assert_eq!(picks[5].participant_id, order[5]);
    assert_eq!(picks[6].participant_id, order[5]);
    assert_eq!(picks[11].participant_id, order[0]);
}

#[tokio::test(start_paused = true)]
async fn expired_turn_gets_exactly_one_fallback_pick() {
    let h = harness().await;
    let created = create(&h.manager, humans(4), 1, 30).await;
    activate(&h.manager, created.id).await;
    let mut observer = h.manager.fanout().subscribe(created.id);

    for seat in 0..2 {
        let participant = created.order[seat];
        let item = legal_item(&h.manager, created.id, participant).await;
        h.manager
            .submit_pick(created.id, participant, item)
            .await
            .unwrap();
    }

    // Transition delay plus the full 30 second clock, then a little more.
    run_for(31.0).await;

    let picks = h.store.list_picks(created.id).await.unwrap();
    let third: Vec<_> = picks.iter().filter(|p| p.pick_number == 3).collect();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].participant_id, created.order[2]);
    assert!(third[0].is_auto_pick);

    let events = drain(&mut observer.receiver);
    let auto_picks = events
        .iter()
        .filter(|e| matches!(e, DraftEvent::AutoPickMade { pick, .. } if pick.pick_number == 3))
        .count();
    assert_eq!(auto_picks, 1);

    let ticks: Vec<i64> = events
        .iter()
        .filter_map(|e| match e {
            DraftEvent::TimerTick {
                pick_number: 3,
                remaining_seconds,
                ..
            } => Some(*remaining_seconds),
            _ => None,
        })
        .collect();
    assert_eq!(ticks.first(), Some(&30));
    assert_eq!(ticks.last(), Some(&0));
    assert!(ticks.windows(2).all(|w| w[0] > w[1]));

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn wrong_participant_is_rejected_and_pointer_unchanged() {
    let h = harness().await;
    let created = create(&h.manager, humans(3), 2, 30).await;
    activate(&h.manager, created.id).await;

    let intruder = created.order[1];
    let item = legal_item(&h.manager, created.id, intruder).await;
    let result = h.manager.submit_pick(created.id, intruder, item).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DraftError::WrongTurn { pick_number: 1, .. }));
    assert_eq!(err.reason(), "wrong_turn");
    let after = draft(&h.manager, created.id).await;
    assert_eq!(after.current_pick, 1);
    assert_eq!(after.current_round, 1);
    assert!(h.store.list_picks(created.id).await.unwrap().is_empty());

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn manual_pick_racing_expiry_records_one_pick() {
    let h = harness().await;
    let created = create(&h.manager, humans(3), 2, 30).await;
    activate(&h.manager, created.id).await;

    let first = created.order[0];
    let item = legal_item(&h.manager, created.id, first).await;
    let (manual, forced) = tokio::join!(
        h.manager.submit_pick(created.id, first, item),
        h.manager.force_expire(created.id),
    );
    assert!(manual.is_ok() || forced.is_ok());

    let picks = h.store.list_picks(created.id).await.unwrap();
    let first_picks = picks.iter().filter(|p| p.pick_number == 1).count();
    assert_eq!(first_picks, 1);

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn late_manual_pick_after_expiry_is_rejected() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 2, 10).await;
    activate(&h.manager, created.id).await;

    run_for(10.2).await;
    let first = created.order[0];
    let late = h
        .manager
        .submit_pick(created.id, first, ItemId::new())
        .await;
    assert!(matches!(late, Err(DraftError::WrongTurn { .. })));

    let picks = h.store.list_picks(created.id).await.unwrap();
    assert_eq!(picks.len(), 1);
    assert!(picks[0].is_auto_pick);
    assert_eq!(picks[0].participant_id, first);

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn unavailable_and_unknown_items_are_rejected() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 2, 30).await;
    activate(&h.manager, created.id).await;

    let first = created.order[0];
    let item = legal_item(&h.manager, created.id, first).await;
    h.manager.submit_pick(created.id, first, item).await.unwrap();

    let second = created.order[1];
    let taken = h.manager.submit_pick(created.id, second, item).await;
    assert_eq!(taken.unwrap_err().reason(), "item_unavailable");

    let unknown = h.manager.submit_pick(created.id, second, ItemId::new()).await;
    assert_eq!(unknown.unwrap_err().reason(), "not_found");

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn division_cap_rejects_second_item_from_same_division() {
    let h = harness().await;
    let created = create(&h.manager, humans(1), 3, 30).await;
    activate(&h.manager, created.id).await;

    let only = created.order[0];
    let pool = h.store.list_items().await.unwrap();
    let first = pool.iter().find(|i| i.name == "Anchors").unwrap();
    let sibling = pool.iter().find(|i| i.name == "Beacons").unwrap();
    h.manager.submit_pick(created.id, only, first.id).await.unwrap();

    let rejected = h.manager.submit_pick(created.id, only, sibling.id).await;
    let err = rejected.unwrap_err();
    assert!(matches!(err, DraftError::EligibilityViolation { cap: 1, .. }));
    assert_eq!(err.reason(), "eligibility_violation");
    assert_eq!(draft(&h.manager, created.id).await.current_pick, 2);

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn picking_before_the_draft_is_active_is_invalid() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 1, 30).await;
    let first = created.order[0];
    let item = legal_item(&h.manager, created.id, first).await;

    let early = h.manager.submit_pick(created.id, first, item).await;
    assert_eq!(early.unwrap_err().reason(), "invalid_state");

    h.manager.start_draft(created.id).await.unwrap();
    let during_preparation = h.manager.submit_pick(created.id, first, item).await;
    assert_eq!(during_preparation.unwrap_err().reason(), "invalid_state");

    let again = h.manager.start_draft(created.id).await;
    assert_eq!(again.unwrap_err().reason(), "invalid_state");

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn preparation_countdown_activates_the_draft() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 1, 30).await;
    let mut observer = h.manager.fanout().subscribe(created.id);

    h.manager.start_draft(created.id).await.unwrap();
    assert_eq!(draft(&h.manager, created.id).await.status, DraftStatus::Starting);

    run_for(3.2).await;
    assert_eq!(draft(&h.manager, created.id).await.status, DraftStatus::Active);

    let events = drain(&mut observer.receiver);
    let kinds: Vec<&str> = events.iter().map(DraftEvent::kind).collect();
    let starting = kinds.iter().position(|k| *k == "draft_starting").unwrap();
    let started = kinds.iter().position(|k| *k == "draft_started").unwrap();
    let turn_started = kinds.iter().position(|k| *k == "turn_started").unwrap();
    assert!(starting < started && started < turn_started);
    assert!(kinds.contains(&"countdown"));

    let snapshot = h.manager.current_state(created.id).await.unwrap();
    assert_eq!(
        snapshot.on_the_clock.map(|slot| slot.participant_id),
        Some(created.order[0])
    );
    assert!(snapshot.seconds_remaining.is_some_and(|s| s <= 30 && s > 0));

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn store_failure_during_pick_leaves_turn_in_place() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 1, 30).await;
    activate(&h.manager, created.id).await;

    let first = created.order[0];
    let item = legal_item(&h.manager, created.id, first).await;
    h.store.fail_pick_writes(true);
    let failed = h.manager.submit_pick(created.id, first, item).await;
    assert_eq!(failed.unwrap_err().reason(), "persistence_failure");
    assert_eq!(draft(&h.manager, created.id).await.current_pick, 1);
    assert!(h.manager.has_running_timer(created.id));

    h.store.fail_pick_writes(false);
    let pick = h.manager.submit_pick(created.id, first, item).await.unwrap();
    assert_eq!(pick.pick_number, 1);

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn timer_mirror_failures_do_not_stop_the_clock() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 1, 8).await;
    h.store.fail_timer_writes(true);
    activate(&h.manager, created.id).await;

    run_for(4.5).await;
    h.store.fail_timer_writes(false);
    run_for(4.0).await;

    let picks = h.store.list_picks(created.id).await.unwrap();
    assert_eq!(picks.len(), 1);
    assert!(picks[0].is_auto_pick);

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn scripted_seat_picks_after_its_pacing_delay() {
    let h = harness().await;
    let bot = Participant::scripted("Bot", AutopickStrategy::Alphabetical);
    let human = Participant::human("Ana");
    let created = create(&h.manager, vec![bot.clone(), human], 1, 30).await;
    activate(&h.manager, created.id).await;

    run_for(1.0).await;
    assert!(h.store.list_picks(created.id).await.unwrap().is_empty());

    run_for(1.5).await;
    let picks = h.store.list_picks(created.id).await.unwrap();
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].participant_id, bot.id);
    assert!(picks[0].is_auto_pick);

    let pool = h.store.list_items().await.unwrap();
    let alphabetical_first = pool.iter().min_by(|a, b| a.name.cmp(&b.name)).unwrap();
    assert_eq!(picks[0].item_id, alphabetical_first.id);

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn exhausted_pool_stalls_the_draft() {
    let h = common::harness_on(
        std::sync::Arc::new(draftday_core::memory::InMemoryStore::new()),
        common::test_config(),
    );
    let items = vec![
        draftday_types::Item::new("Alpha", &[("conference", "A"), ("division", "1")]),
        draftday_types::Item::new("Bravo", &[("conference", "B"), ("division", "2")]),
    ];
    h.store.seed_items(&items).await.unwrap();

    // Bypass creation checks so the pool is smaller than the draft.
    let seat = Participant::human("Ana");
    let now = chrono::Utc::now();
    let stalled = draftday_types::Draft {
        id: draftday_types::DraftId::new(),
        order: vec![seat.id],
        total_rounds: 3,
        pick_seconds: 30,
        current_round: 1,
        current_pick: 1,
        status: DraftStatus::NotStarted,
        created_at: now,
        updated_at: now,
    };
    h.store.create_draft(&stalled, &[seat]).await.unwrap();
    activate(&h.manager, stalled.id).await;
    let mut observer = h.manager.fanout().subscribe(stalled.id);

    assert!(h.manager.force_expire(stalled.id).await.unwrap().is_some());
    assert!(h.manager.force_expire(stalled.id).await.unwrap().is_some());
    let exhausted = h.manager.force_expire(stalled.id).await;
    assert_eq!(exhausted.unwrap_err().reason(), "pool_exhausted");

    assert_eq!(draft(&h.manager, stalled.id).await.status, DraftStatus::Stalled);
    assert!(!h.manager.has_running_timer(stalled.id));
    let events = drain(&mut observer.receiver);
    assert!(events.iter().any(|e| matches!(e, DraftEvent::DraftStalled { .. })));

    // Nothing keeps ticking for a stalled draft.
    run_for(60.0).await;
    assert_eq!(h.store.list_picks(stalled.id).await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_the_clock() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 2, 10).await;
    activate(&h.manager, created.id).await;

    let canceled = h.manager.cancel_draft(created.id).await.unwrap();
    assert_eq!(canceled.status, DraftStatus::Canceled);
    assert!(!h.manager.has_running_timer(created.id));
    assert!(h.store.get_timer(created.id).await.unwrap().is_none());

    run_for(60.0).await;
    assert!(h.store.list_picks(created.id).await.unwrap().is_empty());

    let restart = h.manager.start_draft(created.id).await;
    assert_eq!(restart.unwrap_err().reason(), "invalid_state");
    let cancel_again = h.manager.cancel_draft(created.id).await;
    assert_eq!(cancel_again.unwrap_err().reason(), "invalid_state");
}

#[tokio::test(start_paused = true)]
async fn reset_clears_picks_and_allows_a_restart() {
    let h = harness().await;
    let created = create(&h.manager, humans(2), 2, 30).await;
    activate(&h.manager, created.id).await;
    let first = created.order[0];
    let item = legal_item(&h.manager, created.id, first).await;
    h.manager.submit_pick(created.id, first, item).await.unwrap();

    let reset = h.manager.reset_draft(created.id).await.unwrap();
    assert_eq!(reset.status, DraftStatus::NotStarted);
    assert_eq!(reset.current_pick, 1);
    assert!(h.store.list_picks(created.id).await.unwrap().is_empty());
    assert!(!h.manager.has_running_timer(created.id));

    activate(&h.manager, created.id).await;
    let pick = h.manager.submit_pick(created.id, first, item).await.unwrap();
    assert_eq!(pick.pick_number, 1);

    h.manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn creation_is_validated() {
    let h = harness().await;
    let empty = h
        .manager
        .create_draft(draftday_types::NewDraft {
            participants: Vec::new(),
            total_rounds: 1,
            pick_seconds: None,
            randomize_order: false,
        })
        .await;
    assert_eq!(empty.unwrap_err().reason(), "invalid_request");

    let seat = Participant::human("Ana");
    let duplicate = h
        .manager
        .create_draft(draftday_types::NewDraft {
            participants: vec![seat.clone(), seat],
            total_rounds: 1,
            pick_seconds: None,
            randomize_order: false,
        })
        .await;
    assert_eq!(duplicate.unwrap_err().reason(), "invalid_request");

    let too_many = h
        .manager
        .create_draft(draftday_types::NewDraft {
            participants: humans(8),
            total_rounds: 5,
            pick_seconds: None,
            randomize_order: false,
        })
        .await;
    assert_eq!(too_many.unwrap_err().reason(), "invalid_request");

    let seats = humans(4);
    let ids: BTreeSet<_> = seats.iter().map(|p| p.id).collect();
    let shuffled = h
        .manager
        .create_draft(draftday_types::NewDraft {
            participants: seats,
            total_rounds: 2,
            pick_seconds: None,
            randomize_order: true,
        })
        .await
        .unwrap();
    assert_eq!(shuffled.order.iter().copied().collect::<BTreeSet<_>>(), ids);
    assert_eq!(shuffled.pick_seconds, 30);
    assert_eq!(shuffled.status, DraftStatus::NotStarted);
}

#[tokio::test(start_paused = true)]
async fn failed_read_during_expiry_retries_the_fallback_pick() {
    let h = harness().await;
    let created = create(&h.manager, humans(4), 1, 10).await;
    activate(&h.manager, created.id).await;
    let before = h.manager.current_state(created.id).await.unwrap();
    assert!(before.timer.is_some());

    h.store.fail_item_reads(true);
    run_for(12.0).await;

    // The snapshot cached while the clock ran must not outlive it.
    assert!(h.manager.cache().snapshot(created.id).await.unwrap().is_none());
    assert!(h.store.list_picks(created.id).await.unwrap().is_empty());
    assert_eq!(draft(&h.manager, created.id).await.status, DraftStatus::Active);
    assert!(h.manager.has_running_timer(created.id));

    h.store.fail_item_reads(false);
    run_for(2.0).await;

    let picks = h.store.list_picks(created.id).await.unwrap();
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].pick_number, 1);
    assert!(picks[0].is_auto_pick);

    h.manager.shutdown();
}
