//! Shared fixtures for the draft engine integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use draftday_core::DraftManager;
use draftday_core::PoolInitializer;
use draftday_core::clock::MonotonicClock;
use draftday_core::config::{AutopickConfig, DraftTimingConfig, DraftdayConfig};
use draftday_core::memory::InMemoryStore;
use draftday_core::store::DraftStore;
use draftday_core::turn::PickContext;
use draftday_types::{
    Draft, DraftEvent, DraftId, DraftStatus, ItemId, NewDraft, Participant, ParticipantId, Pick,
};
use tokio::sync::mpsc;

/// Short countdowns so paused-time tests stay readable.
pub fn test_config() -> DraftdayConfig {
    DraftdayConfig {
        draft: DraftTimingConfig {
            preparation_seconds: 3,
            transition_delay_ms: 500,
            tick_interval_ms: 1000,
            persist_every_ticks: 5,
            default_pick_seconds: 30,
        },
        autopick: AutopickConfig {
            scripted_delay_ms: 2000,
            seed: Some(42),
        },
        ..DraftdayConfig::default()
    }
}

/// Records every completion callback.
#[derive(Debug, Default)]
pub struct RecordingInitializer {
    pub completed: Mutex<Vec<(DraftId, usize)>>,
}

#[async_trait]
impl PoolInitializer for RecordingInitializer {
    async fn draft_completed(&self, draft: &Draft, picks: &[Pick]) {
        self.completed.lock().unwrap().push((draft.id, picks.len()));
    }
}

pub struct Harness {
    pub manager: DraftManager,
    pub store: Arc<InMemoryStore>,
    pub initializer: Arc<RecordingInitializer>,
}

/// A manager over a fresh in-memory store seeded with the default pool.
pub async fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let harness = harness_on(Arc::clone(&store), test_config());
    harness.manager.seed_default_pool().await.unwrap();
    harness
}

/// A manager over an existing store (a "restarted process").
pub fn harness_on(store: Arc<InMemoryStore>, config: DraftdayConfig) -> Harness {
    let initializer = Arc::new(RecordingInitializer::default());
    let manager = DraftManager::builder(Arc::clone(&store) as Arc<dyn DraftStore>, config)
        .clock(Arc::new(MonotonicClock::starting_now()))
        .pool_initializer(Arc::clone(&initializer) as Arc<dyn PoolInitializer>)
        .build();
    Harness {
        manager,
        store,
        initializer,
    }
}

pub fn humans(count: usize) -> Vec<Participant> {
    (1..=count)
        .map(|n| Participant::human(&format!("Player {n}")))
        .collect()
}

pub async fn create(manager: &DraftManager, participants: Vec<Participant>, rounds: u32, pick_seconds: u32) -> Draft {
    manager
        .create_draft(NewDraft {
            participants,
            total_rounds: rounds,
            pick_seconds: Some(pick_seconds),
            randomize_order: false,
        })
        .await
        .unwrap()
}

/// Start a draft and skip its preparation countdown.
pub async fn activate(manager: &DraftManager, draft_id: DraftId) {
    manager.start_draft(draft_id).await.unwrap();
    assert!(manager.force_expire(draft_id).await.unwrap().is_none());
    let draft = manager.store().get_draft(draft_id).await.unwrap().unwrap();
    assert_eq!(draft.status, DraftStatus::Active);
}

/// First legal item for whoever is on the clock.
pub async fn legal_item(manager: &DraftManager, draft_id: DraftId, participant: ParticipantId) -> ItemId {
    let pool = manager.store().list_items().await.unwrap();
    let picks = manager.store().list_picks(draft_id).await.unwrap();
    let context = PickContext {
        pool: &pool,
        picks: &picks,
    };
    let eligibility = context.eligibility(manager.rule(), participant);
    eligibility.candidates().first().unwrap().id
}

pub async fn draft(manager: &DraftManager, draft_id: DraftId) -> Draft {
    manager.store().get_draft(draft_id).await.unwrap().unwrap()
}

/// Let background tasks run for `seconds` of virtual time.
pub async fn run_for(seconds: f64) {
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
}

/// Everything currently queued for an observer.
pub fn drain(receiver: &mut mpsc::Receiver<DraftEvent>) -> Vec<DraftEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
