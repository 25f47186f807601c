//! Per-draft broadcast of [`DraftEvent`]s to connected observers.
//!
//! Each observer watches exactly one draft and owns a bounded queue. Events
//! are pushed with `try_send` in the order [`FanOut::publish`] is called,
//! so an observer either receives every event in generation order or is
//! dropped. There is no acknowledgement and no replay; an observer that is
//! dropped reconnects and asks for a fresh snapshot.
//!
//! Liveness is checked by [`FanOut::sweep`]: every sweep pings each
//! observer, and any observer that has not answered the previous ping is
//! removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use draftday_types::{DraftEvent, DraftId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifies one observer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl core::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// The receiving end handed to a newly registered observer.
#[derive(Debug)]
pub struct Subscription {
    /// Handle for unsubscribing and answering pings.
    pub id: ObserverId,
    /// Draft being watched.
    pub draft_id: DraftId,
    /// Events for this observer, in generation order.
    pub receiver: mpsc::Receiver<DraftEvent>,
}

#[derive(Debug)]
struct ObserverHandle {
    id: ObserverId,
    sender: mpsc::Sender<DraftEvent>,
    awaiting_pong: AtomicBool,
}

/// Outcome of one liveness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Observers pinged this round.
    pub pinged: usize,
    /// Observers removed for missing the previous ping.
    pub pruned: usize,
}

/// Registry of observers keyed by draft.
#[derive(Debug)]
pub struct FanOut {
    observers: RwLock<HashMap<DraftId, Vec<ObserverHandle>>>,
    next_id: AtomicU64,
    next_nonce: AtomicU64,
    capacity: usize,
}

impl FanOut {
    /// A hub giving each observer a queue of `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            next_nonce: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a new observer for `draft_id`.
    pub fn subscribe(&self, draft_id: DraftId) -> Subscription {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(draft_id)
            .or_default()
            .push(ObserverHandle {
                id,
                sender,
                awaiting_pong: AtomicBool::new(false),
            });
        tracing::debug!(%draft_id, observer = %id, "observer subscribed");
        Subscription {
            id,
            draft_id,
            receiver,
        }
    }

    /// Remove an observer. Unknown ids are ignored.
    pub fn unsubscribe(&self, draft_id: DraftId, observer: ObserverId) {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(handles) = observers.get_mut(&draft_id) {
            handles.retain(|handle| handle.id != observer);
            if handles.is_empty() {
                observers.remove(&draft_id);
            }
        }
        tracing::debug!(%draft_id, %observer, "observer unsubscribed");
    }

    /// Deliver `event` to every observer of `draft_id`.
    ///
    /// Observers whose queue is closed or full are dropped. Returns the
    /// number of observers the event was queued for.
    pub fn publish(&self, draft_id: DraftId, event: &DraftEvent) -> usize {
        let mut stale = Vec::new();
        let mut delivered: usize = 0;
        {
            let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
            let Some(handles) = observers.get(&draft_id) else {
                return 0;
            };
            for handle in handles {
                match handle.sender.try_send(event.clone()) {
                    Ok(()) => delivered = delivered.saturating_add(1),
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(%draft_id, observer = %handle.id, "observer queue full, dropping");
                        stale.push(handle.id);
                    }
                    Err(TrySendError::Closed(_)) => stale.push(handle.id),
                }
            }
        }
        for observer in stale {
            self.unsubscribe(draft_id, observer);
        }
        tracing::debug!(%draft_id, kind = event.kind(), delivered, "event published");
        delivered
    }

    /// Mark an observer as alive.
    pub fn record_pong(&self, draft_id: DraftId, observer: ObserverId) {
        let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = observers
            .get(&draft_id)
            .and_then(|handles| handles.iter().find(|handle| handle.id == observer))
        {
            handle.awaiting_pong.store(false, Ordering::Relaxed);
        }
    }

    /// Prune observers that missed the last ping, then ping the rest.
    pub fn sweep(&self) -> SweepReport {
        let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        let ping = DraftEvent::Ping { nonce };
        let mut report = SweepReport::default();
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);

        for (draft_id, handles) in observers.iter_mut() {
            let before = handles.len();
            handles.retain(|handle| {
                if handle.awaiting_pong.load(Ordering::Relaxed) {
                    tracing::info!(%draft_id, observer = %handle.id, "observer missed ping, removing");
                    return false;
                }
                handle.awaiting_pong.store(true, Ordering::Relaxed);
                handle.sender.try_send(ping.clone()).is_ok()
            });
            report.pinged = report.pinged.saturating_add(handles.len());
            report.pruned = report
                .pruned
                .saturating_add(before.saturating_sub(handles.len()));
        }
        observers.retain(|_, handles| !handles.is_empty());
        report
    }

    /// Number of observers watching `draft_id`.
    pub fn observer_count(&self, draft_id: DraftId) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&draft_id)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn canceled(draft_id: DraftId) -> DraftEvent {
        DraftEvent::DraftCanceled { draft_id }
    }

    #[tokio::test]
    async fn events_reach_only_the_watched_draft() {
        let hub = FanOut::new(8);
        let watched = DraftId::new();
        let other = DraftId::new();
        let mut sub = hub.subscribe(watched);
        let mut other_sub = hub.subscribe(other);

        assert_eq!(hub.publish(watched, &canceled(watched)), 1);
        assert_eq!(sub.receiver.recv().await, Some(canceled(watched)));
        assert!(other_sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_preserves_order() {
        let hub = FanOut::new(16);
        let draft_id = DraftId::new();
        let mut sub = hub.subscribe(draft_id);
        for remaining_seconds in (0..10).rev() {
            hub.publish(
                draft_id,
                &DraftEvent::Countdown {
                    draft_id,
                    remaining_seconds,
                },
            );
        }
        for expected in (0..10).rev() {
            let event = sub.receiver.recv().await.unwrap();
            assert_eq!(
                event,
                DraftEvent::Countdown {
                    draft_id,
                    remaining_seconds: expected
                }
            );
        }
    }

    #[test]
    fn closed_observers_are_pruned_on_publish() {
        let hub = FanOut::new(4);
        let draft_id = DraftId::new();
        let sub = hub.subscribe(draft_id);
        drop(sub);
        assert_eq!(hub.publish(draft_id, &canceled(draft_id)), 0);
        assert_eq!(hub.observer_count(draft_id), 0);
    }

    #[test]
    fn silent_observers_are_removed_on_the_next_sweep() {
        let hub = FanOut::new(4);
        let draft_id = DraftId::new();
        let responsive = hub.subscribe(draft_id);
        let _silent = hub.subscribe(draft_id);

        let first = hub.sweep();
        assert_eq!(first.pinged, 2);
        assert_eq!(first.pruned, 0);

        hub.record_pong(draft_id, responsive.id);
        let second = hub.sweep();
        assert_eq!(second.pruned, 1);
        assert_eq!(hub.observer_count(draft_id), 1);
    }

    #[test]
    fn full_queue_drops_the_observer() {
        let hub = FanOut::new(1);
        let draft_id = DraftId::new();
        let _sub = hub.subscribe(draft_id);
        assert_eq!(hub.publish(draft_id, &canceled(draft_id)), 1);
        assert_eq!(hub.publish(draft_id, &canceled(draft_id)), 0);
        assert_eq!(hub.observer_count(draft_id), 0);
    }
}
