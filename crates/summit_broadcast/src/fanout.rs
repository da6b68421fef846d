//! Subscriber fan-out with delivery classes.
//!
//! Three policies from the broadcast config:
//! - **Immediate**: top-N membership and movement events go out on commit
//! - **Batched**: outside-window churn coalesces per user and flushes on
//!   the configured interval
//! - **Throttled**: a hard per-subscriber events/sec cap; over-cap events
//!   coalesce so only the latest state per user survives
//!
//! Delivery never reorders: a subscriber's observed generations are
//! non-decreasing, and an update superseded before delivery is dropped.

use crate::diff::diff_snapshots;
use crate::events::{CommitNotice, RankChange, RankEvent};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use summit_core::config::BroadcastConfig;
use summit_core::TimestampMs;
use summit_ranking::RankingSnapshot;

/// Commands accepted by the worker thread.
enum Command {
    /// A ranking commit to diff and distribute.
    Commit(CommitNotice),
    /// Flush pending (batched and throttle-deferred) events now.
    Flush,
    /// Stop the worker.
    Shutdown,
}

/// Per-subscriber delivery state machine.
///
/// Kept free of clock reads: `now_ms` flows in from the worker so the
/// policy logic is unit-testable.
struct DeliveryState {
    sender: Sender<RankEvent>,
    last_generation: u64,
    window_start_ms: TimestampMs,
    delivered_in_window: u32,
    /// Coalesced updates keyed by user; newest generation wins.
    pending: HashMap<u64, RankEvent>,
    disconnected: bool,
}

impl DeliveryState {
    fn new(sender: Sender<RankEvent>) -> Self {
        Self {
            sender,
            last_generation: 0,
            window_start_ms: 0,
            delivered_in_window: 0,
            pending: HashMap::new(),
            disconnected: false,
        }
    }

    /// Offers one event. Immediate events try the wire first; everything
    /// over budget (or batched) coalesces into the pending map.
    fn offer(&mut self, event: RankEvent, immediate: bool, cap: u32, now_ms: TimestampMs) {
        if event.generation < self.last_generation {
            return; // Superseded before delivery: drop, never reorder.
        }
        if immediate && self.try_deliver(event, cap, now_ms) {
            return;
        }
        let user = event.change.user().0;
        let slot = self.pending.entry(user).or_insert(event);
        if event.generation >= slot.generation {
            *slot = event; // Only the latest state survives.
        }
    }

    /// Flushes pending events in generation order, within budget.
    fn flush(&mut self, cap: u32, now_ms: TimestampMs) {
        if self.pending.is_empty() {
            return;
        }
        let mut queued: Vec<RankEvent> = self.pending.drain().map(|(_, e)| e).collect();
        queued.sort_by_key(|event| event.generation);
        for event in queued {
            if event.generation < self.last_generation {
                continue;
            }
            if !self.try_deliver(event, cap, now_ms) {
                // Budget exhausted: keep for the next flush tick.
                self.pending.insert(event.change.user().0, event);
            }
        }
    }

    /// Attempts a delivery under the per-second cap. Returns true when the
    /// event was consumed (delivered or permanently dropped).
    fn try_deliver(&mut self, event: RankEvent, cap: u32, now_ms: TimestampMs) -> bool {
        if now_ms.saturating_sub(self.window_start_ms) >= 1_000 {
            self.window_start_ms = now_ms;
            self.delivered_in_window = 0;
        }
        if self.delivered_in_window >= cap {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => {
                self.delivered_in_window += 1;
                self.last_generation = event.generation;
                true
            }
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                self.disconnected = true;
                true // Consume silently; the registry reaps us later.
            }
        }
    }
}

/// Handle to a subscription: keep the receiver, drop it to unsubscribe.
pub struct Subscription {
    /// Registry key, for explicit [`Broadcaster::unsubscribe`].
    pub id: u64,
    /// Stream of generation-stamped delta events.
    pub receiver: Receiver<RankEvent>,
}

/// Fan-out hub. One worker thread serves every subscriber.
pub struct Broadcaster {
    command_tx: Sender<Command>,
    subscribers: Arc<Mutex<HashMap<u64, DeliveryState>>>,
    next_id: AtomicU64,
    config: BroadcastConfig,
    worker: Option<JoinHandle<()>>,
}

impl Broadcaster {
    /// Starts the fan-out worker.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        let (command_tx, command_rx) = bounded::<Command>(1_024);
        let subscribers: Arc<Mutex<HashMap<u64, DeliveryState>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let worker_subscribers = Arc::clone(&subscribers);
        let worker_config = config.clone();
        let worker = std::thread::Builder::new()
            .name("summit-broadcast".to_string())
            .spawn(move || worker_loop(&command_rx, &worker_subscribers, &worker_config))
            .ok();

        if worker.is_none() {
            tracing::warn!("broadcast worker failed to spawn; events will not be delivered");
        }

        Self {
            command_tx,
            subscribers,
            next_id: AtomicU64::new(1),
            config,
            worker,
        }
    }

    /// Registers a subscriber and returns its event stream.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = bounded(self.config.queue_capacity.max(1));
        self.subscribers.lock().insert(id, DeliveryState::new(tx));
        Subscription { id, receiver: rx }
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Hands a commit to the worker. NEVER blocks: under backpressure the
    /// notice is dropped and the next commit's diff covers the gap.
    pub fn publish(&self, notice: CommitNotice) {
        if let Err(TrySendError::Full(_)) = self.command_tx.try_send(Command::Commit(notice)) {
            tracing::warn!("broadcast queue full, dropping commit notice");
        }
    }

    /// Forces a flush of batched and throttle-deferred events.
    pub fn flush(&self) {
        let _ = self.command_tx.try_send(Command::Flush);
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        let _ = self.command_tx.try_send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Worker: receives commits, diffs snapshots, drives per-subscriber state.
fn worker_loop(
    command_rx: &Receiver<Command>,
    subscribers: &Arc<Mutex<HashMap<u64, DeliveryState>>>,
    config: &BroadcastConfig,
) {
    let flush_interval = std::time::Duration::from_millis(config.batch_flush_interval_ms.max(1));
    let mut previous = Arc::new(RankingSnapshot::default());

    loop {
        match command_rx.recv_timeout(flush_interval) {
            Ok(Command::Commit(notice)) => {
                let now_ms = wall_clock_ms();
                let immediate = diff_snapshots(&previous, &notice.snapshot);
                let outside_window = !notice.snapshot.contains(notice.actor);

                let mut registry = subscribers.lock();
                for state in registry.values_mut() {
                    for event in &immediate {
                        state.offer(*event, true, config.events_per_sec, now_ms);
                    }
                    if outside_window {
                        state.offer(
                            RankEvent {
                                generation: notice.snapshot.generation,
                                change: RankChange::ScoreChanged {
                                    user: notice.actor,
                                    total: notice.actor_total,
                                    rank: notice.actor_rank,
                                },
                            },
                            false,
                            config.events_per_sec,
                            now_ms,
                        );
                    }
                }
                registry.retain(|_, state| !state.disconnected);
                previous = notice.snapshot;
            }
            Ok(Command::Flush) | Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                let now_ms = wall_clock_ms();
                let mut registry = subscribers.lock();
                for state in registry.values_mut() {
                    state.flush(config.events_per_sec, now_ms);
                }
                registry.retain(|_, state| !state.disconnected);
            }
            Ok(Command::Shutdown) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                break;
            }
        }
    }
}

/// Wall clock for delivery pacing only; commit timestamps come from the
/// pipeline, never from here.
fn wall_clock_ms() -> TimestampMs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use summit_core::UserId;

    fn event(generation: u64, user: u64, rank: u64) -> RankEvent {
        RankEvent {
            generation,
            change: RankChange::Moved { user: UserId(user), old_rank: rank + 1, new_rank: rank },
        }
    }

    #[test]
    fn test_immediate_delivery_within_budget() {
        let (tx, rx) = bounded(16);
        let mut state = DeliveryState::new(tx);

        state.offer(event(1, 5, 1), true, 10, 0);
        assert_eq!(rx.try_recv().unwrap().generation, 1);
    }

    #[test]
    fn test_throttle_coalesces_to_latest() {
        let (tx, rx) = bounded(16);
        let mut state = DeliveryState::new(tx);

        // Cap of 2 per second: the first two go out, the rest coalesce.
        for generation in 1..=5 {
            state.offer(event(generation, 7, 1), true, 2, 100);
        }
        assert_eq!(rx.try_recv().unwrap().generation, 1);
        assert_eq!(rx.try_recv().unwrap().generation, 2);
        assert!(rx.try_recv().is_err());

        // Next second: only the LATEST coalesced state is delivered.
        state.flush(2, 1_200);
        assert_eq!(rx.try_recv().unwrap().generation, 5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_generations_never_decrease() {
        let (tx, rx) = bounded(16);
        let mut state = DeliveryState::new(tx);

        state.offer(event(5, 1, 1), true, 10, 0);
        // A stale event arrives late: dropped, not delivered out of order.
        state.offer(event(3, 2, 2), true, 10, 0);
        state.offer(event(6, 3, 3), true, 10, 0);

        let generations: Vec<u64> = rx.try_iter().map(|e| e.generation).collect();
        assert_eq!(generations, vec![5, 6]);
    }

    #[test]
    fn test_batched_events_wait_for_flush() {
        let (tx, rx) = bounded(16);
        let mut state = DeliveryState::new(tx);

        state.offer(event(1, 4, 9), false, 10, 0);
        assert!(rx.try_recv().is_err());

        state.flush(10, 50);
        assert_eq!(rx.try_recv().unwrap().generation, 1);
    }

    #[test]
    fn test_full_channel_defers_instead_of_blocking() {
        let (tx, rx) = bounded(1);
        let mut state = DeliveryState::new(tx);

        state.offer(event(1, 1, 1), true, 10, 0);
        state.offer(event(2, 2, 2), true, 10, 0); // Channel full: coalesced.

        assert_eq!(rx.try_recv().unwrap().generation, 1);
        state.flush(10, 10);
        assert_eq!(rx.try_recv().unwrap().generation, 2);
    }

    #[test]
    fn test_worker_end_to_end() {
        let config = BroadcastConfig {
            batch_flush_interval_ms: 10,
            events_per_sec: 100,
            queue_capacity: 64,
        };
        let broadcaster = Broadcaster::new(config);
        let subscription = broadcaster.subscribe();

        let snapshot = Arc::new(RankingSnapshot {
            generation: 1,
            entries: vec![(UserId(1), 100)],
        });
        broadcaster.publish(CommitNotice {
            snapshot,
            actor: UserId(1),
            actor_total: 100,
            actor_rank: 1,
        });

        let received = subscription
            .receiver
            .recv_timeout(std::time::Duration::from_secs(2))
            .expect("event should arrive");
        assert_eq!(received.generation, 1);
        assert_eq!(
            received.change,
            RankChange::Entered { user: UserId(1), rank: 1 }
        );

        broadcaster.unsubscribe(subscription.id);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
