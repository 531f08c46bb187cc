//! Periodic expiry of idle selection state.
//!
//! Rooms that have not selected anyone for `idle_timeout` lose their last
//! selection so the next round starts fresh. Priority lists survive.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::store::{SelectionState, SelectionStore};
use super::{Clock, RoomId};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90 * 60);

pub struct IdleSweeper<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    idle_timeout: chrono::Duration,
}

impl<S: SelectionStore + 'static> IdleSweeper<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, idle_timeout: Duration) -> Self {
        Self {
            store,
            clock,
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// One pass over the rooms known at the start of the call.
    /// Returns the number of rooms whose selection expired.
    pub fn sweep_once(&self) -> usize {
        self.sweep_at(self.clock.now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for room in self.store.rooms() {
            if self.expire(room, now) {
                expired += 1;
            }
        }
        expired
    }

    fn expire(&self, room: RoomId, now: DateTime<Utc>) -> bool {
        // rooms removed since the snapshot come back as None
        let expired = self
            .store
            .modify(room, |state| match state.last_activity {
                Some(last) if now - last > self.idle_timeout => {
                    state.last_selected.clear();
                    state.last_activity = None;
                    true
                }
                _ => false,
            })
            .unwrap_or(false);

        if expired {
            self.store.remove_if(room, SelectionState::is_empty);
            debug!(room = room.0, "selection expired");
        }
        expired
    }

    /// Run [`sweep_once`](Self::sweep_once) every `period` until the handle
    /// is stopped.
    pub fn spawn(self, period: Duration) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let expired = self.sweep_once();
                        if expired > 0 {
                            info!(count = expired, "idle sweep expired rooms");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("idle sweep stopping");
                        break;
                    }
                }
            }
        });

        SweepHandle { shutdown_tx, task }
    }
}

pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league::store::MemoryStore;
    use crate::league::test_util::ManualClock;
    use crate::league::ParticipantId;
    use std::collections::HashSet;

    fn state_at(last_activity: DateTime<Utc>) -> SelectionState {
        SelectionState {
            last_selected: HashSet::from([ParticipantId(1), ParticipantId(2)]),
            priority: None,
            last_activity: Some(last_activity),
        }
    }

    #[test]
    fn test_sweep_expires_only_idle_rooms() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put(RoomId(1), state_at(now - chrono::Duration::hours(2)));
        store.put(RoomId(2), state_at(now - chrono::Duration::minutes(10)));

        let sweeper = IdleSweeper::new(
            Arc::clone(&store),
            Arc::new(ManualClock::new(now)),
            DEFAULT_IDLE_TIMEOUT,
        );
        assert_eq!(sweeper.sweep_once(), 1);

        assert!(store.get(RoomId(1)).is_none());
        let fresh = store.get(RoomId(2)).unwrap();
        assert_eq!(fresh.last_selected.len(), 2);

        // nothing left to expire
        assert_eq!(sweeper.sweep_once(), 0);
    }

    #[test]
    fn test_sweep_keeps_priority() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let mut state = state_at(now - chrono::Duration::hours(2));
        state.priority = Some(HashSet::from([ParticipantId(3)]));
        store.put(RoomId(1), state);

        let sweeper = IdleSweeper::new(
            Arc::clone(&store),
            Arc::new(ManualClock::new(now)),
            DEFAULT_IDLE_TIMEOUT,
        );
        assert_eq!(sweeper.sweep_once(), 1);

        let kept = store.get(RoomId(1)).unwrap();
        assert!(kept.last_selected.is_empty());
        assert!(kept.last_activity.is_none());
        assert_eq!(kept.priority, Some(HashSet::from([ParticipantId(3)])));
    }

    #[test]
    fn test_sweep_ignores_rooms_without_activity() {
        let store = Arc::new(MemoryStore::new());
        store.put(
            RoomId(5),
            SelectionState {
                priority: Some(HashSet::from([ParticipantId(1)])),
                ..Default::default()
            },
        );
        let sweeper = IdleSweeper::new(
            Arc::clone(&store),
            Arc::new(ManualClock::new(Utc::now())),
            DEFAULT_IDLE_TIMEOUT,
        );
        assert_eq!(sweeper.sweep_once(), 0);
        assert!(store.get(RoomId(5)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweep_runs_on_interval() {
        let start = Utc::now();
        let store = Arc::new(MemoryStore::new());
        store.put(RoomId(1), state_at(start));

        let clock = Arc::new(ManualClock::new(start));
        let sweeper = IdleSweeper::new(Arc::clone(&store), clock.clone(), DEFAULT_IDLE_TIMEOUT);
        let handle = sweeper.spawn(DEFAULT_PERIOD);

        // first tick fires immediately, room is still fresh
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(store.get(RoomId(1)).is_some());

        clock.advance(chrono::Duration::hours(2));
        tokio::time::sleep(DEFAULT_PERIOD).await;
        assert!(store.get(RoomId(1)).is_none());

        handle.stop().await;
    }
}
