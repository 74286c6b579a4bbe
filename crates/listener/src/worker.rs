//! Alert workers draining the event queue.
//!
//! Each worker loops on [`DedupQueue::remove_next_until`](ingest::DedupQueue::remove_next_until)
//! and hands every event to the configured [`AlertDispatcher`]. Workers stop
//! when the shutdown watch flips to `true` (or its sender is dropped); events
//! still queued at that point are discarded with the process.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use ingest::{Event, EventQueue, OrUnknown, UNKNOWN_MARKER, UNMEASURED_MARKER};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::errors::DispatchError;

// ---------------------------------------------------------------------------
// Dispatch port
// ---------------------------------------------------------------------------

/// Delivers alerts for normalized events.
///
/// Implemented by notification backends (push, chat, SMS). Implementations
/// must be safe to call from several workers at once.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Delivers one alert.
    async fn dispatch(&self, event: &Event) -> Result<(), DispatchError>;
}

/// Dispatcher that records every alert as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    fn name(&self) -> &str {
        "log"
    }

    async fn dispatch(&self, event: &Event) -> Result<(), DispatchError> {
        match event {
            Event::Spawn(spawn) => info!(
                id = %spawn.id,
                species = %spawn.species,
                iv = %OrUnknown(&spawn.iv, UNKNOWN_MARKER),
                attack = %OrUnknown(&spawn.attack, UNKNOWN_MARKER),
                defense = %OrUnknown(&spawn.defense, UNKNOWN_MARKER),
                stamina = %OrUnknown(&spawn.stamina, UNKNOWN_MARKER),
                gender = %OrUnknown(&spawn.gender, UNMEASURED_MARKER),
                disappears = %spawn.disappear_time,
                link = %spawn.map_link,
                "spawn alert"
            ),
            Event::LureStop(stop) => info!(
                id = %stop.id,
                expires = %stop.lure_expiration,
                link = %stop.map_link,
                "lure alert"
            ),
            Event::GymState(gym) => info!(
                id = %gym.id,
                team = %gym.team,
                points = %gym.points,
                guard = %OrUnknown(&gym.guard_species, UNKNOWN_MARKER),
                link = %gym.map_link,
                "gym alert"
            ),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

/// A fixed set of workers consuming one [`EventQueue`].
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers on the current Tokio runtime.
    pub fn spawn(
        count: NonZeroUsize,
        queue: Arc<EventQueue>,
        dispatcher: Arc<dyn AlertDispatcher>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let handles = (0..count.get())
            .map(|index| {
                let worker =
                    run_worker(Arc::clone(&queue), Arc::clone(&dispatcher), shutdown.clone());
                tokio::spawn(worker.instrument(tracing::info_span!("alert_worker", index)))
            })
            .collect();
        info!(workers = count.get(), backend = dispatcher.name(), "alert workers started");
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "alert worker panicked");
            }
        }
    }
}

async fn run_worker(
    queue: Arc<EventQueue>,
    dispatcher: Arc<dyn AlertDispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match queue.remove_next_until(stop_requested(&mut shutdown)).await {
            Ok(Some((key, event))) => {
                debug!(%key, "dispatching alert");
                if let Err(err) = dispatcher.dispatch(&event).await {
                    warn!(%key, backend = dispatcher.name(), error = %err, "alert dispatch failed");
                }
            }
            Ok(None) => break,
            Err(err) => {
                error!(error = %err, "event queue unusable; worker exiting");
                break;
            }
        }
    }
    debug!("alert worker stopped");
}

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use ingest::{google_maps_link, normalize, EventKey, WebhookEnvelope};
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<EventKey>>,
        fail_first: bool,
    }

    #[async_trait]
    impl AlertDispatcher for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn dispatch(&self, event: &Event) -> Result<(), DispatchError> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(event.key());
            if self.fail_first && seen.len() == 1 {
                return Err(DispatchError::Backend {
                    backend: "recording".into(),
                    message: "first delivery fails".into(),
                });
            }
            Ok(())
        }
    }

    fn gym(id: &str) -> Event {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "type": "gym-report",
            "message": {
                "gym_id": id,
                "team_id": 2,
                "gym_points": 10,
                "guard_pokemon_id": 3,
                "latitude": 1.0,
                "longitude": 2.0,
            }
        }))
        .unwrap();
        normalize(&envelope, google_maps_link).unwrap()
    }

    async fn wait_for_count(recording: &Recording, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while recording.seen.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("workers should dispatch every event");
    }

    #[tokio::test]
    async fn workers_dispatch_every_event_and_stop_on_shutdown() {
        let queue = Arc::new(EventQueue::new());
        for id in ["a", "b", "c"] {
            let event = gym(id);
            queue.add(event.key(), event).unwrap();
        }

        let recording = Arc::new(Recording::default());
        let (stop, shutdown) = watch::channel(false);
        let pool = WorkerPool::spawn(NonZeroUsize::new(2).unwrap(), Arc::clone(&queue), recording.clone(), shutdown);
        assert_eq!(pool.len(), 2);

        wait_for_count(&recording, 3).await;
        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), pool.join())
            .await
            .expect("workers should stop promptly");

        let mut ids: Vec<_> = recording.seen.lock().unwrap().iter().map(|k| k.id.to_string()).collect();
        ids.sort();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn dispatch_failure_does_not_stop_the_worker() {
        let queue = Arc::new(EventQueue::new());
        let recording = Arc::new(Recording {
            fail_first: true,
            ..Recording::default()
        });
        let (stop, shutdown) = watch::channel(false);
        let pool = WorkerPool::spawn(NonZeroUsize::new(1).unwrap(), Arc::clone(&queue), recording.clone(), shutdown);

        for id in ["x", "y"] {
            let event = gym(id);
            queue.add(event.key(), event).unwrap();
        }
        wait_for_count(&recording, 2).await;

        drop(stop);
        tokio::time::timeout(Duration::from_secs(5), pool.join()).await.unwrap();
    }

    #[tokio::test]
    async fn log_dispatcher_accepts_every_kind() {
        assert!(LogDispatcher.dispatch(&gym("g")).await.is_ok());
        assert_eq!(LogDispatcher.name(), "log");
    }
}
