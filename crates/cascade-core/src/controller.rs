//! Lock-serialized access and dual-rate snapshot streaming.
//!
//! [`SimController`] owns one [`Simulation`] behind a single exclusive
//! lock. Manual callers (step, reset, parameter updates, snapshots) and
//! the background stepping task all serialize through it; no operation
//! awaits while holding the lock.
//!
//! [`SimController::spawn_stream`] starts a background task running two
//! independent periodic timers: a fast one driving [`Simulation::step`]
//! and a slower one publishing snapshots. Publication is lossy
//! best-effort through a single-slot channel -- if the consumer has not
//! drained the previous frame, the new one is dropped. The contract is
//! "latest known state", not "every transition delivered".
//!
//! The task shuts down through an explicit [`StreamHandle`]; a consumer
//! that merely stops reading (or drops its receiver) does not terminate
//! the stepping loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use cascade_types::{Params, ParamsPatch, SimSnapshot};

use crate::config::StreamConfig;
use crate::sim::Simulation;

/// Thread-safe handle to one simulation instance.
///
/// Cheap to clone; all clones share the same simulation and lock.
#[derive(Debug, Clone)]
pub struct SimController {
    /// The single exclusive lock guarding all simulation state.
    inner: Arc<Mutex<Simulation>>,
}

impl SimController {
    /// Wrap a simulation for shared access.
    pub fn new(sim: Simulation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sim)),
        }
    }

    /// Execute one tick and return the resulting snapshot.
    pub async fn step(&self) -> SimSnapshot {
        let mut sim = self.inner.lock().await;
        sim.step();
        sim.snapshot()
    }

    /// Execute one tick without materializing a snapshot.
    ///
    /// The background stepping timer uses this to avoid cloning the
    /// receipt tail thirty times a second.
    async fn tick(&self) {
        let mut sim = self.inner.lock().await;
        sim.step();
    }

    /// Discard all state and rebuild from the original configuration.
    pub async fn reset(&self) -> SimSnapshot {
        let mut sim = self.inner.lock().await;
        sim.reset();
        info!("simulation reset");
        sim.snapshot()
    }

    /// Current tunable parameters.
    pub async fn params(&self) -> Params {
        self.inner.lock().await.params()
    }

    /// Apply a partial parameter update and return the new values.
    pub async fn update_params(&self, patch: ParamsPatch) -> Params {
        let mut sim = self.inner.lock().await;
        let params = sim.update_params(patch);
        info!(
            viscosity = params.viscosity,
            limit = params.limit,
            dt = params.dt,
            "parameters updated"
        );
        params
    }

    /// Value copy of the observable state.
    pub async fn snapshot(&self) -> SimSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Start the dual-rate background loop.
    ///
    /// Returns the receiving end of the lossy single-slot snapshot
    /// channel and a [`StreamHandle`] that must be used to stop the
    /// loop. Frames are published only when the step counter, the total
    /// error, or the meta energy moved beyond `config.epsilon` since the
    /// last publication.
    pub fn spawn_stream(&self, config: StreamConfig) -> (StreamHandle, mpsc::Receiver<SimSnapshot>) {
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller = self.clone();
        let task = tokio::spawn(stream_loop(controller, config, frame_tx, shutdown_rx));
        (
            StreamHandle {
                shutdown: shutdown_tx,
                task,
            },
            frame_rx,
        )
    }
}

/// Cancellation handle for the background streaming task.
///
/// Dropping the handle without calling [`StreamHandle::stop`] also tears
/// the task down: the watch sender closes and the loop exits on the next
/// timer tick.
#[derive(Debug)]
pub struct StreamHandle {
    /// Shutdown signal observed by the stream loop.
    shutdown: watch::Sender<bool>,
    /// The spawned loop task.
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Whether the loop task has already exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// The dual-rate timer loop: step fast, publish slow, stop on signal.
async fn stream_loop(
    controller: SimController,
    config: StreamConfig,
    frames: mpsc::Sender<SimSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut step_timer = tokio::time::interval(Duration::from_millis(config.step_interval_ms.max(1)));
    let mut publish_timer =
        tokio::time::interval(Duration::from_millis(config.publish_interval_ms.max(1)));
    step_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    publish_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last_step = 0_u64;
    let mut last_total = 0.0_f64;
    let mut last_meta = 0.0_f64;

    info!(
        step_interval_ms = config.step_interval_ms,
        publish_interval_ms = config.publish_interval_ms,
        "stream loop started"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("stream loop shutting down");
                break;
            }
            _ = step_timer.tick() => {
                controller.tick().await;
            }
            _ = publish_timer.tick() => {
                let snapshot = controller.snapshot().await;
                let changed = snapshot.step != last_step
                    || (snapshot.total_error - last_total).abs() > config.epsilon
                    || (snapshot.meta_energy - last_meta).abs() > config.epsilon;
                if changed {
                    last_step = snapshot.step;
                    last_total = snapshot.total_error;
                    last_meta = snapshot.meta_energy;
                    // Best-effort: drop the frame if the consumer still
                    // holds the previous one or has gone away entirely.
                    let _ = frames.try_send(snapshot);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn controller() -> SimController {
        SimController::new(Simulation::new())
    }

    fn fast_stream_config() -> StreamConfig {
        StreamConfig {
            step_interval_ms: 1,
            publish_interval_ms: 5,
            epsilon: 1e-5,
        }
    }

    #[tokio::test]
    async fn step_advances_and_snapshots() {
        let controller = controller();
        let snapshot = controller.step().await;
        assert_eq!(snapshot.step, 1);
        assert!(snapshot.total_error > 0.0);
    }

    #[tokio::test]
    async fn reset_yields_pristine_snapshot() {
        let controller = controller();
        controller.step().await;
        controller.step().await;

        let snapshot = controller.reset().await;
        assert_eq!(snapshot.step, 0);
        assert_eq!(snapshot.total_error, 0.0);
        assert_eq!(snapshot.meta_energy, 0.0);
        assert!(snapshot.receipts.is_empty());
    }

    #[tokio::test]
    async fn params_round_trip_through_the_lock() {
        let controller = controller();
        let updated = controller
            .update_params(ParamsPatch {
                limit: Some(0.9),
                ..ParamsPatch::default()
            })
            .await;
        assert_eq!(updated.limit, 0.9);
        assert_eq!(controller.params().await.limit, 0.9);
    }

    #[tokio::test]
    async fn concurrent_callers_serialize_without_loss() {
        let controller = controller();
        let mut tasks = Vec::new();
        for _ in 0..4 {
            let handle = controller.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    handle.step().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(controller.snapshot().await.step, 100);
    }

    #[tokio::test]
    async fn stream_delivers_frames_and_stops_on_signal() {
        let controller = controller();
        let (handle, mut frames) = controller.spawn_stream(fast_stream_config());

        let frame = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.step >= 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn stopped_stream_stops_stepping() {
        let controller = controller();
        let (handle, frames) = controller.spawn_stream(fast_stream_config());

        // Let it run briefly, then tear it down.
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;
        drop(frames);

        let step_after_stop = controller.snapshot().await.step;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.snapshot().await.step, step_after_stop);
    }

    #[tokio::test]
    async fn slow_consumer_gets_latest_state_not_backlog() {
        let controller = controller();
        let (handle, mut frames) = controller.spawn_stream(fast_stream_config());

        // Ignore the channel long enough for many frames to be dropped.
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The slot holds at most one stale frame; the one after it must
        // reflect recent state rather than a deep backlog.
        let first = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(second.step > first.step);

        handle.stop().await;
    }

    #[tokio::test]
    async fn dropping_the_receiver_does_not_stop_the_loop() {
        let controller = controller();
        let (handle, frames) = controller.spawn_stream(fast_stream_config());
        drop(frames);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        let before = controller.snapshot().await.step;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.snapshot().await.step > before);

        handle.stop().await;
    }
}
