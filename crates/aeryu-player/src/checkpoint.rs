//! Periodic listening checkpoints.
//!
//! While a track is selected, a timer credits `interval` of listening to it every period,
//! but only on ticks where local playback is actually running. At most one timer exists.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use aeryu_types::TrackId;

use crate::backend::Backend;
use crate::error::PlayerError;

struct ActiveTimer {
    track_id: TrackId,
    handle: JoinHandle<()>,
}

pub struct CheckpointReporter {
    backend: Arc<dyn Backend>,
    interval: Duration,
    playing: Arc<AtomicBool>,
    active: Option<ActiveTimer>,
}

impl CheckpointReporter {
    /// `playing` is sampled on every tick.
    pub fn new(backend: Arc<dyn Backend>, interval: Duration, playing: Arc<AtomicBool>) -> Self {
        Self {
            backend,
            interval,
            playing,
            active: None,
        }
    }

    /// Replace any running timer with one crediting `track_id`.
    pub fn start(&mut self, track_id: TrackId) {
        self.stop();
        let handle = tokio::spawn(run_checkpoints(
            self.backend.clone(),
            track_id,
            self.interval,
            self.playing.clone(),
        ));
        tracing::debug!(track_id, interval_ms = self.interval.as_millis() as u64, "checkpoints armed");
        self.active = Some(ActiveTimer { track_id, handle });
    }

    pub fn stop(&mut self) {
        if let Some(timer) = self.active.take() {
            timer.handle.abort();
            tracing::debug!(track_id = timer.track_id, "checkpoints stopped");
        }
    }

    pub fn active_track(&self) -> Option<TrackId> {
        self.active.as_ref().map(|t| t.track_id)
    }
}

impl Drop for CheckpointReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_checkpoints(
    backend: Arc<dyn Backend>,
    track_id: TrackId,
    interval: Duration,
    playing: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ms_played = interval.as_millis() as u64;
    loop {
        ticker.tick().await;
        if !playing.load(Ordering::Relaxed) {
            tracing::trace!(track_id, "checkpoint skipped while paused");
            continue;
        }
        let backend = backend.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.report_checkpoint(track_id, ms_played).await {
                let err = PlayerError::telemetry(err);
                tracing::debug!(track_id, error = %err, "checkpoint report failed");
            }
        });
    }
}
