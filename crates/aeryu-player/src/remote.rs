//! Remote output agent adapter.
//!
//! Tracks the connection phase of the remote agent and mirrors transport commands to it.
//! Connect runs in the background and reports back through a [`SessionSignal`]; every
//! connect or disconnect bumps an epoch so a late connect response cannot resurrect a
//! session the user already disconnected.

use std::future::Future;
use std::sync::Arc;

use aeryu_types::{RemotePhase, RemoteSnapshot, Track, TrackId};

use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::error::PlayerError;
use crate::events::{SessionSignal, SignalSender};

/// Result of applying a connect response.
#[derive(Debug, Clone, PartialEq)]
pub enum HandoffOutcome {
    Connected,
    Failed(PlayerError),
    /// Response belongs to an attempt that was superseded.
    Stale,
}

pub struct RemoteOutputAdapter {
    backend: Arc<dyn Backend>,
    phase: RemotePhase,
    epoch: u64,
    handoff_track: Option<TrackId>,
}

impl RemoteOutputAdapter {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            phase: RemotePhase::Disconnected,
            epoch: 0,
            handoff_track: None,
        }
    }

    pub fn phase(&self) -> RemotePhase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == RemotePhase::Connected
    }

    /// Track the agent was told to resume when it connected.
    pub fn handoff_track(&self) -> Option<TrackId> {
        self.handoff_track
    }

    /// Start a handoff from the given snapshot. Returns `false` unless disconnected.
    pub fn connect(&mut self, track: Option<Track>, elapsed_ms: u64, signals: &SignalSender) -> bool {
        if self.phase != RemotePhase::Disconnected {
            tracing::debug!(phase = ?self.phase, "remote connect ignored");
            return false;
        }
        self.epoch += 1;
        self.phase = RemotePhase::Connecting;
        self.handoff_track = track.as_ref().map(|t| t.id);

        let epoch = self.epoch;
        let snapshot = RemoteSnapshot {
            song: track,
            progress: elapsed_ms as f64 / 1000.0,
        };
        let backend = self.backend.clone();
        let signals = signals.clone();
        tracing::info!(epoch, progress_s = snapshot.progress, "remote handoff requested");
        tokio::spawn(async move {
            let outcome = backend
                .remote_connect(snapshot)
                .await
                .map_err(PlayerError::remote_handoff);
            let _ = signals.send(SessionSignal::RemoteConnectFinished { epoch, outcome });
        });
        true
    }

    /// Apply the response of a connect request.
    pub fn complete_connect(
        &mut self,
        epoch: u64,
        outcome: Result<(), PlayerError>,
    ) -> HandoffOutcome {
        if epoch != self.epoch || self.phase != RemotePhase::Connecting {
            tracing::debug!(epoch, current = self.epoch, "stale remote connect response");
            return HandoffOutcome::Stale;
        }
        match outcome {
            Ok(()) => {
                self.phase = RemotePhase::Connected;
                tracing::info!(epoch, "remote agent connected");
                HandoffOutcome::Connected
            }
            Err(err) => {
                self.phase = RemotePhase::Disconnected;
                self.handoff_track = None;
                tracing::warn!(epoch, error = %err, "remote handoff failed");
                HandoffOutcome::Failed(err)
            }
        }
    }

    /// Drop the remote output. Local state flips immediately; the request is best-effort.
    ///
    /// Returns the in-flight release request, or `None` when already disconnected. Callers
    /// that are about to tear down the runtime must await it.
    pub fn disconnect(&mut self) -> Option<JoinHandle<()>> {
        if self.phase == RemotePhase::Disconnected {
            return None;
        }
        self.phase = RemotePhase::Disconnected;
        self.epoch += 1;
        self.handoff_track = None;
        let backend = self.backend.clone();
        Some(spawn_mirror("disconnect", async move {
            backend.remote_disconnect().await
        }))
    }

    pub fn mirror_play(&self, track: &Track) {
        if !self.is_connected() {
            return;
        }
        let backend = self.backend.clone();
        let track = track.clone();
        spawn_mirror("play", async move { backend.remote_play(track).await });
    }

    pub fn mirror_pause(&self) {
        if !self.is_connected() {
            return;
        }
        let backend = self.backend.clone();
        spawn_mirror("pause", async move { backend.remote_pause().await });
    }

    pub fn mirror_resume(&self) {
        if !self.is_connected() {
            return;
        }
        let backend = self.backend.clone();
        spawn_mirror("resume", async move { backend.remote_resume().await });
    }

    pub fn mirror_volume(&self, level: f32) {
        if !self.is_connected() {
            return;
        }
        let backend = self.backend.clone();
        spawn_mirror("volume", async move { backend.remote_volume(level).await });
    }
}

fn spawn_mirror<F>(command: &'static str, request: F) -> JoinHandle<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = request.await {
            tracing::warn!(command, error = %err, "remote mirror failed");
        }
    })
}
