//! Playback session state machine.
//!
//! A [`PlaybackSession`] composes the queue, the local engine, the remote output adapter
//! and the checkpoint reporter. It is driven from a single actor (see [`crate::runtime`]):
//! user commands, device events and completion signals are applied one at a time, and all
//! network calls are detached so a command's local effect is complete when it returns.

use std::sync::Arc;

use tokio::task::JoinHandle;

use aeryu_types::{RemotePhase, SessionPhase, SessionStatus, Track, TrackId};

use crate::backend::{Backend, media_url};
use crate::checkpoint::CheckpointReporter;
use crate::config::{PlayerConfig, clamp_volume};
use crate::device::{AudioDevice, DeviceEvent};
use crate::error::PlayerError;
use crate::events::{EventBus, SessionSignal, SignalSender};
use crate::playback::{EngineEvent, EngineState, PlaybackEngine};
use crate::queue::{Advance, QueueManager, Retreat};
use crate::remote::{HandoffOutcome, RemoteOutputAdapter};
use crate::status::{TransportState, build_status};

pub struct PlaybackSession {
    config: PlayerConfig,
    backend: Arc<dyn Backend>,
    queue: QueueManager,
    engine: PlaybackEngine,
    remote: RemoteOutputAdapter,
    checkpoints: CheckpointReporter,
    transport: TransportState,
    phase: SessionPhase,
    /// Bumped on every track start; guards play-registration responses.
    track_generation: u64,
    signals: SignalSender,
    events: EventBus,
}

impl PlaybackSession {
    pub fn new(
        config: PlayerConfig,
        backend: Arc<dyn Backend>,
        device: Box<dyn AudioDevice>,
        signals: SignalSender,
        events: EventBus,
    ) -> Self {
        let queue = QueueManager::new(config.restart_threshold_ms);
        Self::with_queue(config, backend, device, queue, signals, events)
    }

    /// Build a session around a prepared queue (e.g. one with a seeded shuffle source).
    pub fn with_queue(
        config: PlayerConfig,
        backend: Arc<dyn Backend>,
        device: Box<dyn AudioDevice>,
        queue: QueueManager,
        signals: SignalSender,
        events: EventBus,
    ) -> Self {
        let volume = clamp_volume(config.initial_volume);
        let engine = PlaybackEngine::new(device, volume);
        let checkpoints = CheckpointReporter::new(
            backend.clone(),
            config.checkpoint_interval,
            engine.playing_flag(),
        );
        Self {
            remote: RemoteOutputAdapter::new(backend.clone()),
            transport: TransportState::new(volume),
            config,
            backend,
            queue,
            engine,
            checkpoints,
            phase: SessionPhase::Empty,
            track_generation: 0,
            signals,
            events,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn remote_phase(&self) -> RemotePhase {
        self.remote.phase()
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    /// Track the checkpoint timer is currently crediting.
    pub fn checkpoint_track(&self) -> Option<TrackId> {
        self.checkpoints.active_track()
    }

    pub fn status(&self) -> SessionStatus {
        build_status(self.phase, &self.transport, &self.queue, self.remote.phase())
    }

    /// Replace the queue and start playing `tracks[start_index]`.
    pub fn load_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<(), PlayerError> {
        self.queue.load(tracks, start_index)?;
        self.phase = SessionPhase::Loaded;
        self.events.queue_changed();
        self.play_current();
        Ok(())
    }

    /// Play a single track as a one-entry queue.
    pub fn play_track(&mut self, track: Track) -> Result<(), PlayerError> {
        self.load_queue(vec![track], 0)
    }

    /// Start the track under the queue cursor from the beginning.
    pub fn play_current(&mut self) {
        let Some(track) = self.queue.current_track().cloned() else {
            return;
        };
        self.track_generation += 1;
        self.transport.select_track(track.clone());

        if self.remote.is_connected() {
            self.remote.mirror_play(&track);
            self.engine.set_muted(true);
        } else {
            self.engine.set_muted(false);
        }

        let locator = media_url(&self.config.media_base_url, &track.file_reference);
        if let Err(err) = self.engine.load(locator, track.duration_ms, true) {
            // Nothing started: keep the previous phase and leave the timer disarmed.
            self.checkpoints.stop();
            self.sync_transport();
            self.events.device_error(err.to_string());
            self.events.status_changed();
            return;
        }
        self.sync_transport();
        self.phase = SessionPhase::Playing;

        self.checkpoints.start(track.id);
        self.register_play(track.id);
        tracing::info!(track_id = track.id, title = %track.title, generation = self.track_generation, "track started");
        self.events.track_started(track.id);
        self.events.status_changed();
    }

    fn register_play(&self, track_id: TrackId) {
        let generation = self.track_generation;
        let backend = self.backend.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            let outcome = backend
                .register_play(track_id)
                .await
                .map_err(PlayerError::telemetry);
            let _ = signals.send(SessionSignal::PlayRegistered {
                generation,
                track_id,
                outcome,
            });
        });
    }

    /// Resume the current track. A finished track starts over.
    pub fn play(&mut self) {
        let Some(track) = self.transport.current_track.clone() else {
            return;
        };
        if self.engine.state() == EngineState::Idle {
            // The last load was rejected; try the track again.
            self.play_current();
            return;
        }
        let restarted = self.phase == SessionPhase::Ended;
        let result = if restarted {
            self.engine.restart()
        } else {
            self.engine.play()
        };
        if let Err(err) = result {
            tracing::warn!(track_id = track.id, error = %err, "resume failed");
            self.events.device_error(err.to_string());
        }
        if restarted {
            self.remote.mirror_play(&track);
        } else {
            self.remote.mirror_resume();
        }
        self.checkpoints.start(track.id);
        self.phase = SessionPhase::Playing;
        self.sync_transport();
        self.events.status_changed();
    }

    pub fn pause(&mut self) {
        if self.transport.current_track.is_none() {
            return;
        }
        self.engine.pause();
        self.checkpoints.stop();
        self.remote.mirror_pause();
        if self.phase == SessionPhase::Playing {
            self.phase = SessionPhase::Paused;
        }
        self.sync_transport();
        self.events.status_changed();
    }

    /// Pause when audio is (about to be) audible, resume otherwise.
    pub fn toggle_play_pause(&mut self) {
        if self.engine.wants_playback() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seek the current track and report the applied position. `None` until the
    /// duration is known.
    pub fn seek(&mut self, position_ms: u64) -> Option<u64> {
        let applied = self.engine.seek(position_ms)?;
        self.sync_transport();
        let backend = self.backend.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.report_seek(applied).await {
                let err = PlayerError::telemetry(err);
                tracing::debug!(progress_ms = applied, error = %err, "seek report failed");
            }
        });
        self.events.status_changed();
        Some(applied)
    }

    /// Seek to a fraction of the track duration (progress-bar click).
    pub fn seek_fraction(&mut self, fraction: f64) -> Option<u64> {
        let duration = self.engine.duration_ms()?;
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.seek((duration as f64 * fraction) as u64)
    }

    pub fn next(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        match self.queue.advance() {
            Advance::Moved | Advance::Wrapped => self.play_current(),
            Advance::Exhausted => {
                tracing::debug!("end of queue");
                self.events.queue_exhausted();
            }
        }
    }

    pub fn previous(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        match self.queue.retreat(self.engine.elapsed_ms()) {
            Retreat::RestartCurrent => {
                self.engine.rewind();
                self.sync_transport();
                self.events.status_changed();
            }
            Retreat::Moved => self.play_current(),
            Retreat::AtStart => {}
        }
    }

    fn on_engine_ended(&mut self) {
        self.checkpoints.stop();
        let Some(track) = self.transport.current_track.clone() else {
            return;
        };

        if self.queue.is_single_track() {
            if self.queue.is_repeating() {
                if let Err(err) = self.engine.restart() {
                    self.events.device_error(err.to_string());
                }
                self.checkpoints.start(track.id);
                self.remote.mirror_play(&track);
                self.sync_transport();
            } else {
                self.phase = SessionPhase::Ended;
            }
            self.events.status_changed();
            return;
        }

        match self.queue.advance() {
            Advance::Moved | Advance::Wrapped => self.play_current(),
            Advance::Exhausted => {
                tracing::info!(track_id = track.id, "queue finished");
                self.phase = SessionPhase::Ended;
                self.events.status_changed();
            }
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        let shuffled = self.queue.toggle_shuffle();
        self.events.queue_changed();
        shuffled
    }

    pub fn toggle_repeat(&mut self) -> bool {
        let repeating = self.queue.toggle_repeat();
        self.events.queue_changed();
        repeating
    }

    /// Set the user volume; mirrored to the remote agent when connected.
    pub fn set_volume(&mut self, level: f32) -> f32 {
        let level = clamp_volume(level);
        self.transport.set_volume(level);
        self.engine.set_volume(level);
        self.remote.mirror_volume(level);
        self.events.status_changed();
        level
    }

    pub fn toggle_mute(&mut self) -> f32 {
        if self.transport.volume > 0.0 {
            self.set_volume(0.0)
        } else {
            let level = self.transport.unmute_level();
            self.set_volume(level)
        }
    }

    /// Hand output to the remote agent, resuming from the current position.
    pub fn connect_remote(&mut self) {
        let track = self.transport.current_track.as_deref().cloned();
        if self
            .remote
            .connect(track, self.engine.elapsed_ms(), &self.signals)
        {
            self.events.remote_phase_changed(RemotePhase::Connecting);
            self.events.status_changed();
        }
    }

    /// Take output back locally. Local audio is unmuted without re-seeking.
    pub fn disconnect_remote(&mut self) {
        self.release_remote();
    }

    fn release_remote(&mut self) -> Option<JoinHandle<()>> {
        let request = self.remote.disconnect()?;
        self.engine.set_muted(false);
        self.events.remote_phase_changed(RemotePhase::Disconnected);
        self.events.status_changed();
        Some(request)
    }

    pub fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::RemoteConnectFinished { epoch, outcome } => {
                match self.remote.complete_connect(epoch, outcome) {
                    HandoffOutcome::Connected => self.on_remote_connected(),
                    HandoffOutcome::Failed(err) => {
                        self.engine.set_muted(false);
                        self.events.remote_handoff_failed(err);
                        self.events.remote_phase_changed(RemotePhase::Disconnected);
                        self.events.status_changed();
                    }
                    HandoffOutcome::Stale => {}
                }
            }
            SessionSignal::PlayRegistered {
                generation,
                track_id,
                outcome,
            } => {
                if generation != self.track_generation {
                    tracing::debug!(track_id, generation, "stale play registration");
                    return;
                }
                match outcome {
                    Ok(()) => {
                        self.transport.play_registered = true;
                        self.events.status_changed();
                    }
                    Err(err) => {
                        tracing::debug!(track_id, error = %err, "play registration failed");
                    }
                }
            }
        }
    }

    fn on_remote_connected(&mut self) {
        self.engine.set_muted(true);
        self.remote.mirror_volume(self.transport.volume);
        if let Some(track) = self.transport.current_track.clone() {
            // The agent resumes from the connect snapshot; catch it up on what changed since.
            if self.remote.handoff_track() != Some(track.id) {
                self.remote.mirror_play(&track);
            }
            if self.phase != SessionPhase::Playing {
                self.remote.mirror_pause();
            }
        }
        self.events.remote_phase_changed(RemotePhase::Connected);
        self.events.status_changed();
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        let Some(engine_event) = self.engine.handle_device_event(event) else {
            return;
        };
        self.sync_transport();
        match engine_event {
            EngineEvent::Ended => {
                self.on_engine_ended();
                return;
            }
            EngineEvent::Error { message } => {
                if self.phase == SessionPhase::Playing && !self.engine.wants_playback() {
                    self.checkpoints.stop();
                    self.phase = SessionPhase::Paused;
                }
                self.events.device_error(message);
            }
            EngineEvent::Progress { .. }
            | EngineEvent::DurationKnown { .. }
            | EngineEvent::PlaybackStarted
            | EngineEvent::PlaybackPaused => {}
        }
        self.events.status_changed();
    }

    /// Stop timers and release the remote agent, waiting (bounded by the request timeout)
    /// for the release request so it is not cut off when the runtime goes away.
    pub async fn shutdown(&mut self) {
        self.checkpoints.stop();
        self.engine.pause();
        if let Some(request) = self.release_remote() {
            if tokio::time::timeout(self.config.request_timeout, request)
                .await
                .is_err()
            {
                tracing::warn!("remote release did not finish before shutdown");
            }
        }
        tracing::info!("playback session stopped");
    }

    fn sync_transport(&mut self) {
        self.transport.elapsed_ms = self.engine.elapsed_ms();
        self.transport.duration_ms = self.engine.duration_ms();
        self.transport.is_playing = self.engine.is_playing();
    }
}
