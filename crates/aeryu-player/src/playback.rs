//! Local playback engine.
//!
//! Owns one [`AudioDevice`] and the state of the media loaded on it. Commands go to the
//! device; state only moves when the device confirms (started, paused, ended), so the
//! engine never reports an optimistic transition the output did not make.
//!
//! Each load gets a fresh `load_id`. Device events carrying any other id belong to media
//! that was replaced and are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::clamp_volume;
use crate::device::{AudioDevice, DeviceEvent, DeviceEventKind, MediaSource};
use crate::error::PlayerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing loaded.
    Idle,
    /// Load issued, metadata pending.
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
}

/// Engine-level notification derived from a device event.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Progress { elapsed_ms: u64 },
    DurationKnown { duration_ms: u64 },
    PlaybackStarted,
    PlaybackPaused,
    Ended,
    Error { message: String },
}

pub struct PlaybackEngine {
    device: Box<dyn AudioDevice>,
    state: EngineState,
    load_id: u64,
    autoplay: bool,
    duration_ms: Option<u64>,
    elapsed_ms: u64,
    volume: f32,
    muted: bool,
    playing: Arc<AtomicBool>,
}

impl PlaybackEngine {
    pub fn new(mut device: Box<dyn AudioDevice>, volume: f32) -> Self {
        let volume = clamp_volume(volume);
        device.set_volume(volume);
        Self {
            device,
            state: EngineState::Idle,
            load_id: 0,
            autoplay: false,
            duration_ms: None,
            elapsed_ms: 0,
            volume,
            muted: false,
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    /// Whether the user-facing transport should read as playing: confirmed playback that was
    /// not asked to pause, or a load that will autoplay.
    pub fn wants_playback(&self) -> bool {
        match self.state {
            EngineState::Playing => self.playing.load(Ordering::Relaxed),
            EngineState::Loading => self.autoplay,
            _ => false,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Level actually applied to the device.
    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    /// Flag mirroring "the device is audibly playing", shared with timers.
    pub fn playing_flag(&self) -> Arc<AtomicBool> {
        self.playing.clone()
    }

    /// Replace the loaded media. With `autoplay`, playback starts once metadata resolves.
    pub fn load(
        &mut self,
        locator: String,
        duration_hint_ms: Option<u64>,
        autoplay: bool,
    ) -> Result<(), PlayerError> {
        self.load_id += 1;
        self.state = EngineState::Loading;
        self.autoplay = autoplay;
        self.duration_ms = None;
        self.elapsed_ms = 0;
        self.playing.store(false, Ordering::Relaxed);

        let source = MediaSource {
            load_id: self.load_id,
            locator,
            duration_hint_ms,
        };
        tracing::debug!(load_id = self.load_id, locator = %source.locator, autoplay, "loading media");
        if let Err(err) = self.device.load(source) {
            tracing::warn!(load_id = self.load_id, error = %err, "device rejected media");
            self.state = EngineState::Idle;
            self.autoplay = false;
            return Err(err);
        }
        Ok(())
    }

    /// Start or resume playback. While loading this arms autoplay instead.
    pub fn play(&mut self) -> Result<(), PlayerError> {
        match self.state {
            EngineState::Idle => Ok(()),
            // A pause that the device has not confirmed yet is overridden.
            EngineState::Playing if !self.playing.load(Ordering::Relaxed) => self.device.play(),
            EngineState::Playing => Ok(()),
            EngineState::Loading => {
                self.autoplay = true;
                Ok(())
            }
            EngineState::Ready | EngineState::Paused | EngineState::Ended => self.device.play(),
        }
    }

    pub fn pause(&mut self) {
        match self.state {
            EngineState::Loading => self.autoplay = false,
            EngineState::Playing => {
                self.playing.store(false, Ordering::Relaxed);
                self.device.pause();
            }
            _ => {}
        }
    }

    /// Seek within the loaded media. Returns the applied (clamped) position, or `None`
    /// when no duration is known yet.
    pub fn seek(&mut self, position_ms: u64) -> Option<u64> {
        if matches!(self.state, EngineState::Idle | EngineState::Loading) {
            return None;
        }
        let duration = self.duration_ms?;
        let position = position_ms.min(duration);
        self.rewind_to(position);
        Some(position)
    }

    /// Jump back to 0 without changing play/pause, even if the duration is unknown.
    pub fn rewind(&mut self) {
        if !matches!(self.state, EngineState::Idle | EngineState::Loading) {
            self.rewind_to(0);
        }
    }

    /// Rewind to the start and play.
    pub fn restart(&mut self) -> Result<(), PlayerError> {
        if matches!(self.state, EngineState::Idle | EngineState::Loading) {
            return Ok(());
        }
        self.rewind_to(0);
        self.play()
    }

    fn rewind_to(&mut self, position_ms: u64) {
        self.device.seek(position_ms);
        self.elapsed_ms = position_ms;
        if self.state == EngineState::Ended {
            self.state = EngineState::Paused;
        }
    }

    pub fn set_volume(&mut self, level: f32) -> f32 {
        self.volume = clamp_volume(level);
        self.apply_volume();
        self.volume
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        self.apply_volume();
    }

    fn apply_volume(&mut self) {
        let level = self.effective_volume();
        self.device.set_volume(level);
    }

    /// Fold a device event into engine state.
    pub fn handle_device_event(&mut self, event: DeviceEvent) -> Option<EngineEvent> {
        if event.load_id != self.load_id {
            tracing::trace!(event_load = event.load_id, current = self.load_id, "stale device event");
            return None;
        }
        match event.kind {
            DeviceEventKind::MetadataLoaded { duration_ms } => {
                self.duration_ms = duration_ms;
                if self.state == EngineState::Loading {
                    self.state = EngineState::Ready;
                    if std::mem::take(&mut self.autoplay) {
                        if let Err(err) = self.device.play() {
                            tracing::warn!(error = %err, "autoplay failed");
                            return Some(EngineEvent::Error {
                                message: err.to_string(),
                            });
                        }
                    }
                }
                duration_ms.map(|duration_ms| EngineEvent::DurationKnown { duration_ms })
            }
            DeviceEventKind::Progress { elapsed_ms } => {
                self.elapsed_ms = elapsed_ms;
                if self.state == EngineState::Playing {
                    Some(EngineEvent::Progress { elapsed_ms })
                } else {
                    None
                }
            }
            DeviceEventKind::Started => {
                self.state = EngineState::Playing;
                self.playing.store(true, Ordering::Relaxed);
                Some(EngineEvent::PlaybackStarted)
            }
            DeviceEventKind::Paused => {
                self.playing.store(false, Ordering::Relaxed);
                if self.state == EngineState::Playing {
                    self.state = EngineState::Paused;
                }
                Some(EngineEvent::PlaybackPaused)
            }
            DeviceEventKind::Ended => {
                self.state = EngineState::Ended;
                self.playing.store(false, Ordering::Relaxed);
                if let Some(duration) = self.duration_ms {
                    self.elapsed_ms = duration;
                }
                Some(EngineEvent::Ended)
            }
            DeviceEventKind::Error { message } => {
                tracing::warn!(load_id = self.load_id, error = %message, "device error");
                self.autoplay = false;
                if self.state == EngineState::Playing {
                    self.state = EngineState::Paused;
                }
                self.playing.store(false, Ordering::Relaxed);
                Some(EngineEvent::Error { message })
            }
        }
    }
}
