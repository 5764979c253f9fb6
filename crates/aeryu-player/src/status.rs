//! Transport state tracked by the session and the snapshot built from it.

use std::sync::Arc;

use aeryu_types::{RemotePhase, SessionPhase, SessionStatus, Track};

use crate::queue::QueueManager;

/// Transport-level fields owned by the session (queue flags live in [`QueueManager`]).
#[derive(Debug, Clone)]
pub struct TransportState {
    pub current_track: Option<Arc<Track>>,
    pub is_playing: bool,
    pub elapsed_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: f32,
    pub last_non_zero_volume: f32,
    pub play_registered: bool,
}

impl TransportState {
    pub fn new(volume: f32) -> Self {
        Self {
            current_track: None,
            is_playing: false,
            elapsed_ms: 0,
            duration_ms: None,
            volume,
            last_non_zero_volume: if volume > 0.0 { volume } else { 1.0 },
            play_registered: false,
        }
    }

    /// Reset per-track fields for a newly selected track.
    pub fn select_track(&mut self, track: Arc<Track>) {
        self.current_track = Some(track);
        self.elapsed_ms = 0;
        self.duration_ms = None;
        self.play_registered = false;
    }

    /// Record a volume change, remembering the last audible level.
    pub fn set_volume(&mut self, level: f32) {
        self.volume = level;
        if level > 0.0 {
            self.last_non_zero_volume = level;
        }
    }

    /// Level an unmute returns to.
    pub fn unmute_level(&self) -> f32 {
        if self.last_non_zero_volume > 0.0 {
            self.last_non_zero_volume
        } else {
            1.0
        }
    }
}

pub fn build_status(
    phase: SessionPhase,
    transport: &TransportState,
    queue: &QueueManager,
    remote_phase: RemotePhase,
) -> SessionStatus {
    SessionStatus {
        phase,
        current_track: transport.current_track.as_deref().cloned(),
        is_playing: transport.is_playing,
        is_repeating: queue.is_repeating(),
        is_shuffled: queue.is_shuffled(),
        elapsed_ms: transport.elapsed_ms,
        duration_ms: transport.duration_ms,
        volume: transport.volume,
        last_non_zero_volume: transport.last_non_zero_volume,
        play_registered: transport.play_registered,
        remote_phase,
        queue: queue.position_info(),
    }
}
