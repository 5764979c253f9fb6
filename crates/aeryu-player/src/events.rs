//! In-process event bus for session updates.
//!
//! Outward notifications go through a broadcast [`EventBus`]; completions of background
//! backend calls come back into the session actor as [`SessionSignal`]s.

use aeryu_types::{RemotePhase, TrackId};
use tokio::sync::{broadcast, mpsc};

use crate::error::PlayerError;

/// Session event payloads for UI subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StatusChanged,
    QueueChanged,
    TrackStarted { track_id: TrackId },
    /// `next` was requested past the last track with repeat off.
    QueueExhausted,
    RemotePhaseChanged { phase: RemotePhase },
    RemoteHandoffFailed { error: PlayerError },
    DeviceError { message: String },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast channel.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    pub fn status_changed(&self) {
        let _ = self.sender.send(PlayerEvent::StatusChanged);
    }

    pub fn queue_changed(&self) {
        let _ = self.sender.send(PlayerEvent::QueueChanged);
    }

    pub fn track_started(&self, track_id: TrackId) {
        let _ = self.sender.send(PlayerEvent::TrackStarted { track_id });
    }

    pub fn queue_exhausted(&self) {
        let _ = self.sender.send(PlayerEvent::QueueExhausted);
    }

    pub fn remote_phase_changed(&self, phase: RemotePhase) {
        let _ = self.sender.send(PlayerEvent::RemotePhaseChanged { phase });
    }

    pub fn remote_handoff_failed(&self, error: PlayerError) {
        let _ = self.sender.send(PlayerEvent::RemoteHandoffFailed { error });
    }

    pub fn device_error(&self, message: impl Into<String>) {
        let _ = self.sender.send(PlayerEvent::DeviceError {
            message: message.into(),
        });
    }
}

/// Completion of a background backend call, routed back to the owning session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    RemoteConnectFinished {
        epoch: u64,
        outcome: Result<(), PlayerError>,
    },
    PlayRegistered {
        generation: u64,
        track_id: TrackId,
        outcome: Result<(), PlayerError>,
    },
}

pub type SignalSender = mpsc::UnboundedSender<SessionSignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<SessionSignal>;
