//! Session actor.
//!
//! Owns one [`PlaybackSession`] on a tokio task and serializes everything that touches it:
//! commands from [`SessionHandle`]s, output device events and background-call completions.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use aeryu_types::{SessionStatus, Track};

use crate::backend::Backend;
use crate::config::PlayerConfig;
use crate::device::{AudioDevice, DeviceEventSender};
use crate::error::PlayerError;
use crate::events::{EventBus, PlayerEvent};
use crate::session::PlaybackSession;

/// Commands accepted by the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    LoadQueue {
        tracks: Vec<Track>,
        start_index: usize,
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    PlayTrack {
        track: Track,
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Seek {
        position_ms: u64,
        reply: oneshot::Sender<Option<u64>>,
    },
    SeekFraction {
        fraction: f64,
        reply: oneshot::Sender<Option<u64>>,
    },
    SetVolume {
        level: f32,
    },
    ToggleMute,
    ToggleShuffle {
        reply: oneshot::Sender<bool>,
    },
    ToggleRepeat {
        reply: oneshot::Sender<bool>,
    },
    ConnectRemote,
    DisconnectRemote,
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown,
}

/// Cloneable handle for driving a running session.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    events: EventBus,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    fn send(&self, cmd: SessionCommand) -> Result<(), PlayerError> {
        self.cmd_tx.send(cmd).map_err(|_| PlayerError::SessionClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, PlayerError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| PlayerError::SessionClosed)
    }

    pub async fn load_queue(&self, tracks: Vec<Track>, start_index: usize) -> Result<(), PlayerError> {
        self.request(|reply| SessionCommand::LoadQueue {
            tracks,
            start_index,
            reply,
        })
        .await?
    }

    pub async fn play_track(&self, track: Track) -> Result<(), PlayerError> {
        self.request(|reply| SessionCommand::PlayTrack { track, reply })
            .await?
    }

    pub fn play(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::Play)
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::Pause)
    }

    pub fn toggle_play_pause(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::TogglePlayPause)
    }

    pub fn next(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::Next)
    }

    pub fn previous(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::Previous)
    }

    pub async fn seek(&self, position_ms: u64) -> Result<Option<u64>, PlayerError> {
        self.request(|reply| SessionCommand::Seek { position_ms, reply })
            .await
    }

    pub async fn seek_fraction(&self, fraction: f64) -> Result<Option<u64>, PlayerError> {
        self.request(|reply| SessionCommand::SeekFraction { fraction, reply })
            .await
    }

    pub fn set_volume(&self, level: f32) -> Result<(), PlayerError> {
        self.send(SessionCommand::SetVolume { level })
    }

    pub fn toggle_mute(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::ToggleMute)
    }

    pub async fn toggle_shuffle(&self) -> Result<bool, PlayerError> {
        self.request(|reply| SessionCommand::ToggleShuffle { reply })
            .await
    }

    pub async fn toggle_repeat(&self) -> Result<bool, PlayerError> {
        self.request(|reply| SessionCommand::ToggleRepeat { reply })
            .await
    }

    pub fn connect_remote(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::ConnectRemote)
    }

    pub fn disconnect_remote(&self) -> Result<(), PlayerError> {
        self.send(SessionCommand::DisconnectRemote)
    }

    pub async fn status(&self) -> Result<SessionStatus, PlayerError> {
        self.request(|reply| SessionCommand::Status { reply }).await
    }

    /// Ask the actor to stop. Safe to call more than once.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown);
    }
}

/// Spawn a session actor. `device_factory` receives the channel the device reports on.
pub fn spawn_session<F>(
    config: PlayerConfig,
    backend: Arc<dyn Backend>,
    device_factory: F,
) -> (SessionHandle, JoinHandle<()>)
where
    F: FnOnce(DeviceEventSender) -> Box<dyn AudioDevice>,
{
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (device_tx, device_rx) = mpsc::unbounded_channel();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let events = EventBus::new();

    let device = device_factory(device_tx);
    let session = PlaybackSession::new(config, backend, device, signal_tx, events.clone());
    let task = tokio::spawn(run_session(session, cmd_rx, device_rx, signal_rx));
    (SessionHandle { cmd_tx, events }, task)
}

async fn run_session(
    mut session: PlaybackSession,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    mut device_rx: crate::device::DeviceEventReceiver,
    mut signal_rx: crate::events::SignalReceiver,
) {
    tracing::info!("playback session started");
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                if !apply_command(&mut session, cmd) {
                    break;
                }
            }
            Some(event) = device_rx.recv() => session.handle_device_event(event),
            Some(signal) = signal_rx.recv() => session.handle_signal(signal),
        }
    }
    session.shutdown().await;
}

/// Apply one command. Returns `false` when the actor should stop.
fn apply_command(session: &mut PlaybackSession, cmd: SessionCommand) -> bool {
    match cmd {
        SessionCommand::LoadQueue {
            tracks,
            start_index,
            reply,
        } => {
            let _ = reply.send(session.load_queue(tracks, start_index));
        }
        SessionCommand::PlayTrack { track, reply } => {
            let _ = reply.send(session.play_track(track));
        }
        SessionCommand::Play => session.play(),
        SessionCommand::Pause => session.pause(),
        SessionCommand::TogglePlayPause => session.toggle_play_pause(),
        SessionCommand::Next => session.next(),
        SessionCommand::Previous => session.previous(),
        SessionCommand::Seek { position_ms, reply } => {
            let _ = reply.send(session.seek(position_ms));
        }
        SessionCommand::SeekFraction { fraction, reply } => {
            let _ = reply.send(session.seek_fraction(fraction));
        }
        SessionCommand::SetVolume { level } => {
            session.set_volume(level);
        }
        SessionCommand::ToggleMute => {
            session.toggle_mute();
        }
        SessionCommand::ToggleShuffle { reply } => {
            let _ = reply.send(session.toggle_shuffle());
        }
        SessionCommand::ToggleRepeat { reply } => {
            let _ = reply.send(session.toggle_repeat());
        }
        SessionCommand::ConnectRemote => session.connect_remote(),
        SessionCommand::DisconnectRemote => session.disconnect_remote(),
        SessionCommand::Status { reply } => {
            let _ = reply.send(session.status());
        }
        SessionCommand::Shutdown => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ClockDevice;
    use crate::test_support::{BackendCall, RecordingBackend, tracks};
    use aeryu_types::{RemotePhase, SessionPhase};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn spawn_clock_session(backend: Arc<RecordingBackend>) -> (SessionHandle, JoinHandle<()>) {
        let config = PlayerConfig::default();
        let tick = config.progress_interval;
        spawn_session(config, backend, move |events| -> Box<dyn AudioDevice> {
            Box::new(ClockDevice::new(events, tick))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn clock_session_plays_through_queue() {
        let backend = RecordingBackend::new();
        let (handle, _task) = spawn_clock_session(backend.clone());
        let mut short = tracks(&[1, 2]);
        for track in &mut short {
            track.duration_ms = Some(2_000);
        }

        handle.load_queue(short, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.current_track.map(|t| t.id), Some(1));
        assert!(status.is_playing);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.current_track.map(|t| t.id), Some(2));

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, SessionPhase::Ended);
        assert!(!status.is_playing);
        assert!(backend.calls().contains(&BackendCall::RegisterPlay(2)));
    }

    #[test]
    fn release_request_finishes_before_runtime_is_dropped() {
        let backend = RecordingBackend::new();
        backend.disconnect_delay_ms.store(20, Ordering::SeqCst);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (handle, task) = spawn_clock_session(backend.clone());
            let mut events = handle.subscribe();
            handle.load_queue(tracks(&[1]), 0).await.unwrap();
            handle.connect_remote().unwrap();
            while !matches!(
                events.recv().await,
                Ok(PlayerEvent::RemotePhaseChanged {
                    phase: RemotePhase::Connected
                })
            ) {}
            handle.shutdown();
            task.await.unwrap();
        });
        drop(runtime);

        assert!(backend.calls().contains(&BackendCall::RemoteDisconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_applied_in_order() {
        let backend = RecordingBackend::new();
        let (handle, _task) = spawn_clock_session(backend.clone());

        handle.load_queue(tracks(&[1, 2, 3]), 0).await.unwrap();
        handle.next().unwrap();
        handle.next().unwrap();
        handle.previous().unwrap();
        handle.set_volume(0.25).unwrap();
        assert!(handle.toggle_repeat().await.unwrap());

        let status = handle.status().await.unwrap();
        assert_eq!(status.current_track.map(|t| t.id), Some(2));
        assert_eq!(status.volume, 0.25);
        assert!(status.is_repeating);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_load_is_reported_to_caller() {
        let backend = RecordingBackend::new();
        let (handle, _task) = spawn_clock_session(backend);

        let err = handle.load_queue(Vec::new(), 0).await.unwrap_err();

        assert!(matches!(err, PlayerError::InvalidArgument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_remote_and_closes_handle() {
        let backend = RecordingBackend::new();
        backend.disconnect_delay_ms.store(20, Ordering::SeqCst);
        let (handle, task) = spawn_clock_session(backend.clone());
        let mut events = handle.subscribe();
        handle.load_queue(tracks(&[1]), 0).await.unwrap();
        handle.connect_remote().unwrap();

        loop {
            if let Ok(PlayerEvent::RemotePhaseChanged {
                phase: RemotePhase::Connected,
            }) = events.recv().await
            {
                break;
            }
        }
        handle.shutdown();
        task.await.unwrap();

        assert!(backend.calls().contains(&BackendCall::RemoteDisconnect));
        assert_eq!(handle.status().await.unwrap_err(), PlayerError::SessionClosed);
        assert_eq!(handle.play(), Err(PlayerError::SessionClosed));
    }
}
