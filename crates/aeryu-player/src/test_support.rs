//! Recording fakes shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use aeryu_types::{RemoteSnapshot, Track, TrackId};

use crate::backend::Backend;
use crate::device::{AudioDevice, DeviceEvent, DeviceEventKind, DeviceEventSender, MediaSource};
use crate::error::PlayerError;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    RegisterPlay(TrackId),
    Seek(u64),
    Checkpoint(TrackId, u64),
    RemoteConnect(RemoteSnapshot),
    RemoteDisconnect,
    RemotePlay(TrackId),
    RemotePause,
    RemoteResume,
    RemoteVolume(f32),
}

#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    pub fail_connect: AtomicBool,
    pub fail_register: AtomicBool,
    pub fail_mirror: AtomicBool,
    /// Delay before a disconnect request is acknowledged, in milliseconds.
    pub disconnect_delay_ms: AtomicU64,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn mirror_result(&self) -> Result<()> {
        if self.fail_mirror.load(Ordering::SeqCst) {
            Err(anyhow!("remote agent unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn register_play(&self, track_id: TrackId) -> Result<()> {
        self.record(BackendCall::RegisterPlay(track_id));
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(anyhow!("play registration rejected"));
        }
        Ok(())
    }

    async fn report_seek(&self, progress_ms: u64) -> Result<()> {
        self.record(BackendCall::Seek(progress_ms));
        Ok(())
    }

    async fn report_checkpoint(&self, track_id: TrackId, ms_played: u64) -> Result<()> {
        self.record(BackendCall::Checkpoint(track_id, ms_played));
        Ok(())
    }

    async fn remote_connect(&self, snapshot: RemoteSnapshot) -> Result<()> {
        self.record(BackendCall::RemoteConnect(snapshot));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(anyhow!("agent not in a voice channel"));
        }
        Ok(())
    }

    async fn remote_disconnect(&self) -> Result<()> {
        let delay = self.disconnect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.record(BackendCall::RemoteDisconnect);
        Ok(())
    }

    async fn remote_play(&self, track: Track) -> Result<()> {
        self.record(BackendCall::RemotePlay(track.id));
        self.mirror_result()
    }

    async fn remote_pause(&self) -> Result<()> {
        self.record(BackendCall::RemotePause);
        self.mirror_result()
    }

    async fn remote_resume(&self) -> Result<()> {
        self.record(BackendCall::RemoteResume);
        self.mirror_result()
    }

    async fn remote_volume(&self, level: f32) -> Result<()> {
        self.record(BackendCall::RemoteVolume(level));
        self.mirror_result()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Load(MediaSource),
    Play,
    Pause,
    Seek(u64),
    Volume(f32),
}

/// Shared view into a [`RecordingDevice`] after it was handed to an engine.
#[derive(Clone)]
pub struct DeviceProbe {
    calls: Arc<Mutex<Vec<DeviceCall>>>,
    events: DeviceEventSender,
    load_id: Arc<AtomicU64>,
    pub fail_load: Arc<AtomicBool>,
}

impl DeviceProbe {
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.calls().into_iter().rev().find_map(|c| match c {
            DeviceCall::Volume(v) => Some(v),
            _ => None,
        })
    }

    pub fn loaded_locators(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Load(source) => Some(source.locator),
                _ => None,
            })
            .collect()
    }

    pub fn current_load_id(&self) -> u64 {
        self.load_id.load(Ordering::SeqCst)
    }

    /// Emit an event for the currently loaded media.
    pub fn emit(&self, kind: DeviceEventKind) {
        self.emit_for(self.current_load_id(), kind);
    }

    pub fn emit_for(&self, load_id: u64, kind: DeviceEventKind) {
        let _ = self.events.send(DeviceEvent { load_id, kind });
    }
}

/// Device that records commands and acknowledges them the way a browser audio element would.
pub struct RecordingDevice {
    probe: DeviceProbe,
}

impl RecordingDevice {
    pub fn new(events: DeviceEventSender) -> (Self, DeviceProbe) {
        let probe = DeviceProbe {
            calls: Arc::new(Mutex::new(Vec::new())),
            events,
            load_id: Arc::new(AtomicU64::new(0)),
            fail_load: Arc::new(AtomicBool::new(false)),
        };
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn record(&self, call: DeviceCall) {
        self.probe.calls.lock().unwrap().push(call);
    }
}

impl AudioDevice for RecordingDevice {
    fn load(&mut self, source: MediaSource) -> Result<(), PlayerError> {
        self.record(DeviceCall::Load(source.clone()));
        if self.probe.fail_load.load(Ordering::SeqCst) {
            return Err(PlayerError::Device("unsupported codec".to_string()));
        }
        self.probe.load_id.store(source.load_id, Ordering::SeqCst);
        self.probe.emit_for(
            source.load_id,
            DeviceEventKind::MetadataLoaded {
                duration_ms: source.duration_hint_ms,
            },
        );
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        self.record(DeviceCall::Play);
        self.probe.emit(DeviceEventKind::Started);
        Ok(())
    }

    fn pause(&mut self) {
        self.record(DeviceCall::Pause);
        self.probe.emit(DeviceEventKind::Paused);
    }

    fn seek(&mut self, position_ms: u64) {
        self.record(DeviceCall::Seek(position_ms));
        self.probe.emit(DeviceEventKind::Progress {
            elapsed_ms: position_ms,
        });
    }

    fn set_volume(&mut self, level: f32) {
        self.record(DeviceCall::Volume(level));
    }
}

/// Let spawned fire-and-forget tasks run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn track(id: TrackId) -> Track {
    Track {
        id,
        title: format!("Track {id}"),
        artist: Some("Artist".to_string()),
        album: None,
        file_reference: format!("{id:04}.mp3"),
        duration_ms: Some(180_000),
        cover_reference: None,
    }
}

pub fn tracks(ids: &[TrackId]) -> Vec<Track> {
    ids.iter().copied().map(track).collect()
}
