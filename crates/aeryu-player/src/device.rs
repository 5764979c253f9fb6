//! Local output device boundary.
//!
//! The concrete audio API is platform-specific, so the engine only talks to an
//! [`AudioDevice`]. Devices report back asynchronously through a [`DeviceEventSender`];
//! every event carries the `load_id` of the media it belongs to so late callbacks from a
//! replaced track can be told apart.
//!
//! [`ClockDevice`] is a silent device that only keeps time. It is what the headless
//! client runs when audio is rendered by the remote agent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::PlayerError;

/// Media handed to a device on load.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    /// Engine-assigned id echoed back on every event for this media.
    pub load_id: u64,
    /// Where the device should read the media from.
    pub locator: String,
    /// Duration known ahead of decoding, if any.
    pub duration_hint_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEventKind {
    /// Metadata resolved; the media can be played.
    MetadataLoaded { duration_ms: Option<u64> },
    Progress { elapsed_ms: u64 },
    Started,
    Paused,
    Ended,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    pub load_id: u64,
    pub kind: DeviceEventKind,
}

pub type DeviceEventSender = mpsc::UnboundedSender<DeviceEvent>;
pub type DeviceEventReceiver = mpsc::UnboundedReceiver<DeviceEvent>;

/// A single local audio output.
///
/// Commands return immediately; outcomes arrive as [`DeviceEvent`]s. A synchronous `Err`
/// is reserved for failures detected before anything was handed to the output.
pub trait AudioDevice: Send {
    fn load(&mut self, source: MediaSource) -> Result<(), PlayerError>;
    fn play(&mut self) -> Result<(), PlayerError>;
    fn pause(&mut self);
    fn seek(&mut self, position_ms: u64);
    /// Output level in `[0, 1]`.
    fn set_volume(&mut self, level: f32);
}

/// Silent output that advances a virtual clock.
///
/// Tracks without a duration hint never end on their own and cannot be seeked.
pub struct ClockDevice {
    events: DeviceEventSender,
    tick: Duration,
    clock: Arc<Mutex<ClockState>>,
    ticker: Option<JoinHandle<()>>,
    volume: f32,
}

#[derive(Debug, Default)]
struct ClockState {
    load_id: u64,
    duration_ms: Option<u64>,
    base_ms: u64,
    started_at: Option<Instant>,
}

impl ClockState {
    fn elapsed_ms(&self, now: Instant) -> u64 {
        let running = self
            .started_at
            .map(|at| now.saturating_duration_since(at).as_millis() as u64)
            .unwrap_or(0);
        let elapsed = self.base_ms.saturating_add(running);
        match self.duration_ms {
            Some(duration) => elapsed.min(duration),
            None => elapsed,
        }
    }
}

impl ClockDevice {
    pub fn new(events: DeviceEventSender, tick: Duration) -> Self {
        Self {
            events,
            tick: tick.max(Duration::from_millis(1)),
            clock: Arc::new(Mutex::new(ClockState::default())),
            ticker: None,
            volume: 1.0,
        }
    }

    /// Current output level (the clock is silent; this is bookkeeping only).
    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn emit(&self, load_id: u64, kind: DeviceEventKind) {
        let _ = self.events.send(DeviceEvent { load_id, kind });
    }

    fn ensure_ticker(&mut self) {
        if self.ticker.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let load_id = self.clock.lock().map(|c| c.load_id).unwrap_or(0);
        self.ticker = Some(tokio::spawn(run_clock(
            self.clock.clone(),
            self.events.clone(),
            self.tick,
            load_id,
        )));
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl AudioDevice for ClockDevice {
    fn load(&mut self, source: MediaSource) -> Result<(), PlayerError> {
        self.stop_ticker();
        // Tracks whose metadata could not be read are stored with a zero duration.
        let duration_ms = source.duration_hint_ms.filter(|&ms| ms > 0);
        {
            let mut clock = self
                .clock
                .lock()
                .map_err(|_| PlayerError::Device("clock state poisoned".to_string()))?;
            *clock = ClockState {
                load_id: source.load_id,
                duration_ms,
                base_ms: 0,
                started_at: None,
            };
        }
        tracing::debug!(locator = %source.locator, load_id = source.load_id, "clock device loaded");
        self.emit(
            source.load_id,
            DeviceEventKind::MetadataLoaded { duration_ms },
        );
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        let load_id = {
            let mut clock = self
                .clock
                .lock()
                .map_err(|_| PlayerError::Device("clock state poisoned".to_string()))?;
            if clock.started_at.is_none() {
                clock.started_at = Some(Instant::now());
            }
            clock.load_id
        };
        self.emit(load_id, DeviceEventKind::Started);
        self.ensure_ticker();
        Ok(())
    }

    fn pause(&mut self) {
        let Ok(mut clock) = self.clock.lock() else {
            return;
        };
        if clock.started_at.is_some() {
            clock.base_ms = clock.elapsed_ms(Instant::now());
            clock.started_at = None;
        }
        let load_id = clock.load_id;
        drop(clock);
        self.emit(load_id, DeviceEventKind::Paused);
    }

    fn seek(&mut self, position_ms: u64) {
        let Ok(mut clock) = self.clock.lock() else {
            return;
        };
        let position = match clock.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        };
        clock.base_ms = position;
        if clock.started_at.is_some() {
            clock.started_at = Some(Instant::now());
        }
        let load_id = clock.load_id;
        drop(clock);
        self.emit(load_id, DeviceEventKind::Progress { elapsed_ms: position });
    }

    fn set_volume(&mut self, level: f32) {
        self.volume = level;
    }
}

impl Drop for ClockDevice {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

async fn run_clock(
    clock: Arc<Mutex<ClockState>>,
    events: DeviceEventSender,
    tick: Duration,
    load_id: u64,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let (elapsed_ms, ended) = {
            let Ok(mut state) = clock.lock() else {
                return;
            };
            if state.load_id != load_id {
                return;
            }
            if state.started_at.is_none() {
                continue;
            }
            let elapsed = state.elapsed_ms(Instant::now());
            let ended = state.duration_ms.is_some_and(|d| elapsed >= d);
            if ended {
                state.base_ms = elapsed;
                state.started_at = None;
            }
            (elapsed, ended)
        };

        let progress = DeviceEvent {
            load_id,
            kind: DeviceEventKind::Progress { elapsed_ms },
        };
        if events.send(progress).is_err() {
            return;
        }
        if ended {
            let _ = events.send(DeviceEvent {
                load_id,
                kind: DeviceEventKind::Ended,
            });
            return;
        }
    }
}
