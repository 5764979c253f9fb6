//! Configuration loading and parsing.
//!
//! `SessionFileConfig` is the on-disk TOML schema (every field optional);
//! `PlayerConfig` is the resolved set of settings the session runs with.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Player configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Backend base URL (scheme://host:port).
    pub backend_url: Option<String>,
    /// Base URL media files are served from (defaults to `<backend_url>/media`).
    pub media_base_url: Option<String>,
    /// Listening checkpoint period in milliseconds (default: 15000).
    pub checkpoint_interval_ms: Option<u64>,
    /// Elapsed time after which "previous" restarts the track (default: 3000).
    pub restart_threshold_ms: Option<u64>,
    /// Per-request timeout for backend calls in milliseconds (default: 5000).
    pub request_timeout_ms: Option<u64>,
    /// Seconds of listening before a play counts (currently unused).
    pub play_threshold_seconds: Option<u64>,
    /// Starting volume in `[0, 1]` (default: 1.0).
    pub initial_volume: Option<f32>,
    /// Progress tick period of the clock output device (default: 250).
    pub progress_interval_ms: Option<u64>,
}

impl SessionFileConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<SessionFileConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Resolved settings for one playback session.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    pub backend_url: String,
    pub media_base_url: String,
    pub checkpoint_interval: Duration,
    pub restart_threshold_ms: u64,
    pub request_timeout: Duration,
    /// Carried for parity with the backend's play model; nothing consumes it yet.
    pub play_threshold_seconds: u64,
    pub initial_volume: f32,
    pub progress_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            media_base_url: format!("{DEFAULT_BACKEND_URL}/media"),
            checkpoint_interval: Duration::from_millis(15_000),
            restart_threshold_ms: 3_000,
            request_timeout: Duration::from_millis(5_000),
            play_threshold_seconds: 15,
            initial_volume: 1.0,
            progress_interval: Duration::from_millis(250),
        }
    }
}

impl PlayerConfig {
    /// Resolve file settings on top of the defaults.
    pub fn from_file(cfg: &SessionFileConfig) -> Result<Self> {
        let defaults = Self::default();
        let backend_url = match cfg.backend_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => normalize_base_url(url)?,
            _ => defaults.backend_url.clone(),
        };
        let media_base_url = match cfg.media_base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => normalize_base_url(url)?,
            _ => format!("{backend_url}/media"),
        };
        let checkpoint_ms = cfg
            .checkpoint_interval_ms
            .unwrap_or(defaults.checkpoint_interval.as_millis() as u64);
        if checkpoint_ms == 0 {
            return Err(anyhow::anyhow!("checkpoint_interval_ms must be positive"));
        }
        let progress_ms = cfg
            .progress_interval_ms
            .unwrap_or(defaults.progress_interval.as_millis() as u64);
        if progress_ms == 0 {
            return Err(anyhow::anyhow!("progress_interval_ms must be positive"));
        }

        Ok(Self {
            backend_url,
            media_base_url,
            checkpoint_interval: Duration::from_millis(checkpoint_ms),
            restart_threshold_ms: cfg
                .restart_threshold_ms
                .unwrap_or(defaults.restart_threshold_ms),
            request_timeout: cfg
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            play_threshold_seconds: cfg
                .play_threshold_seconds
                .unwrap_or(defaults.play_threshold_seconds),
            initial_volume: clamp_volume(cfg.initial_volume.unwrap_or(defaults.initial_volume)),
            progress_interval: Duration::from_millis(progress_ms),
        })
    }

    /// Point the session at another backend, re-deriving the media URL.
    pub fn with_backend_url(mut self, url: &str) -> Result<Self> {
        let derived_media = format!("{}/media", self.backend_url);
        self.backend_url = normalize_base_url(url)?;
        if self.media_base_url == derived_media {
            self.media_base_url = format!("{}/media", self.backend_url);
        }
        Ok(self)
    }
}

/// Clamp a volume level into `[0, 1]`, mapping NaN to silence.
pub fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

fn normalize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow::anyhow!("base url must start with http:// or https://: {url}"));
    }
    Ok(trimmed.to_string())
}
