//! HTTP client for the music backend.
//!
//! Covers play registration, seek/checkpoint telemetry, the remote agent control routes,
//! and the library lookups used to build a queue. Every call has a timeout; failures come
//! back as `anyhow` errors and callers decide whether they matter.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use aeryu_types::{
    CheckpointRequest, PlaylistDetail, RemoteConnectRequest, RemotePlayRequest, RemoteSnapshot,
    RemoteVolumeRequest, SeekReportRequest, SongsPage, StartPlayRequest, Track, TrackId,
};

use crate::config::PlayerConfig;

const PLAY_PATH: &str = "/api/player/play";
const SEEK_PATH: &str = "/api/player/seek";
const CHECKPOINT_PATH: &str = "/api/plays/checkpoint";
const REMOTE_CONNECT_PATH: &str = "/api/discord/connect";
const REMOTE_DISCONNECT_PATH: &str = "/api/discord/disconnect";
const REMOTE_PLAY_PATH: &str = "/api/discord/play";
const REMOTE_PAUSE_PATH: &str = "/api/discord/pause";
const REMOTE_RESUME_PATH: &str = "/api/discord/resume";
const REMOTE_VOLUME_PATH: &str = "/api/discord/volume";
const SONGS_PATH: &str = "/api/songs/";
const PLAYLISTS_PATH: &str = "/api/playlists";

/// Backend operations the playback session depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Register that playback of a track started.
    async fn register_play(&self, track_id: TrackId) -> Result<()>;
    /// Report a user seek (absolute position).
    async fn report_seek(&self, progress_ms: u64) -> Result<()>;
    /// Credit a listening interval to a track.
    async fn report_checkpoint(&self, track_id: TrackId, ms_played: u64) -> Result<()>;
    /// Ask the remote agent to take over output from the given snapshot.
    async fn remote_connect(&self, snapshot: RemoteSnapshot) -> Result<()>;
    async fn remote_disconnect(&self) -> Result<()>;
    async fn remote_play(&self, track: Track) -> Result<()>;
    async fn remote_pause(&self) -> Result<()>;
    async fn remote_resume(&self) -> Result<()>;
    async fn remote_volume(&self, level: f32) -> Result<()>;
}

/// `reqwest` implementation of [`Backend`] plus library lookups.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &PlayerConfig) -> Result<Self> {
        Self::new(&cfg.backend_url, cfg.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        if !resp.status().is_success() {
            return Err(anyhow!("POST {path} failed with status {}", resp.status()));
        }
        Ok(())
    }

    async fn post_empty(&self, path: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        if !resp.status().is_success() {
            return Err(anyhow!("POST {path} failed with status {}", resp.status()));
        }
        Ok(())
    }

    /// Fetch one page of the song library, optionally filtered by a search term.
    pub async fn list_songs(
        &self,
        search: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<SongsPage> {
        let mut query = vec![
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query.push(("search", term.to_string()));
        }
        let resp = self
            .client
            .get(self.endpoint(SONGS_PATH))
            .query(&query)
            .send()
            .await
            .context("fetch songs")?;
        if !resp.status().is_success() {
            return Err(anyhow!("songs request failed with status {}", resp.status()));
        }
        resp.json::<SongsPage>().await.context("decode songs page")
    }

    /// Fetch a playlist with its tracks in playlist order.
    pub async fn playlist(&self, playlist_id: i64) -> Result<PlaylistDetail> {
        let url = self.endpoint(&format!("{PLAYLISTS_PATH}/{playlist_id}"));
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetch playlist {playlist_id}"))?;
        if !resp.status().is_success() {
            return Err(anyhow!(
                "playlist {playlist_id} request failed with status {}",
                resp.status()
            ));
        }
        resp.json::<PlaylistDetail>()
            .await
            .with_context(|| format!("decode playlist {playlist_id}"))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn register_play(&self, track_id: TrackId) -> Result<()> {
        self.post_json(PLAY_PATH, &StartPlayRequest { song_id: track_id })
            .await
    }

    async fn report_seek(&self, progress_ms: u64) -> Result<()> {
        self.post_json(SEEK_PATH, &SeekReportRequest { progress_ms })
            .await
    }

    async fn report_checkpoint(&self, track_id: TrackId, ms_played: u64) -> Result<()> {
        self.post_json(
            CHECKPOINT_PATH,
            &CheckpointRequest {
                song_id: track_id,
                ms_played,
            },
        )
        .await
    }

    async fn remote_connect(&self, snapshot: RemoteSnapshot) -> Result<()> {
        self.post_json(REMOTE_CONNECT_PATH, &RemoteConnectRequest { state: snapshot })
            .await
    }

    async fn remote_disconnect(&self) -> Result<()> {
        self.post_empty(REMOTE_DISCONNECT_PATH).await
    }

    async fn remote_play(&self, track: Track) -> Result<()> {
        self.post_json(REMOTE_PLAY_PATH, &RemotePlayRequest { song: track })
            .await
    }

    async fn remote_pause(&self) -> Result<()> {
        self.post_empty(REMOTE_PAUSE_PATH).await
    }

    async fn remote_resume(&self) -> Result<()> {
        self.post_empty(REMOTE_RESUME_PATH).await
    }

    async fn remote_volume(&self, level: f32) -> Result<()> {
        self.post_json(REMOTE_VOLUME_PATH, &RemoteVolumeRequest { volume: level })
            .await
    }
}

/// Build the media URL for a track's file reference.
pub fn media_url(media_base_url: &str, file_reference: &str) -> String {
    format!(
        "{}/{}",
        media_base_url.trim_end_matches('/'),
        urlencoding::encode(file_reference)
    )
}
