use serde::{Deserialize, Serialize};

/// Stable identifier of a track in the backend library.
pub type TrackId = i64;

/// A playable library item as returned by the backend.
///
/// Field names follow the backend's JSON rows; the same value is sent back
/// verbatim to the remote agent when it is asked to play a track.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Track {
    /// Library id (`song.id`).
    pub id: TrackId,
    /// Display title.
    pub title: String,
    /// Performing artist, when tagged.
    #[serde(default)]
    pub artist: Option<String>,
    /// Album name, when tagged.
    #[serde(default)]
    pub album: Option<String>,
    /// Media file name relative to the backend media root.
    #[serde(rename = "file_basename")]
    pub file_reference: String,
    /// Duration in milliseconds, when known ahead of playback.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Cover image path relative to the backend root.
    #[serde(default, rename = "cover_path")]
    pub cover_reference: Option<String>,
}

impl Track {
    /// Artist label with the same fallback the web player shows.
    pub fn artist_label(&self) -> &str {
        self.artist.as_deref().unwrap_or("Unknown artist")
    }
}

/// Connection phase of the remote playback agent.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemotePhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Coarse lifecycle of a playback session.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No queue loaded yet.
    #[default]
    Empty,
    /// Queue present, nothing started.
    Loaded,
    Playing,
    Paused,
    /// Queue ran out without repeat; nothing further will play.
    Ended,
}

/// Where the session currently stands inside its queue.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuePosition {
    /// Index into the active (possibly shuffled) order.
    pub index: Option<usize>,
    /// Number of tracks in the queue.
    pub len: usize,
    pub is_shuffled: bool,
    pub is_repeating: bool,
    pub is_single_track: bool,
}

/// Snapshot of the session for UI binding.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// Track currently selected for playback.
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub is_repeating: bool,
    pub is_shuffled: bool,
    /// Elapsed playback time of the current track in milliseconds.
    pub elapsed_ms: u64,
    /// Duration reported by the output device, once metadata resolved.
    pub duration_ms: Option<u64>,
    /// User-facing volume in `[0, 1]`.
    pub volume: f32,
    /// Volume restored by unmute.
    pub last_non_zero_volume: f32,
    /// `true` once the backend acknowledged the play registration.
    pub play_registered: bool,
    pub remote_phase: RemotePhase,
    pub queue: QueuePosition,
}

/// `POST /api/player/play` body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StartPlayRequest {
    pub song_id: TrackId,
}

/// `POST /api/player/seek` body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeekReportRequest {
    pub progress_ms: u64,
}

/// `POST /api/plays/checkpoint` body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CheckpointRequest {
    pub song_id: TrackId,
    pub ms_played: u64,
}

/// Player state handed to the remote agent when it takes over output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteSnapshot {
    /// Track to resume on the agent, if any.
    pub song: Option<Track>,
    /// Position in seconds; the agent seeks by seconds.
    pub progress: f64,
}

/// `POST /api/discord/connect` body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteConnectRequest {
    pub state: RemoteSnapshot,
}

/// `POST /api/discord/play` body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemotePlayRequest {
    pub song: Track,
}

/// `POST /api/discord/volume` body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteVolumeRequest {
    /// Level in `[0, 1]`.
    pub volume: f32,
}

/// One page of `GET /api/songs`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SongsPage {
    pub songs: Vec<Track>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// `GET /api/playlists/<id>` response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlaylistDetail {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub cover_path: Option<String>,
    #[serde(default)]
    pub songs: Vec<Track>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_reads_backend_row_and_ignores_extra_columns() {
        let row = serde_json::json!({
            "id": 7,
            "title": "Intro",
            "artist": null,
            "album": "Demo",
            "file_basename": "0007.mp3",
            "duration_ms": 183000,
            "cover_path": "static/covers/7.jpg",
            "added_at": "2024-01-01",
            "id_formatted": "0007"
        });

        let track: Track = serde_json::from_value(row).unwrap();

        assert_eq!(track.id, 7);
        assert_eq!(track.file_reference, "0007.mp3");
        assert_eq!(track.cover_reference.as_deref(), Some("static/covers/7.jpg"));
        assert_eq!(track.artist_label(), "Unknown artist");
    }

    #[test]
    fn track_serializes_with_backend_field_names() {
        let track = Track {
            id: 1,
            title: "A".to_string(),
            artist: Some("X".to_string()),
            album: None,
            file_reference: "0001.mp3".to_string(),
            duration_ms: None,
            cover_reference: None,
        };

        let value = serde_json::to_value(&track).unwrap();

        assert_eq!(value["file_basename"], "0001.mp3");
        assert!(value.get("file_reference").is_none());
        assert!(value["cover_path"].is_null());
    }

    #[test]
    fn remote_connect_body_nests_state() {
        let body = RemoteConnectRequest {
            state: RemoteSnapshot {
                song: None,
                progress: 12.5,
            },
        };

        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value, serde_json::json!({"state": {"song": null, "progress": 12.5}}));
    }

    #[test]
    fn phases_use_snake_case() {
        assert_eq!(
            serde_json::to_value(RemotePhase::Connecting).unwrap(),
            serde_json::json!("connecting")
        );
        assert_eq!(
            serde_json::to_value(SessionPhase::Ended).unwrap(),
            serde_json::json!("ended")
        );
    }

    #[test]
    fn playlist_detail_defaults_missing_songs() {
        let detail: PlaylistDetail =
            serde_json::from_value(serde_json::json!({"id": 3, "name": "Mix"})).unwrap();
        assert!(detail.songs.is_empty());
        assert!(detail.cover_path.is_none());
    }
}
