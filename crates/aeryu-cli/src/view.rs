//! Terminal rendering of session state and events.

use aeryu_player::events::PlayerEvent;
use aeryu_types::{RemotePhase, SessionPhase, SessionStatus};

pub fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn format_status(status: &SessionStatus) -> String {
    let Some(track) = status.current_track.as_ref() else {
        return "nothing loaded".to_string();
    };
    let state = match status.phase {
        SessionPhase::Playing if status.is_playing => "playing",
        SessionPhase::Playing => "starting",
        SessionPhase::Paused => "paused",
        SessionPhase::Ended => "ended",
        SessionPhase::Loaded | SessionPhase::Empty => "stopped",
    };
    let duration = status
        .duration_ms
        .map(format_clock)
        .unwrap_or_else(|| "--:--".to_string());
    let position = match status.queue.index {
        Some(idx) => format!("{}/{}", idx + 1, status.queue.len),
        None => "-".to_string(),
    };

    let mut flags = Vec::new();
    if status.is_shuffled {
        flags.push("shuffle");
    }
    if status.is_repeating {
        flags.push("repeat");
    }
    match status.remote_phase {
        RemotePhase::Connected => flags.push("remote"),
        RemotePhase::Connecting => flags.push("connecting"),
        RemotePhase::Disconnected => {}
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };

    format!(
        "{state} {} - {} {}/{} vol {}% ({position}){flags}",
        track.artist_label(),
        track.title,
        format_clock(status.elapsed_ms),
        duration,
        (status.volume * 100.0).round() as u32,
    )
}

/// One-line notice for events worth showing; `None` for high-frequency noise.
pub fn format_event(event: &PlayerEvent) -> Option<String> {
    match event {
        PlayerEvent::QueueExhausted => Some("end of queue".to_string()),
        PlayerEvent::RemotePhaseChanged { phase } => Some(match phase {
            RemotePhase::Connecting => "connecting to remote agent...".to_string(),
            RemotePhase::Connected => "remote agent is playing; local output muted".to_string(),
            RemotePhase::Disconnected => "remote agent released".to_string(),
        }),
        PlayerEvent::RemoteHandoffFailed { error } => Some(error.to_string()),
        PlayerEvent::DeviceError { message } => Some(format!("output error: {message}")),
        PlayerEvent::TrackStarted { .. }
        | PlayerEvent::StatusChanged
        | PlayerEvent::QueueChanged => None,
    }
}
