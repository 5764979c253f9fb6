//! Error taxonomy for the playback core.
//!
//! Only [`PlayerError::InvalidArgument`] and [`PlayerError::SessionClosed`] are returned to
//! callers. Device, handoff and telemetry failures are logged and surfaced as events; none of
//! them aborts a session.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Rejected input (empty queue, out-of-range index). The call had no effect.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Codec/autoplay/output failure reported by the local device.
    #[error("device error: {0}")]
    Device(String),

    /// The remote agent refused or failed the connect request.
    #[error("remote handoff failed: {0}")]
    RemoteHandoff(String),

    /// Best-effort backend call failed.
    #[error("telemetry failed: {0}")]
    Telemetry(String),

    /// The session actor is no longer running.
    #[error("playback session closed")]
    SessionClosed,
}

impl PlayerError {
    pub(crate) fn remote_handoff(err: anyhow::Error) -> Self {
        Self::RemoteHandoff(format!("{err:#}"))
    }

    pub(crate) fn telemetry(err: anyhow::Error) -> Self {
        Self::Telemetry(format!("{err:#}"))
    }
}
