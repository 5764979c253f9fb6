//! Playback core for the aeryu music player.
//!
//! A [`session::PlaybackSession`] drives a local [`device::AudioDevice`] through the
//! [`playback::PlaybackEngine`], orders tracks with [`queue::QueueManager`], can hand audible
//! output to a remote agent through [`remote::RemoteOutputAdapter`], and reports listening
//! telemetry to the backend. [`runtime::spawn_session`] runs a session as a tokio actor.

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod playback;
pub mod queue;
pub mod remote;
pub mod runtime;
pub mod session;
pub mod status;

#[cfg(test)]
mod test_support;
