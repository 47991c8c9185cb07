//! Per-session playback core: an ordered queue and a single active
//! playback per guild/session, driven by completion notifications from
//! an external audio transport.
//!
//! The crate owns the state machine only. Turning user text into
//! resolved tracks ([`Resolver`]), delivering audio ([`Transport`]) and
//! rendering responses all belong to outside collaborators wired in
//! through traits.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod audio;
pub mod config;
pub mod error;
pub mod sources;
pub mod transport;

pub use audio::reaper::IdleReaper;
pub use audio::registry::SessionRegistry;
pub use audio::scheduler::Scheduler;
pub use config::{Config, ConfigError};
pub use error::{PlayerError, ResolveError, Result, TransportStartError};
pub use sources::{Resolver, StreamHandle, Track};
pub use transport::{ChannelRef, CompletionToken, Transport, TransportConnector};

/// Identifies one independent playback context (one guild's worth of
/// queue, now-playing and transport connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
