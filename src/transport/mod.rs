use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportStartError;
use crate::sources::StreamHandle;
use crate::{Result, SessionId};

/// Opaque reference to the voice channel a transport connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRef(pub u64);

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Generation token handed to the transport on every `start`.
///
/// The transport passes it back through
/// [`Scheduler::notify_playback_ended`](crate::Scheduler::notify_playback_ended)
/// when playback of that item ends, where it is compared against the
/// session's current generation to detect and discard stale
/// completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionToken {
    pub session: SessionId,
    pub generation: u64,
}

/// Real-time audio delivery channel for one session.
///
/// Implementations wrap the actual voice connection (songbird's `Call`
/// or equivalent). The scheduler only drives the control surface and
/// reacts to the completion notification.
///
/// Contract: every accepted `start` ends in exactly one completion
/// notification (natural end, error, or `stop`), delivered from the
/// transport's own task. It must never be delivered from inside
/// `stop`, or the notifying call would deadlock against the session
/// lock its caller already holds.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begins playback of `handle` at `volume`. `token` must be handed
    /// back with the completion notification for this playback.
    async fn start(
        &self,
        handle: StreamHandle,
        volume: f32,
        token: CompletionToken,
    ) -> std::result::Result<(), TransportStartError>;

    /// Stops the in-flight playback, triggering its completion
    /// notification. No-op when nothing is playing.
    async fn stop(&self);

    async fn pause(&self);

    async fn resume(&self);

    /// Follows the caller to another channel without dropping the
    /// connection or the in-flight stream.
    async fn move_to(&self, channel: ChannelRef);

    /// Adjusts the live playback volume without restarting the stream.
    async fn set_volume(&self, volume: f32);

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    /// Whether any non-automated participant remains in the channel.
    async fn has_listeners(&self) -> bool;

    /// Tears down the voice connection.
    async fn disconnect(&self);
}

/// Establishes transport connections on demand; the one piece of the
/// voice stack the scheduler calls that is not per-session.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, channel: ChannelRef) -> Result<Arc<dyn Transport>>;
}
