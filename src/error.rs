use crate::SessionId;

/// Remote lookup failures from the [`Resolver`](crate::Resolver).
///
/// Always surfaced to the caller before any session state changes, so
/// a failed lookup never leaves a half-applied queue.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("lookup timed out")]
    Timeout,
}

/// Stream locator rejected by the transport.
#[derive(Debug, thiserror::Error)]
#[error("transport rejected stream: {0}")]
pub struct TransportStartError(pub String);

/// Errors reported to callers of the scheduler API.
///
/// None of these are fatal to the process; every one is scoped to a
/// single session.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    TransportStart(#[from] TransportStartError),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("volume {0}% is out of range")]
    VolumeOutOfRange(u16),

    #[error("session {0} has no transport connection")]
    NotConnected(SessionId),

    #[error("transport connection failed: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
