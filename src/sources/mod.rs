use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// One queued media item. Immutable once constructed; queues hold
/// clones and never mutate a track in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    locator: String,
    title: String,
    duration_secs: u64,
    thumbnail: Option<String>,
    uploader: Option<String>,
}

impl Track {
    pub fn new(locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            duration_secs: 0,
            thumbnail: None,
            uploader: None,
        }
    }

    /// Track whose title the resolver could not determine.
    pub fn untitled(locator: impl Into<String>) -> Self {
        Self::new(locator, "Unknown Title")
    }

    /// Opaque resolvable reference (page URL or search result), not
    /// necessarily a playable stream yet.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Duration in seconds; 0 means unknown.
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }
}

/// Playable stream locator produced by [`Resolver::resolve_stream`],
/// consumed by the transport. Opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle(String);

impl StreamHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

/// Remote lookup collaborator: turns a user query or URL into a
/// [`Track`] and, later, into a playable [`StreamHandle`].
///
/// Lookups may be slow and may fail; callers bound them with a
/// timeout. Implementations wrap yt-dlp, an HTTP API, or whatever else
/// speaks to the outside world.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves a search term or URL into track metadata.
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError>;

    /// Resolves a track into a stream the transport can play. Stream
    /// URLs expire, so this runs just before playback rather than at
    /// enqueue time.
    async fn resolve_stream(&self, track: &Track) -> Result<StreamHandle, ResolveError>;

    /// Resolves a playlist URL into at most `limit` tracks.
    async fn resolve_playlist(&self, url: &str, limit: usize)
        -> Result<Vec<Track>, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_optional_metadata() {
        let track = Track::new("https://example.com/watch?v=abc", "Test Song")
            .with_duration_secs(213)
            .with_thumbnail("https://example.com/thumb.jpg")
            .with_uploader("Example Channel");

        assert_eq!(track.locator(), "https://example.com/watch?v=abc");
        assert_eq!(track.duration_secs(), 213);
        assert_eq!(track.thumbnail(), Some("https://example.com/thumb.jpg"));
        assert_eq!(track.uploader(), Some("Example Channel"));
    }

    #[test]
    fn untitled_uses_placeholder() {
        let track = Track::untitled("https://example.com/x");
        assert_eq!(track.title(), "Unknown Title");
        assert_eq!(track.duration_secs(), 0);
    }
}
