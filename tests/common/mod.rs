//! Scripted transport and resolver fakes shared by the integration
//! tests. The fake transport records every control call and lets tests
//! deliver completion notifications by hand, so races are driven
//! deliberately instead of by timing.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use tunedeck::{
    ChannelRef, CompletionToken, ResolveError, Resolver, Result, StreamHandle, Track, Transport,
    TransportConnector, TransportStartError,
};

/// Routes scheduler logs into the test harness output. Safe to call
/// from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct StartedPlayback {
    pub handle: StreamHandle,
    pub volume: f32,
    pub token: CompletionToken,
}

#[derive(Default)]
struct TransportInner {
    playing: bool,
    paused: bool,
    volume: f32,
    started: Vec<StartedPlayback>,
    stop_calls: usize,
    listeners_present: bool,
    disconnected: bool,
    fail_next_starts: usize,
    moves: Vec<ChannelRef>,
}

pub struct FakeTransport {
    inner: Mutex<TransportInner>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TransportInner {
                listeners_present: true,
                ..TransportInner::default()
            }),
        })
    }

    /// Makes the next `n` start calls fail as if the transport rejected
    /// the stream locator.
    pub fn fail_next_starts(&self, n: usize) {
        self.inner.lock().fail_next_starts = n;
    }

    pub fn set_listeners_present(&self, present: bool) {
        self.inner.lock().listeners_present = present;
    }

    /// Simulates the current stream finishing on its own and returns
    /// the token its completion notification would carry.
    pub fn end_playback(&self) -> CompletionToken {
        let mut inner = self.inner.lock();
        inner.playing = false;
        inner.paused = false;
        inner
            .started
            .last()
            .expect("no playback to end")
            .token
    }

    pub fn started(&self) -> Vec<StartedPlayback> {
        self.inner.lock().started.clone()
    }

    pub fn last_token(&self) -> CompletionToken {
        self.inner.lock().started.last().expect("nothing started").token
    }

    pub fn stop_calls(&self) -> usize {
        self.inner.lock().stop_calls
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    pub fn disconnected(&self) -> bool {
        self.inner.lock().disconnected
    }

    pub fn moves(&self) -> Vec<ChannelRef> {
        self.inner.lock().moves.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn start(
        &self,
        handle: StreamHandle,
        volume: f32,
        token: CompletionToken,
    ) -> std::result::Result<(), TransportStartError> {
        let mut inner = self.inner.lock();
        if inner.fail_next_starts > 0 {
            inner.fail_next_starts -= 1;
            return Err(TransportStartError("scripted start failure".into()));
        }
        inner.playing = true;
        inner.paused = false;
        inner.volume = volume;
        inner.started.push(StartedPlayback {
            handle,
            volume,
            token,
        });
        Ok(())
    }

    async fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.playing = false;
        inner.paused = false;
        inner.stop_calls += 1;
    }

    async fn pause(&self) {
        let mut inner = self.inner.lock();
        inner.playing = false;
        inner.paused = true;
    }

    async fn resume(&self) {
        let mut inner = self.inner.lock();
        inner.playing = true;
        inner.paused = false;
    }

    async fn move_to(&self, channel: ChannelRef) {
        self.inner.lock().moves.push(channel);
    }

    async fn set_volume(&self, volume: f32) {
        self.inner.lock().volume = volume;
    }

    async fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    async fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    async fn has_listeners(&self) -> bool {
        self.inner.lock().listeners_present
    }

    async fn disconnect(&self) {
        let mut inner = self.inner.lock();
        inner.disconnected = true;
        inner.playing = false;
        inner.paused = false;
    }
}

/// Hands out a fixed transport and counts connections.
pub struct FakeConnector {
    transport: Mutex<Arc<FakeTransport>>,
    connects: Mutex<usize>,
}

impl FakeConnector {
    pub fn new(transport: Arc<FakeTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport: Mutex::new(transport),
            connects: Mutex::new(0),
        })
    }

    /// The transport the next connect will hand out.
    pub fn set_transport(&self, transport: Arc<FakeTransport>) {
        *self.transport.lock() = transport;
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock()
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn connect(&self, _channel: ChannelRef) -> Result<Arc<dyn Transport>> {
        *self.connects.lock() += 1;
        let transport = self.transport.lock().clone();
        Ok(transport)
    }
}

/// Resolver that derives stream URLs from locators without any I/O.
pub struct EchoResolver;

#[async_trait]
impl Resolver for EchoResolver {
    async fn resolve(&self, query: &str) -> std::result::Result<Track, ResolveError> {
        Ok(Track::new(query, query))
    }

    async fn resolve_stream(
        &self,
        track: &Track,
    ) -> std::result::Result<StreamHandle, ResolveError> {
        Ok(StreamHandle::new(format!("stream://{}", track.locator())))
    }

    async fn resolve_playlist(
        &self,
        url: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Track>, ResolveError> {
        Ok((0..limit)
            .map(|n| Track::new(format!("{url}#{n}"), format!("Entry {n}")))
            .collect())
    }
}

pub fn track(n: usize) -> Track {
    Track::new(format!("https://example.com/watch?v={n}"), format!("Track {n}"))
        .with_duration_secs(180)
}

pub fn stream_url(n: usize) -> String {
    format!("stream://https://example.com/watch?v={n}")
}
