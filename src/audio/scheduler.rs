use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::audio::registry::SessionRegistry;
use crate::audio::session::SessionState;
use crate::config::Config;
use crate::error::{PlayerError, ResolveError, Result};
use crate::sources::{Resolver, Track};
use crate::transport::{ChannelRef, CompletionToken, Transport, TransportConnector};
use crate::SessionId;

/// Entries exposed by the history query.
const HISTORY_VIEW_LIMIT: usize = 20;
/// Entries exposed by the top-played query.
const TOP_PLAYED_LIMIT: usize = 10;

/// The playback state machine. Owns one [`SessionState`] per active
/// session and serializes every mutation on it, whether triggered by a
/// user command or by a transport completion notification.
pub struct Scheduler {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn Resolver>,
    connector: Arc<dyn TransportConnector>,
    config: Arc<Config>,
}

impl Scheduler {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        connector: Arc<dyn TransportConnector>,
        config: Arc<Config>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            config.default_volume(),
            config.history_capacity,
        ));
        Self {
            registry,
            resolver,
            connector,
            config,
        }
    }

    /// Shared with the [`IdleReaper`](crate::IdleReaper), which sweeps
    /// the same sessions under the same locks.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Connects the session's transport to `channel`, creating the
    /// session on first touch. Already connected elsewhere, the
    /// transport follows the caller to the new channel; same channel is
    /// a no-op.
    pub async fn connect(&self, id: SessionId, channel: ChannelRef) -> Result<()> {
        let session = self.registry.get_or_create(id);
        let mut state = session.state.lock().await;

        match state.transport.clone() {
            None => {
                let transport = self.connector.connect(channel).await?;
                state.transport = Some(transport);
                state.channel = Some(channel);
                info!("🔌 session {} connected to channel {}", id, channel);
            }
            Some(transport) if state.channel != Some(channel) => {
                transport.move_to(channel).await;
                state.channel = Some(channel);
                info!("🔀 session {} moved to channel {}", id, channel);
            }
            Some(_) => {}
        }
        state.touch(Utc::now());

        Ok(())
    }

    /// Appends an already-resolved track to the session's queue and,
    /// when the transport sits idle, starts playing it immediately.
    ///
    /// Resolution happens before this call; a failed lookup never
    /// touches session state.
    pub async fn enqueue(&self, id: SessionId, track: Track) -> Result<()> {
        let session = self.registry.get_or_create(id);
        let mut state = session.state.lock().await;

        info!("➕ session {}: queued {}", id, track.title());
        state.queue.push_back(track);
        state.touch(Utc::now());

        self.advance_if_idle(id, &mut state).await
    }

    /// Playlist variant of [`enqueue`](Self::enqueue): appends all
    /// tracks, kicks playback once, returns how many were queued.
    pub async fn enqueue_many(&self, id: SessionId, tracks: Vec<Track>) -> Result<usize> {
        let queued = tracks.len();
        let session = self.registry.get_or_create(id);
        let mut state = session.state.lock().await;

        info!("➕ session {}: queued {} tracks", id, queued);
        state.queue.extend(tracks);
        state.touch(Utc::now());

        self.advance_if_idle(id, &mut state).await?;
        Ok(queued)
    }

    /// Skips the current track by stopping the transport and letting
    /// the resulting completion notification pick what plays next —
    /// the same path a naturally finished track takes.
    pub async fn skip(&self, id: SessionId) -> Result<()> {
        let session = self.registry.get(id).ok_or(PlayerError::NotConnected(id))?;
        let mut state = session.state.lock().await;
        let transport = required_transport(id, &state)?;

        if !transport.is_playing().await {
            return Err(PlayerError::InvalidState("nothing is playing"));
        }

        state.touch(Utc::now());
        info!("⏭️ session {}: skip", id);
        // Token deliberately untouched: the completion for the stopped
        // stream must still match and drive the advance.
        transport.stop().await;

        Ok(())
    }

    /// Stops playback and empties the queue. The completion
    /// notification of the stopped stream arrives with a stale
    /// generation and is discarded, so nothing gets replayed.
    pub async fn stop(&self, id: SessionId) -> Result<()> {
        let session = self.registry.get(id).ok_or(PlayerError::NotConnected(id))?;
        let mut state = session.state.lock().await;

        state.clear_playback();
        state.touch(Utc::now());
        info!("⏹️ session {}: stopped, queue cleared", id);

        if let Some(transport) = state.transport.clone() {
            if transport.is_playing().await || transport.is_paused().await {
                transport.stop().await;
            }
        }

        Ok(())
    }

    pub async fn pause(&self, id: SessionId) -> Result<()> {
        let session = self.registry.get(id).ok_or(PlayerError::NotConnected(id))?;
        let mut state = session.state.lock().await;
        let transport = required_transport(id, &state)?;

        if !transport.is_playing().await {
            return Err(PlayerError::InvalidState("nothing is playing"));
        }

        state.touch(Utc::now());
        transport.pause().await;
        info!("⏸️ session {}: paused", id);

        Ok(())
    }

    pub async fn resume(&self, id: SessionId) -> Result<()> {
        let session = self.registry.get(id).ok_or(PlayerError::NotConnected(id))?;
        let mut state = session.state.lock().await;
        let transport = required_transport(id, &state)?;

        if !transport.is_paused().await {
            return Err(PlayerError::InvalidState("nothing is paused"));
        }

        state.touch(Utc::now());
        transport.resume().await;
        info!("▶️ session {}: resumed", id);

        Ok(())
    }

    /// Flips single-track looping. Takes effect on the next advance
    /// decision, never retroactively.
    pub async fn set_loop(&self, id: SessionId, enabled: bool) -> Result<()> {
        let session = self.registry.get(id).ok_or(PlayerError::NotConnected(id))?;
        let mut state = session.state.lock().await;

        state.loop_enabled = enabled;
        state.touch(Utc::now());
        info!(
            "🔂 session {}: loop {}",
            id,
            if enabled { "enabled" } else { "disabled" }
        );

        Ok(())
    }

    /// Sets the session volume from a percentage. Values above the
    /// configured bound are rejected; a live track picks the new
    /// volume up without restarting.
    pub async fn set_volume(&self, id: SessionId, percent: u16) -> Result<()> {
        if percent > self.config.max_volume_percent {
            return Err(PlayerError::VolumeOutOfRange(percent));
        }

        let session = self.registry.get(id).ok_or(PlayerError::NotConnected(id))?;
        let mut state = session.state.lock().await;

        state.volume = (f32::from(percent) / 100.0).clamp(0.0, 2.0);
        state.touch(Utc::now());
        info!("🔊 session {}: volume {}%", id, percent);

        // Paused streams are still in flight and must pick the change
        // up before resume.
        if let Some(transport) = state.transport.clone() {
            if transport.is_playing().await || transport.is_paused().await {
                transport.set_volume(state.volume).await;
            }
        }

        Ok(())
    }

    /// Hand-off point for the transport's completion callback. Safe to
    /// call from any task; stale tokens are discarded, a live token
    /// drives the advance to the next track.
    pub async fn notify_playback_ended(&self, token: CompletionToken) {
        let Some(session) = self.registry.get(token.session) else {
            debug!("🗑️ completion for unknown session {}", token.session);
            return;
        };
        let mut state = session.state.lock().await;

        if token.generation != state.active_stream_token {
            debug!(
                "🗑️ session {}: stale completion (gen {} != {})",
                token.session, token.generation, state.active_stream_token
            );
            return;
        }

        if let Err(e) = self.advance_locked(token.session, &mut state).await {
            error!("❌ session {}: advance failed: {e}", token.session);
        }
    }

    /// Explicit leave: tears the transport down and clears playback
    /// state, same as a reap.
    pub async fn disconnect(&self, id: SessionId) -> Result<()> {
        let session = self.registry.get(id).ok_or(PlayerError::NotConnected(id))?;
        let mut state = session.state.lock().await;
        let transport = state.transport.take().ok_or(PlayerError::NotConnected(id))?;

        state.channel = None;
        state.clear_playback();
        info!("👋 session {}: disconnected", id);

        if tokio::time::timeout(self.config.disconnect_timeout(), transport.disconnect())
            .await
            .is_err()
        {
            warn!("⚠️ session {}: disconnect timed out, state cleared anyway", id);
        }

        Ok(())
    }

    // ----- queries ------------------------------------------------------

    pub async fn queue_snapshot(&self, id: SessionId) -> Vec<Track> {
        match self.registry.get(id) {
            Some(session) => session.state.lock().await.queue.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn now_playing(&self, id: SessionId) -> Option<Track> {
        let session = self.registry.get(id)?;
        let state = session.state.lock().await;
        state.now_playing.clone()
    }

    /// The most recent plays, oldest first.
    pub async fn history(&self, id: SessionId) -> Vec<Track> {
        match self.registry.get(id) {
            Some(session) => session
                .state
                .lock()
                .await
                .recent_history(HISTORY_VIEW_LIMIT),
            None => Vec::new(),
        }
    }

    /// Most-played titles with their counts, descending.
    pub async fn top_played(&self, id: SessionId) -> Vec<(String, u64)> {
        match self.registry.get(id) {
            Some(session) => session.state.lock().await.top_played(TOP_PLAYED_LIMIT),
            None => Vec::new(),
        }
    }

    /// Elapsed-time estimate for the current track, clamped to its
    /// duration when known. An estimate only; the transport is the
    /// authority on actual position.
    pub async fn elapsed(&self, id: SessionId) -> Option<Duration> {
        let session = self.registry.get(id)?;
        let state = session.state.lock().await;
        let started = state.playback_started_at?;
        let track = state.now_playing.as_ref()?;

        let mut secs = (Utc::now() - started).num_seconds().max(0) as u64;
        if track.duration_secs() > 0 {
            secs = secs.min(track.duration_secs());
        }
        Some(Duration::from_secs(secs))
    }

    pub async fn is_playing(&self, id: SessionId) -> bool {
        match self.transport_of(id).await {
            Some(transport) => transport.is_playing().await,
            None => false,
        }
    }

    pub async fn is_paused(&self, id: SessionId) -> bool {
        match self.transport_of(id).await {
            Some(transport) => transport.is_paused().await,
            None => false,
        }
    }

    pub async fn volume_percent(&self, id: SessionId) -> u16 {
        match self.registry.get(id) {
            Some(session) => {
                let state = session.state.lock().await;
                (state.volume * 100.0).round() as u16
            }
            None => self.config.default_volume_percent,
        }
    }

    // ----- internals ----------------------------------------------------

    async fn transport_of(&self, id: SessionId) -> Option<Arc<dyn Transport>> {
        let session = self.registry.get(id)?;
        let state = session.state.lock().await;
        state.transport.clone()
    }

    /// Runs the advance when the transport sits idle, the condition
    /// under which a fresh enqueue starts playback itself.
    async fn advance_if_idle(&self, id: SessionId, state: &mut SessionState) -> Result<()> {
        let Some(transport) = state.transport.clone() else {
            debug!("session {}: queued without transport, waiting for connect", id);
            return Ok(());
        };
        if transport.is_playing().await || transport.is_paused().await {
            return Ok(());
        }
        self.advance_locked(id, state).await
    }

    /// The advance decision, run under the session lock:
    ///
    /// 1. loop enabled and a current track → replay it;
    /// 2. otherwise pop the queue head and record the play;
    /// 3. otherwise go idle.
    ///
    /// A track whose stream cannot be resolved or that the transport
    /// rejects is never retried in place; the loop moves on to the next
    /// queued item, bounded by the consecutive-failure limit.
    async fn advance_locked(&self, id: SessionId, state: &mut SessionState) -> Result<()> {
        loop {
            let next = match (state.loop_enabled, state.now_playing.clone()) {
                (true, Some(current)) => {
                    debug!("🔂 session {}: looping {}", id, current.title());
                    if self.config.count_loop_replays {
                        state.record_play(&current);
                    }
                    current
                }
                _ => match state.queue.pop_front() {
                    Some(track) => {
                        state.record_play(&track);
                        state.now_playing = Some(track.clone());
                        track
                    }
                    None => {
                        state.now_playing = None;
                        state.playback_started_at = None;
                        debug!("📭 session {}: queue empty, going idle", id);
                        return Ok(());
                    }
                },
            };

            // The reaper can detach the transport between the
            // completion firing and this lock being taken.
            let Some(transport) = state.transport.clone() else {
                state.now_playing = None;
                state.playback_started_at = None;
                return Ok(());
            };

            let token = CompletionToken {
                session: id,
                generation: state.bump_token(),
            };

            match self.start_playback(&transport, &next, state.volume, token).await {
                Ok(()) => {
                    let now = Utc::now();
                    state.playback_started_at = Some(now);
                    state.touch(now);
                    state.consecutive_start_failures = 0;
                    info!("🎵 session {}: now playing {}", id, next.title());
                    return Ok(());
                }
                Err(e) => {
                    warn!("⚠️ session {}: failed to start {}: {e}", id, next.title());
                    // Drop the failed track so a loop flag cannot pin
                    // it; the next iteration pops the following item.
                    state.now_playing = None;
                    state.playback_started_at = None;
                    state.consecutive_start_failures += 1;

                    if state.consecutive_start_failures >= self.config.max_consecutive_failures {
                        error!(
                            "❌ session {}: {} consecutive start failures, giving up",
                            id, state.consecutive_start_failures
                        );
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn start_playback(
        &self,
        transport: &Arc<dyn Transport>,
        track: &Track,
        volume: f32,
        token: CompletionToken,
    ) -> Result<()> {
        let handle = tokio::time::timeout(
            self.config.resolve_timeout(),
            self.resolver.resolve_stream(track),
        )
        .await
        .map_err(|_| ResolveError::Timeout)??;

        transport.start(handle, volume, token).await?;
        Ok(())
    }
}

impl Clone for Scheduler {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
            connector: self.connector.clone(),
            config: self.config.clone(),
        }
    }
}

fn required_transport(id: SessionId, state: &SessionState) -> Result<Arc<dyn Transport>> {
    state
        .transport
        .clone()
        .ok_or(PlayerError::NotConnected(id))
}
