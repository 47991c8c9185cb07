use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::audio::registry::SessionRegistry;
use crate::config::Config;

/// Background loop that disconnects transports nobody is using.
///
/// A session qualifies for reaping when it has been idle longer than
/// the configured threshold and either no non-automated listener
/// remains in the channel, or nothing is playing and the queue is
/// empty. Sweeps serialize through the same per-session mutex as user
/// commands, so a reap cannot race a concurrent enqueue or advance.
pub struct IdleReaper {
    registry: Arc<SessionRegistry>,
    config: Arc<Config>,
}

impl IdleReaper {
    pub fn new(registry: Arc<SessionRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }

    /// Runs forever on the configured poll interval. Spawn it as its
    /// own task.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.reaper_interval());
        info!(
            "💤 idle reaper running every {}s, threshold {}s",
            self.config.reaper_interval_secs, self.config.idle_threshold_secs
        );
        loop {
            ticker.tick().await;
            self.sweep(Utc::now()).await;
        }
    }

    /// One reaping pass over all known sessions. Takes `now`
    /// explicitly so idle durations can be checked against simulated
    /// clocks.
    pub async fn sweep(&self, now: DateTime<Utc>) {
        for (id, session) in self.registry.snapshot() {
            let mut state = session.state.lock().await;

            let Some(transport) = state.transport.clone() else {
                continue;
            };

            let idle_secs = (now - state.last_active_at).num_seconds();
            if idle_secs <= self.config.idle_threshold_secs as i64 {
                continue;
            }

            let abandoned = !transport.has_listeners().await;
            let drained = !transport.is_playing().await && state.queue.is_empty();
            if !(abandoned || drained) {
                debug!("session {} idle {}s but still in use", id, idle_secs);
                continue;
            }

            info!("💤 reaping session {} after {}s idle", id, idle_secs);
            state.transport = None;
            state.channel = None;
            state.clear_playback();

            // Bounded: on expiry the connection is assumed gone and the
            // state stays cleared either way.
            if tokio::time::timeout(self.config.disconnect_timeout(), transport.disconnect())
                .await
                .is_err()
            {
                warn!("⚠️ session {}: reap disconnect timed out", id);
            }
        }
    }
}
