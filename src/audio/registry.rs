use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::audio::session::SessionState;
use crate::SessionId;

/// One registry entry: the session's state behind its mutex.
pub struct Session {
    pub state: Mutex<SessionState>,
}

/// Process-wide map from session id to per-session state.
///
/// Entries are created lazily on first touch and only the reaper (or an
/// explicit disconnect) clears them. Insertion goes through the map's
/// entry API so two concurrent first touches still produce exactly one
/// entry.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    default_volume: f32,
    history_capacity: usize,
}

impl SessionRegistry {
    pub fn new(default_volume: f32, history_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            default_volume,
            history_capacity,
        }
    }

    /// Atomic get-or-create; the single initialization path for
    /// session state.
    pub fn get_or_create(&self, id: SessionId) -> Arc<Session> {
        self.sessions
            .entry(id)
            .or_insert_with(|| {
                Arc::new(Session {
                    state: Mutex::new(SessionState::new(
                        self.default_volume,
                        self.history_capacity,
                    )),
                })
            })
            .clone()
    }

    /// Lookup without creating; queries on unknown sessions stay
    /// side-effect free.
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| Arc::clone(s.value()))
    }

    /// Stable snapshot of all sessions for the reaper's sweep.
    pub fn snapshot(&self) -> Vec<(SessionId, Arc<Session>)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_returns_same_entry() {
        let registry = SessionRegistry::new(1.0, 50);
        let a = registry.get_or_create(SessionId(7));
        let b = registry.get_or_create(SessionId(7));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn get_does_not_create() {
        let registry = SessionRegistry::new(1.0, 50);
        assert!(registry.get(SessionId(1)).is_none());
        assert!(registry.is_empty());
    }
}
