use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::sources::Track;
use crate::transport::{ChannelRef, Transport};

/// Play tally for one title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayCount {
    pub count: u64,
    /// Per-session sequence number of the first play; the stable
    /// tie-break when counts are equal.
    pub first_seen: u64,
}

/// All mutable state for one session, guarded by a single
/// `tokio::sync::Mutex` in the registry. Every mutation, whether from
/// a user command, a completion notification or the reaper, goes
/// through that lock.
pub struct SessionState {
    pub queue: VecDeque<Track>,
    pub now_playing: Option<Track>,
    pub loop_enabled: bool,
    pub volume: f32,
    pub playback_started_at: Option<DateTime<Utc>>,
    pub last_active_at: DateTime<Utc>,
    history: VecDeque<Track>,
    history_capacity: usize,
    play_counts: HashMap<String, PlayCount>,
    play_seq: u64,
    /// Generation counter bumped on every start and stop; completions
    /// carrying an older generation are stale and discarded.
    pub active_stream_token: u64,
    pub consecutive_start_failures: u32,
    /// Present once the session is connected. Guarded by the same lock
    /// as the rest of the state so teardown cannot race playback.
    pub transport: Option<Arc<dyn Transport>>,
    /// Channel the transport currently sits in; a connect to a
    /// different channel moves it.
    pub channel: Option<ChannelRef>,
}

impl SessionState {
    pub fn new(default_volume: f32, history_capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            now_playing: None,
            loop_enabled: false,
            volume: default_volume.clamp(0.0, 2.0),
            playback_started_at: None,
            last_active_at: Utc::now(),
            history: VecDeque::new(),
            history_capacity,
            play_counts: HashMap::new(),
            play_seq: 0,
            active_stream_token: 0,
            consecutive_start_failures: 0,
            transport: None,
            channel: None,
        }
    }

    /// Marks user or playback activity; the reaper measures idleness
    /// from this.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active_at = now;
    }

    /// Invalidates any in-flight completion and returns the generation
    /// the next playback should carry.
    pub fn bump_token(&mut self) -> u64 {
        self.active_stream_token += 1;
        self.active_stream_token
    }

    /// Records a fresh play: history append with oldest-first eviction
    /// and a play-count bump. Loop replays skip this unless configured
    /// otherwise.
    pub fn record_play(&mut self, track: &Track) {
        self.history.push_back(track.clone());
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
        }

        self.play_seq += 1;
        let seq = self.play_seq;
        self.play_counts
            .entry(track.title().to_string())
            .and_modify(|c| c.count += 1)
            .or_insert(PlayCount {
                count: 1,
                first_seen: seq,
            });
    }

    /// The most recent `limit` plays, oldest first.
    pub fn recent_history(&self, limit: usize) -> Vec<Track> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Top `limit` titles by descending play count, ties broken by
    /// first-seen order.
    pub fn top_played(&self, limit: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(&String, &PlayCount)> = self.play_counts.iter().collect();
        entries.sort_by_key(|(_, c)| (std::cmp::Reverse(c.count), c.first_seen));
        entries
            .into_iter()
            .take(limit)
            .map(|(title, c)| (title.clone(), c.count))
            .collect()
    }

    /// Stop/reap teardown: empties the queue, drops the current track,
    /// disables looping, clears timestamps and invalidates pending
    /// completions. Play counts survive; they are never reset.
    pub fn clear_playback(&mut self) {
        self.queue.clear();
        self.now_playing = None;
        self.loop_enabled = false;
        self.playback_started_at = None;
        self.consecutive_start_failures = 0;
        self.bump_token();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state() -> SessionState {
        SessionState::new(1.0, 50)
    }

    fn track(n: usize) -> Track {
        Track::new(format!("https://example.com/{n}"), format!("Track {n}"))
    }

    #[test]
    fn history_is_bounded_at_capacity() {
        let mut s = state();
        for n in 0..60 {
            s.record_play(&track(n));
        }

        assert_eq!(s.recent_history(usize::MAX).len(), 50);

        // The limited view is the most recent 20 in play order.
        let last_20 = s.recent_history(20);
        assert_eq!(last_20.len(), 20);
        assert_eq!(last_20.first().unwrap().title(), "Track 40");
        assert_eq!(last_20.last().unwrap().title(), "Track 59");
    }

    #[test]
    fn top_played_sorts_by_count_then_first_seen() {
        let mut s = state();
        // A seen first, then B, then C; C ties with A on count.
        for _ in 0..3 {
            s.record_play(&track(1));
        }
        s.record_play(&track(2));
        for _ in 0..3 {
            s.record_play(&track(3));
        }

        let top = s.top_played(10);
        assert_eq!(
            top,
            vec![
                ("Track 1".to_string(), 3),
                ("Track 3".to_string(), 3),
                ("Track 2".to_string(), 1),
            ]
        );
    }

    #[test]
    fn top_played_respects_limit() {
        let mut s = state();
        for n in 0..15 {
            s.record_play(&track(n));
        }
        assert_eq!(s.top_played(10).len(), 10);
    }

    #[test]
    fn clear_playback_invalidates_token_but_keeps_counts() {
        let mut s = state();
        s.queue.push_back(track(1));
        s.now_playing = Some(track(2));
        s.loop_enabled = true;
        s.record_play(&track(2));
        let old_token = s.active_stream_token;

        s.clear_playback();

        assert!(s.queue.is_empty());
        assert_eq!(s.now_playing, None);
        assert!(!s.loop_enabled);
        assert!(s.active_stream_token > old_token);
        assert_eq!(s.top_played(10), vec![("Track 2".to_string(), 1)]);
    }
}
