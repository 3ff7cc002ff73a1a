//! Live Event Feed
//!
//! Newest-first, hard-capped list of processed events. The first insertion
//! after a reset or a run start wipes whatever was shown before (the
//! placeholder or the previous run) exactly once.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::protocol::{Decision, ProcessedEvent};

/// One rendered feed row. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFeedEntry {
    /// Arrival sequence number, monotonically increasing per session
    pub seq: u64,
    pub received_at: DateTime<Utc>,
    pub actor_id: String,
    pub action: String,
    pub role: Option<String>,
    pub decision: Decision,
    pub risk_score: f64,
    pub risk_factors: Vec<String>,
    pub latency_ms: f64,
    pub explanation: Option<String>,
}

impl EventFeedEntry {
    pub fn from_processed(seq: u64, received_at: DateTime<Utc>, event: &ProcessedEvent) -> Self {
        Self {
            seq,
            received_at,
            actor_id: event.event.actor_id.clone(),
            action: event.event.action.clone(),
            role: event.event.role.clone(),
            decision: event.decision.decision,
            risk_score: event.signal.risk_score,
            risk_factors: event.signal.risk_factors.clone(),
            latency_ms: event.latency_ms,
            explanation: event.explanation.clone(),
        }
    }

    /// Risk score as a whole percentage, the way the feed shows it
    pub fn risk_percent(&self) -> u32 {
        (self.risk_score.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

/// Bounded, newest-first event list
#[derive(Debug, Clone)]
pub struct EventFeed {
    entries: VecDeque<Arc<EventFeedEntry>>,
    capacity: usize,
    awaiting_first: bool,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            awaiting_first: true,
        }
    }

    /// Prepend an entry, evicting from the tail beyond capacity
    pub fn insert(&mut self, entry: EventFeedEntry) -> Arc<EventFeedEntry> {
        if self.awaiting_first {
            self.entries.clear();
            self.awaiting_first = false;
        }

        let entry = Arc::new(entry);
        self.entries.push_front(entry.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        entry
    }

    /// Re-arm the one-shot first-event wipe without touching current rows
    pub fn arm_first_event(&mut self) {
        self.awaiting_first = true;
    }

    /// Drop every row and re-arm the first-event marker
    pub fn clear(&mut self) {
        self.entries.clear();
        self.awaiting_first = true;
    }

    pub fn is_awaiting_first(&self) -> bool {
        self.awaiting_first
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry
    pub fn head(&self) -> Option<&Arc<EventFeedEntry>> {
        self.entries.front()
    }

    /// Entries newest first
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EventFeedEntry>> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<Arc<EventFeedEntry>> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64) -> EventFeedEntry {
        EventFeedEntry {
            seq,
            received_at: Utc::now(),
            actor_id: format!("actor_{}", seq),
            action: "login".to_string(),
            role: None,
            decision: Decision::Allow,
            risk_score: 0.1,
            risk_factors: Vec::new(),
            latency_ms: 1.0,
            explanation: None,
        }
    }

    #[test]
    fn test_feed_caps_at_capacity_newest_first() {
        let mut feed = EventFeed::new(50);
        for seq in 1..=51 {
            feed.insert(entry(seq));
        }
        assert_eq!(feed.len(), 50);
        assert_eq!(feed.head().unwrap().seq, 51);
        assert!(feed.iter().all(|e| e.seq != 1));
        assert_eq!(feed.iter().last().unwrap().seq, 2);
    }

    #[test]
    fn test_first_event_wipes_previous_run_once() {
        let mut feed = EventFeed::new(50);
        feed.insert(entry(1));
        feed.insert(entry(2));

        feed.arm_first_event();
        assert_eq!(feed.len(), 2, "arming alone keeps rows visible");

        feed.insert(entry(3));
        assert_eq!(feed.len(), 1);
        feed.insert(entry(4));
        assert_eq!(feed.len(), 2);
        assert!(!feed.is_awaiting_first());
    }

    #[test]
    fn test_clear_rearms() {
        let mut feed = EventFeed::new(5);
        feed.insert(entry(1));
        feed.clear();
        assert!(feed.is_empty());
        assert!(feed.is_awaiting_first());
    }

    #[test]
    fn test_risk_percent_is_clamped() {
        let mut e = entry(1);
        e.risk_score = 0.876;
        assert_eq!(e.risk_percent(), 88);
        e.risk_score = 1.7;
        assert_eq!(e.risk_percent(), 100);
    }
}
