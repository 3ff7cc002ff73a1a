//! Toast Notification Queue
//!
//! At most [`TOAST_CAPACITY`](crate::config::TOAST_CAPACITY) toasts are
//! visible. Overflow evicts the oldest immediately; independently, every
//! toast disappears once its own duration has elapsed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn default_duration(self) -> Duration {
        match self {
            Severity::Info => Duration::from_millis(4000),
            Severity::Success => Duration::from_millis(5000),
            Severity::Warning => Duration::from_millis(6000),
            Severity::Error => Duration::from_millis(8000),
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Success => "✅",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
        }
    }
}

/// A transient notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToastEntry {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
}

impl ToastEntry {
    /// Toast with the severity's default lifetime
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            duration: severity.default_duration(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// A toast as held by the queue, stamped with its own deadline
#[derive(Debug, Clone)]
pub struct QueuedToast {
    pub id: Uuid,
    pub entry: ToastEntry,
    pub expires_at: Instant,
}

impl QueuedToast {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct ToastQueue {
    items: VecDeque<QueuedToast>,
    capacity: usize,
}

impl ToastQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a toast; evicts the oldest at once when over capacity
    pub fn push(&mut self, entry: ToastEntry, now: Instant) -> Uuid {
        let id = Uuid::new_v4();
        let expires_at = now + entry.duration;
        self.items.push_back(QueuedToast { id, entry, expires_at });

        while self.items.len() > self.capacity {
            if let Some(evicted) = self.items.pop_front() {
                debug!("Toast evicted before expiry: {}", evicted.entry.title);
            }
        }
        id
    }

    /// Remove every toast whose own deadline has passed. Returns how many went.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.items.len();
        self.items.retain(|t| !t.is_expired(now));
        before - self.items.len()
    }

    /// Manual dismissal
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|t| t.id != id);
        before != self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest first, expired ones filtered out
    pub fn visible(&self, now: Instant) -> Vec<QueuedToast> {
        self.items.iter().filter(|t| !t.is_expired(now)).cloned().collect()
    }
}
