//! Bounded Presentation Buffers
//!
//! Fixed-capacity collections feeding the renderers: the event feed, the
//! toast queue and the per-section badges.

mod badge;
mod feed;
mod toast;

pub use badge::{BadgeBoard, Section};
pub use feed::{EventFeed, EventFeedEntry};
pub use toast::{QueuedToast, Severity, ToastEntry, ToastQueue};
