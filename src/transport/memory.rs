//! In-process transport
//!
//! Every successful `open` hands the far end of the link to whoever holds
//! the peer receiver, so tests can play the server.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::mpsc;

use super::{Connector, Link, TransportEvent};
use crate::error::{Result, SyncError};

/// Server end of an in-memory link
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Push a text frame to the client. False once the client side is gone.
    pub fn push(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(TransportEvent::Frame(frame.into())).is_ok()
    }

    pub fn close(&self) {
        let _ = self.to_client.send(TransportEvent::Closed);
    }

    /// Report an error without closing
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.to_client.send(TransportEvent::Error(reason.into()));
    }

    /// Next frame the client sent, `None` once the client dropped the link
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }
}

pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refusals: AtomicU32,
    attempts: AtomicU32,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers,
            refusals: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        };
        (connector, rx)
    }

    /// Fail the next `n` opens
    pub fn refuse_next(&self, n: u32) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    /// Fail every open from now on
    pub fn refuse_all(&self) {
        self.refusals.store(u32::MAX, Ordering::SeqCst);
    }

    /// Total `open` calls seen
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &Url) -> Result<Link> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                u32::MAX => Some(u32::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if refused {
            return Err(SyncError::Connection(format!("{} refused", url)));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.peers
            .send(MemoryPeer { to_client, from_client })
            .map_err(|_| SyncError::Connection("no peer listening".to_string()))?;

        Ok(Link { outbound, inbound })
    }
}
