//! Transport Module
//!
//! The duplex connection and its lifecycle. A [`Connector`] opens a raw
//! [`Link`]; the [`ConnectionManager`] keeps one alive with backoff.

mod backoff;
mod connection;
mod memory;
mod ws;

pub use backoff::ReconnectBackoff;
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStatus};
pub use memory::{MemoryConnector, MemoryPeer};
pub use ws::WsConnector;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::mpsc;

use crate::error::Result;

/// What the transport reports upward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A UTF-8 text frame, undecoded
    Frame(String),
    /// The transport hit an error; the link is unusable afterwards
    Error(String),
    /// The peer closed or the stream ended
    Closed,
}

/// An open duplex channel: text frames out, transport events in.
/// Dropping `outbound` closes the link.
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens links to a given endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Link>;
}
