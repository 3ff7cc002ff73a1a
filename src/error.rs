//! Sync error types

use thiserror::Error;

/// Errors surfaced by the synchronization layer
#[derive(Error, Debug)]
pub enum SyncError {
    /// WebSocket protocol or stream error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Could not establish the duplex connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Base URL could not be turned into a transport address
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Export report could not be produced
    #[error("Export failed: {0}")]
    Export(String),

    /// Not connected
    #[error("Not connected to gatekeeper server")]
    NotConnected,

    /// Reconnection budget exhausted
    #[error("Reconnection abandoned after {0} attempts; reload required")]
    ReconnectExhausted(u32),
}

/// Sync result type
pub type Result<T> = std::result::Result<T, SyncError>;
