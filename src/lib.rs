//! AI Risk Gatekeeper Sync
//!
//! Client-side real-time synchronization layer for the gatekeeper dashboard:
//! - WebSocket connection with exponential-backoff reconnection
//! - Typed dispatch of server push messages
//! - Delta-based state reconciliation with throttled block alerts
//! - Bounded event feed, toast queue and section badges

pub mod alert;
pub mod buffers;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use session::{SyncHandle, SyncSession};
pub use state::{Dashboard, DashboardView};
pub use transport::{ConnectionManager, ConnectionState, WsConnector};
