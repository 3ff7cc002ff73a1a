//! Connection Manager
//!
//! Owns the duplex link on a dedicated actor task. Frames and status changes
//! flow out over one ordered channel; outbound frames flow in over another
//! and are only transmitted while the link is open.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Connector, Link, ReconnectBackoff, TransportEvent};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::protocol::OutboundAction;

// ──────────────────────────────────────────────────────────────────────────────
// STATUS
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
    /// Reconnection budget spent; only a fresh `connect()` revives it
    Failed,
}

/// Snapshot behind the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Reconnection attempts scheduled since the last successful open
    pub attempt: u32,
    /// Delay until the pending reconnection, if one is scheduled
    pub next_retry: Option<Duration>,
}

impl ConnectionStatus {
    fn new(state: ConnectionState, attempt: u32, next_retry: Option<Duration>) -> Self {
        Self { state, attempt, next_retry }
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new(ConnectionState::Closed, 0, None)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.state, self.next_retry) {
            (ConnectionState::Open, _) => f.write_str("🟢 Connected"),
            (ConnectionState::Connecting, _) => f.write_str("🟡 Connecting..."),
            (ConnectionState::Failed, _) => f.write_str("🔴 Connection failed, reload required"),
            (_, Some(delay)) => write!(
                f,
                "🟠 Reconnecting in {:.1}s (attempt {})",
                delay.as_secs_f64(),
                self.attempt
            ),
            (ConnectionState::Errored, None) => f.write_str("🔴 Connection error"),
            (ConnectionState::Closed, None) => f.write_str("⚪ Disconnected"),
        }
    }
}

/// What the manager reports to its consumer, in transport order
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Frame(String),
    Status(ConnectionStatus),
}

type Emit = Arc<dyn Fn(ConnectionEvent) -> bool + Send + Sync>;

// ──────────────────────────────────────────────────────────────────────────────
// MANAGER
// ──────────────────────────────────────────────────────────────────────────────

pub struct ConnectionManager {
    url: Url,
    connector: Arc<dyn Connector>,
    backoff: ReconnectBackoff,
    emit: Emit,
    status: Arc<watch::Sender<ConnectionStatus>>,
    requests_tx: mpsc::UnboundedSender<String>,
    requests_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Build a manager that reports into `events`. Anything convertible from
    /// a [`ConnectionEvent`] can be the channel's item type.
    pub fn new<T>(
        config: &SyncConfig,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<T>,
    ) -> Result<Self>
    where
        T: From<ConnectionEvent> + Send + 'static,
    {
        let url = config.ws_url()?;
        let backoff = ReconnectBackoff::new(
            config.reconnect_base,
            config.reconnect_max,
            config.max_reconnect_attempts,
        );
        let emit: Emit = Arc::new(move |event| events.send(T::from(event)).is_ok());
        let (status, _) = watch::channel(ConnectionStatus::default());
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        Ok(Self {
            url,
            connector,
            backoff,
            emit,
            status: Arc::new(status),
            requests_tx,
            requests_rx: Arc::new(Mutex::new(requests_rx)),
            task: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Start the connection actor. A no-op while `Open` or `Connecting`.
    /// From any other state the current actor, including one sleeping out
    /// a backoff, is replaced by a fresh one with a full budget.
    pub async fn connect(&self) {
        let mut task = self.task.lock().await;
        let live = matches!(
            self.status.borrow().state,
            ConnectionState::Open | ConnectionState::Connecting
        );
        if live && task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("connect() ignored: link already open or connecting");
            return;
        }
        if let Some(previous) = task.take() {
            previous.abort();
            let _ = previous.await;
        }

        let actor = Actor {
            url: self.url.clone(),
            connector: self.connector.clone(),
            backoff: self.backoff.clone(),
            emit: self.emit.clone(),
            status: self.status.clone(),
            requests: self.requests_rx.clone(),
        };
        *task = Some(tokio::spawn(actor.run()));
    }

    /// Transmit `action` if the link is open; otherwise drop it.
    /// Nothing is queued for later delivery.
    pub fn send(&self, action: &OutboundAction) -> bool {
        if !self.status.borrow().is_open() {
            debug!("Dropping {}: connection not open", action.name());
            return false;
        }

        let frame = match action.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Could not encode {}: {}", action.name(), e);
                return false;
            }
        };
        self.requests_tx.send(frame).is_ok()
    }

    /// Tear the link down and stop reconnecting
    pub async fn disconnect(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        let status = ConnectionStatus::default();
        self.status.send_replace(status);
        (self.emit)(ConnectionEvent::Status(status));
        info!("🔌 Disconnected from {}", self.url);
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Live status signal
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// ACTOR
// ──────────────────────────────────────────────────────────────────────────────

enum LinkEnd {
    Closed,
    Errored,
    ConsumerGone,
}

struct Actor {
    url: Url,
    connector: Arc<dyn Connector>,
    backoff: ReconnectBackoff,
    emit: Emit,
    status: Arc<watch::Sender<ConnectionStatus>>,
    requests: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl Actor {
    async fn run(mut self) {
        let requests = self.requests.clone();
        let mut requests = requests.lock().await;
        // Frames queued while nobody was connected are stale
        while requests.try_recv().is_ok() {}

        loop {
            if !self.publish(ConnectionState::Connecting, None) {
                return;
            }

            let opened = self.connector.open(&self.url).await;
            let ended = match opened {
                Ok(link) => {
                    self.backoff.reset();
                    info!("✅ Connected to {}", self.url);
                    if !self.publish(ConnectionState::Open, None) {
                        return;
                    }
                    self.pump(link, &mut requests).await
                }
                Err(e) => {
                    warn!("Connection to {} failed: {}", self.url, e);
                    LinkEnd::Errored
                }
            };

            let state = match ended {
                LinkEnd::ConsumerGone => {
                    debug!("Event consumer dropped, stopping connection actor");
                    return;
                }
                LinkEnd::Closed => ConnectionState::Closed,
                LinkEnd::Errored => ConnectionState::Errored,
            };

            let Some(delay) = self.backoff.next_delay() else {
                error!("❌ {}: {}", self.url, SyncError::ReconnectExhausted(self.backoff.max_attempts()));
                self.publish(ConnectionState::Failed, None);
                return;
            };

            info!("Reconnecting to {} in {:?} (attempt {})", self.url, delay, self.backoff.attempt());
            if !self.publish(state, Some(delay)) {
                return;
            }
            Self::wait(delay, &mut requests).await;
        }
    }

    /// Shuttle frames both ways until the link ends
    async fn pump(&self, mut link: Link, requests: &mut mpsc::UnboundedReceiver<String>) -> LinkEnd {
        loop {
            tokio::select! {
                event = link.inbound.recv() => match event {
                    Some(TransportEvent::Frame(text)) => {
                        if !(self.emit)(ConnectionEvent::Frame(text)) {
                            return LinkEnd::ConsumerGone;
                        }
                    }
                    Some(TransportEvent::Error(reason)) => {
                        warn!("Transport error on {}: {}", self.url, reason);
                        return LinkEnd::Errored;
                    }
                    Some(TransportEvent::Closed) | None => {
                        info!("Connection to {} closed", self.url);
                        return LinkEnd::Closed;
                    }
                },
                Some(frame) = requests.recv() => {
                    if link.outbound.send(frame).is_err() {
                        return LinkEnd::Closed;
                    }
                }
            }
        }
    }

    /// Sleep out the backoff, discarding anything sent meanwhile
    async fn wait(delay: Duration, requests: &mut mpsc::UnboundedReceiver<String>) {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return,
                Some(_) = requests.recv() => debug!("Dropped outbound frame while disconnected"),
            }
        }
    }

    fn publish(&self, state: ConnectionState, next_retry: Option<Duration>) -> bool {
        let status = ConnectionStatus::new(state, self.backoff.attempt(), next_retry);
        self.status.send_replace(status);
        (self.emit)(ConnectionEvent::Status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryConnector;
    use tokio::time::timeout;

    fn fast_config(attempts: u32) -> SyncConfig {
        SyncConfig {
            reconnect_base: Duration::from_millis(5),
            reconnect_max: Duration::from_millis(20),
            max_reconnect_attempts: attempts,
            ..SyncConfig::default()
        }
    }

    async fn next_state(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>, wanted: ConnectionState) -> ConnectionStatus {
        timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Some(ConnectionEvent::Status(status)) if status.state == wanted => return status,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("state not reached in time")
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::default().to_string(), "⚪ Disconnected");
        let retry = ConnectionStatus::new(ConnectionState::Closed, 3, Some(Duration::from_millis(4000)));
        assert_eq!(retry.to_string(), "🟠 Reconnecting in 4.0s (attempt 3)");
    }

    #[tokio::test]
    async fn test_frames_flow_and_send_reaches_peer() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let manager = ConnectionManager::new(&fast_config(3), Arc::new(connector), tx).unwrap();

        assert!(!manager.send(&OutboundAction::ResetMetrics));
        manager.connect().await;
        let mut peer = peers.recv().await.unwrap();
        next_state(&mut rx, ConnectionState::Open).await;

        peer.push(r#"{"type":"metrics_reset"}"#);
        match timeout(Duration::from_secs(1), rx.recv()).await.unwrap() {
            Some(ConnectionEvent::Frame(text)) => assert!(text.contains("metrics_reset")),
            other => panic!("expected frame, got {:?}", other),
        }

        assert!(manager.send(&OutboundAction::StopSimulation));
        let sent = timeout(Duration::from_secs(1), peer.recv()).await.unwrap().unwrap();
        assert_eq!(sent, r#"{"action":"stop_simulation"}"#);
    }

    #[tokio::test]
    async fn test_close_schedules_reconnect_and_open_resets_attempts() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let manager = ConnectionManager::new(&fast_config(5), Arc::new(connector), tx).unwrap();

        manager.connect().await;
        let first = peers.recv().await.unwrap();
        next_state(&mut rx, ConnectionState::Open).await;

        first.close();
        let closed = next_state(&mut rx, ConnectionState::Closed).await;
        assert_eq!(closed.attempt, 1);
        assert_eq!(closed.next_retry, Some(Duration::from_millis(5)));

        let _second = peers.recv().await.unwrap();
        let open = next_state(&mut rx, ConnectionState::Open).await;
        assert_eq!(open.attempt, 0);
    }

    #[tokio::test]
    async fn test_error_without_close_still_reconnects() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let manager = ConnectionManager::new(&fast_config(5), Arc::new(connector), tx).unwrap();

        manager.connect().await;
        let first = peers.recv().await.unwrap();
        next_state(&mut rx, ConnectionState::Open).await;

        first.fail("broken pipe");
        let errored = next_state(&mut rx, ConnectionState::Errored).await;
        assert!(errored.next_retry.is_some());
        assert!(timeout(Duration::from_secs(1), peers.recv()).await.unwrap().is_some());
        next_state(&mut rx, ConnectionState::Open).await;
    }

    #[tokio::test]
    async fn test_budget_exhaustion_fails_and_connect_revives() {
        let (connector, mut peers) = MemoryConnector::new();
        let connector = Arc::new(connector);
        connector.refuse_all();
        let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let manager = ConnectionManager::new(&fast_config(3), connector.clone(), tx).unwrap();

        manager.connect().await;
        let failed = next_state(&mut rx, ConnectionState::Failed).await;
        assert_eq!(failed.attempt, 3);
        // initial try + three scheduled retries
        assert_eq!(connector.attempts(), 4);
        assert_eq!(manager.status().state, ConnectionState::Failed);

        connector.refuse_next(0);
        manager.connect().await;
        assert!(timeout(Duration::from_secs(1), peers.recv()).await.unwrap().is_some());
        next_state(&mut rx, ConnectionState::Open).await;
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_while_running() {
        let (connector, mut peers) = MemoryConnector::new();
        let connector = Arc::new(connector);
        let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let manager = ConnectionManager::new(&fast_config(3), connector.clone(), tx).unwrap();

        manager.connect().await;
        let _peer = peers.recv().await.unwrap();
        next_state(&mut rx, ConnectionState::Open).await;
        manager.connect().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connector.attempts(), 1);

        manager.disconnect().await;
        assert_eq!(manager.status().state, ConnectionState::Closed);
        assert!(!manager.send(&OutboundAction::ResetMetrics));
    }

    #[tokio::test]
    async fn test_connect_during_backoff_retries_immediately() {
        let (connector, mut peers) = MemoryConnector::new();
        let connector = Arc::new(connector);
        connector.refuse_next(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let config = SyncConfig {
            reconnect_base: Duration::from_secs(30),
            reconnect_max: Duration::from_secs(30),
            ..SyncConfig::default()
        };
        let manager = ConnectionManager::new(&config, connector.clone(), tx).unwrap();

        manager.connect().await;
        let errored = next_state(&mut rx, ConnectionState::Errored).await;
        assert_eq!(errored.next_retry, Some(Duration::from_secs(30)));
        assert_eq!(connector.attempts(), 1);

        manager.connect().await;
        assert!(timeout(Duration::from_secs(1), peers.recv()).await.unwrap().is_some());
        let open = next_state(&mut rx, ConnectionState::Open).await;
        assert_eq!(open.attempt, 0);
        assert_eq!(connector.attempts(), 2);
    }
}
