//! Sync Session
//!
//! Runtime wiring. One task owns the [`Dashboard`] and the [`Dispatcher`]
//! and consumes a single ordered input channel: server frames, connection
//! status changes and local commands. Renderers only ever see published
//! [`DashboardView`] snapshots.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::alert::{AlertSink, PreferenceSource};
use crate::buffers::{Section, ToastEntry};
use crate::config::SyncConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::Result;
use crate::protocol::OutboundAction;
use crate::state::{Dashboard, DashboardView};
use crate::transport::{ConnectionEvent, ConnectionManager, ConnectionStatus, Connector};

/// How often expired toasts are swept
const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Navigate(Section),
    Notify(ToastEntry),
    LockControls,
    UnlockControls,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum SessionInput {
    Frame(String),
    Status(ConnectionStatus),
    Command(SessionCommand),
}

impl From<ConnectionEvent> for SessionInput {
    fn from(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Frame(raw) => SessionInput::Frame(raw),
            ConnectionEvent::Status(status) => SessionInput::Status(status),
        }
    }
}

pub struct SyncSession {
    dashboard: Dashboard,
    dispatcher: Dispatcher,
    inputs: mpsc::UnboundedReceiver<SessionInput>,
    views: watch::Sender<Arc<DashboardView>>,
}

impl SyncSession {
    /// Spawn the session task and hand back its façade. The connection is
    /// not opened until [`SyncHandle::connect`] is called.
    pub fn start(
        config: &SyncConfig,
        connector: Arc<dyn Connector>,
        prefs: Arc<dyn PreferenceSource>,
        sink: Arc<dyn AlertSink>,
    ) -> Result<SyncHandle> {
        let (input_tx, input_rx) = mpsc::unbounded_channel::<SessionInput>();
        let connection = Arc::new(ConnectionManager::new(config, connector, input_tx.clone())?);

        let dashboard = Dashboard::new(config.alert_interval, prefs, sink);
        let dispatcher = Dispatcher::new();
        let (views, view_rx) = watch::channel(Arc::new(dashboard.view(dispatcher.stats())));

        let session = SyncSession {
            dashboard,
            dispatcher,
            inputs: input_rx,
            views,
        };
        let task = tokio::spawn(session.run());
        info!("📡 Sync session started for {}", connection.url());

        Ok(SyncHandle {
            inputs: input_tx,
            views: view_rx,
            connection,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                input = self.inputs.recv() => {
                    let Some(input) = input else { break };
                    if !self.apply(input) {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.dashboard.tick(Instant::now()) == 0 {
                        continue;
                    }
                }
            }
            self.publish();
        }

        let stats = self.dispatcher.stats();
        info!(
            "Sync session stopped ({} handled, {} ignored, {} malformed)",
            stats.handled, stats.ignored, stats.malformed
        );
    }

    /// Returns false when the session should stop
    fn apply(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Frame(raw) => {
                let outcome = self.dispatcher.dispatch(&raw, Instant::now(), &mut self.dashboard);
                if let DispatchOutcome::Handled(kind) = outcome {
                    debug!("Applied {}", kind);
                }
            }
            SessionInput::Status(status) => {
                debug!("Connection status: {}", status);
                self.dashboard.set_connection(status);
            }
            SessionInput::Command(command) => match command {
                SessionCommand::Navigate(section) => {
                    self.dashboard.navigate(section);
                }
                SessionCommand::Notify(toast) => self.dashboard.notify(toast),
                SessionCommand::LockControls => self.dashboard.lock_controls(),
                SessionCommand::UnlockControls => self.dashboard.unlock_controls(),
                SessionCommand::Shutdown => return false,
            },
        }
        true
    }

    fn publish(&self) {
        let view = self.dashboard.view(self.dispatcher.stats());
        self.views.send_replace(Arc::new(view));
    }
}

/// Cloneable handle used by the binary and by tests
#[derive(Clone)]
pub struct SyncHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    views: watch::Receiver<Arc<DashboardView>>,
    connection: Arc<ConnectionManager>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncHandle {
    pub async fn connect(&self) {
        self.connection.connect().await;
    }

    /// Forward a user action. Run requests lock the controls until the
    /// server confirms or rejects them. False when the link is not open.
    pub fn send(&self, action: OutboundAction) -> bool {
        let locks = action.starts_run() && self.connection.status().is_open();
        if locks {
            self.command(SessionCommand::LockControls);
        }
        let sent = self.connection.send(&action);
        if locks && !sent {
            self.command(SessionCommand::UnlockControls);
        }
        sent
    }

    pub fn navigate(&self, section: Section) {
        self.command(SessionCommand::Navigate(section));
    }

    pub fn notify(&self, toast: ToastEntry) {
        self.command(SessionCommand::Notify(toast));
    }

    /// Latest published snapshot
    pub fn view(&self) -> Arc<DashboardView> {
        self.views.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardView>> {
        self.views.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    /// Close the connection and stop the session task
    pub async fn shutdown(&self) {
        self.connection.disconnect().await;
        self.command(SessionCommand::Shutdown);
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }

    fn command(&self, command: SessionCommand) {
        if self.inputs.send(SessionInput::Command(command)).is_err() {
            debug!("Session already stopped; command dropped");
        }
    }
}
