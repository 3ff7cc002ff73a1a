//! State Reconciler
//!
//! Single owner of everything the dashboard shows. Mutated only through the
//! [`InboundHandler`] callbacks and a handful of local user actions;
//! renderers read [`DashboardView`] snapshots.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::view::{AuxiliaryPanels, CompletedScenario, ControlState, DashboardView, SimulationStatus};
use crate::alert::{AlertCue, AlertOutcome, AlertSink, AlertThrottle, PreferenceSource};
use crate::buffers::{BadgeBoard, EventFeed, EventFeedEntry, Section, Severity, ToastEntry, ToastQueue};
use crate::config::{FEED_CAPACITY, TOAST_CAPACITY};
use crate::dispatch::{DispatchStats, InboundHandler};
use crate::protocol::{
    AggregateMetrics, Decision, DecisionMode, DecisionStats, MetricsUpdate, ProcessedEvent,
    ScenarioInfo, ScenarioSummary,
};
use crate::transport::{ConnectionState, ConnectionStatus};

pub struct Dashboard {
    connection: ConnectionStatus,
    has_connected: bool,
    metrics: AggregateMetrics,
    simulation: SimulationStatus,
    feed: EventFeed,
    toasts: ToastQueue,
    badges: BadgeBoard,
    focused: Section,
    explanation: Option<Arc<EventFeedEntry>>,
    decision_mode: DecisionMode,
    decision_stats: DecisionStats,
    panels: AuxiliaryPanels,
    last_scenario: Option<CompletedScenario>,
    /// Blocks observed through metrics deltas since the current run began
    run_blocked: u64,
    next_seq: u64,
    controls_locked: bool,
    throttle: AlertThrottle,
    alerts_fired: u64,
    prefs: Arc<dyn PreferenceSource>,
    sink: Arc<dyn AlertSink>,
    now: Instant,
}

impl Dashboard {
    pub fn new(alert_interval: Duration, prefs: Arc<dyn PreferenceSource>, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            connection: ConnectionStatus::default(),
            has_connected: false,
            metrics: AggregateMetrics::default(),
            simulation: SimulationStatus::default(),
            feed: EventFeed::new(FEED_CAPACITY),
            toasts: ToastQueue::new(TOAST_CAPACITY),
            badges: BadgeBoard::new(),
            focused: Section::default(),
            explanation: None,
            decision_mode: DecisionMode::default(),
            decision_stats: DecisionStats::default(),
            panels: AuxiliaryPanels::default(),
            last_scenario: None,
            run_blocked: 0,
            next_seq: 0,
            controls_locked: false,
            throttle: AlertThrottle::new(alert_interval),
            alerts_fired: 0,
            prefs,
            sink,
            now: Instant::now(),
        }
    }

    // ──────────────────────────────────────────────────────────────────────────
    // LOCAL ACTIONS
    // ──────────────────────────────────────────────────────────────────────────

    /// Advance the clock and drop expired toasts. Returns how many went.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.now = self.now.max(now);
        self.toasts.prune(self.now)
    }

    /// The user switched to `section`; its badge is cleared
    pub fn navigate(&mut self, section: Section) -> u64 {
        self.focused = section;
        self.badges.navigate(section)
    }

    /// Local notification not tied to a server message
    pub fn notify(&mut self, toast: ToastEntry) {
        self.catch_up();
        self.toast(toast);
    }

    /// Optimistically disable the run controls until the server answers
    pub fn lock_controls(&mut self) {
        self.controls_locked = true;
    }

    pub fn unlock_controls(&mut self) {
        self.controls_locked = false;
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        let previous = self.connection.state;
        self.connection = status;
        if status.state == previous {
            return;
        }

        self.catch_up();
        match status.state {
            // a run request in flight on the dropped link will never be answered
            ConnectionState::Closed | ConnectionState::Errored => {
                if self.controls_locked {
                    debug!("Link lost with a run request pending, unlocking controls");
                }
                self.controls_locked = false;
            }
            ConnectionState::Failed => {
                self.controls_locked = false;
                self.toast(ToastEntry::new(
                    "Connection Lost",
                    "Could not reach the gatekeeper server. Reload required.",
                    Severity::Error,
                ));
            }
            ConnectionState::Open => {
                if self.has_connected {
                    self.toast(ToastEntry::new("Reconnected", "Live updates resumed", Severity::Success));
                }
                self.has_connected = true;
            }
            _ => {}
        }
    }

    // ──────────────────────────────────────────────────────────────────────────
    // READ ACCESS
    // ──────────────────────────────────────────────────────────────────────────

    pub fn metrics(&self) -> &AggregateMetrics {
        &self.metrics
    }

    pub fn simulation(&self) -> &SimulationStatus {
        &self.simulation
    }

    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub fn badges(&self) -> &BadgeBoard {
        &self.badges
    }

    pub fn focused(&self) -> Section {
        self.focused
    }

    pub fn explanation(&self) -> Option<&Arc<EventFeedEntry>> {
        self.explanation.as_ref()
    }

    pub fn run_blocked(&self) -> u64 {
        self.run_blocked
    }

    pub fn alerts_fired(&self) -> u64 {
        self.alerts_fired
    }

    pub fn controls(&self) -> ControlState {
        let running = self.simulation.running;
        ControlState {
            can_start: !running && !self.controls_locked && self.connection.is_open(),
            can_stop: running,
            awaiting_server: self.controls_locked,
        }
    }

    /// Snapshot for renderers; `dispatch` is owned by the caller's dispatcher
    pub fn view(&self, dispatch: &DispatchStats) -> DashboardView {
        DashboardView {
            connection: self.connection,
            metrics: self.metrics,
            simulation: self.simulation.clone(),
            feed: self.feed.snapshot(),
            toasts: self.toasts.visible(self.now),
            badges: self.badges.snapshot(),
            focused: self.focused,
            explanation: self.explanation.clone(),
            decision_mode: self.decision_mode,
            decision_stats: self.decision_stats.clone(),
            panels: self.panels.clone(),
            controls: self.controls(),
            last_scenario: self.last_scenario.clone(),
            alerts_fired: self.alerts_fired,
            dispatch: dispatch.clone(),
        }
    }

    // ──────────────────────────────────────────────────────────────────────────
    // INTERNALS
    // ──────────────────────────────────────────────────────────────────────────

    /// Local actions carry no arrival instant of their own
    fn catch_up(&mut self) {
        self.now = self.now.max(Instant::now());
    }

    fn toast(&mut self, toast: ToastEntry) {
        self.toasts.push(toast, self.now);
    }

    fn begin_run(&mut self) {
        self.simulation.running = true;
        self.simulation.progress = Some(0.0);
        self.run_blocked = 0;
        self.feed.arm_first_event();
        self.controls_locked = false;
    }

    fn end_run(&mut self) {
        self.simulation.running = false;
        self.controls_locked = false;
    }

    fn raise_alert(&mut self, newly_blocked: u64) {
        let cue = AlertCue { newly_blocked };
        let outcome = self
            .throttle
            .maybe_alert(self.now, cue, self.prefs.as_ref(), self.sink.as_ref());
        if let AlertOutcome::Fired { .. } = outcome {
            self.alerts_fired += 1;
        }
    }
}

impl InboundHandler for Dashboard {
    fn on_arrival(&mut self, at: Instant) {
        self.now = self.now.max(at);
    }

    fn on_metrics(&mut self, update: MetricsUpdate) {
        let previous = std::mem::replace(&mut self.metrics, update.data);
        let newly_blocked = self.metrics.blocked.saturating_sub(previous.blocked);

        if newly_blocked > 0 {
            self.run_blocked += newly_blocked;
            self.badges.add(Section::Events, newly_blocked, self.focused);
            self.raise_alert(newly_blocked);
        }

        if update.progress.is_some() {
            self.simulation.progress = update.progress;
        }
        if update.scenario_name.is_some() {
            self.simulation.scenario_name = update.scenario_name;
        }
        if let Some(mode) = update.decision_mode {
            self.decision_mode = mode;
        }
        if let Some(stats) = update.decision_stats {
            self.decision_stats = stats;
        }

        self.panels.kafka = update.kafka.or(self.panels.kafka.take());
        if !update.risk_trend.is_empty() {
            self.panels.risk_trend = update.risk_trend;
        }
        if !update.top_actors.is_empty() {
            self.panels.top_actors = update.top_actors;
        }
        if update.confluent_status.is_some() {
            self.panels.confluent_status = update.confluent_status;
        }
        if update.confluent_metrics.is_some() {
            self.panels.confluent_metrics = update.confluent_metrics;
        }
        if !update.ksqldb_summaries.is_empty() {
            self.panels.ksqldb_summaries = update.ksqldb_summaries;
        }
    }

    fn on_event_processed(&mut self, event: ProcessedEvent) {
        self.next_seq += 1;
        let entry = EventFeedEntry::from_processed(self.next_seq, Utc::now(), &event);
        let entry = self.feed.insert(entry);

        match entry.decision {
            Decision::Block => {
                debug!("Auto-selecting blocked event #{} ({})", entry.seq, entry.actor_id);
                self.explanation = Some(entry);
            }
            Decision::Escalate => {
                let message = format!(
                    "{} → {} ({}% risk)",
                    entry.actor_id,
                    entry.action,
                    entry.risk_percent()
                );
                self.toast(ToastEntry::new("Escalated for Review", message, Severity::Warning));
            }
            _ => {}
        }
    }

    fn on_simulation_started(&mut self, total_events: u64) {
        info!("▶️  Simulation started ({} events)", total_events);
        self.begin_run();
        self.simulation.scenario_name = None;
        self.simulation.total_events = Some(total_events);
    }

    fn on_simulation_complete(&mut self) {
        info!("⏹️  Simulation complete");
        self.end_run();
        self.simulation.progress = Some(100.0);
    }

    fn on_scenario_started(&mut self, scenario: ScenarioInfo) {
        info!("🎯 Scenario started: {}", scenario.name);
        self.begin_run();
        self.simulation.total_events = None;
        let message = scenario
            .description
            .clone()
            .unwrap_or_else(|| "Attack scenario in progress".to_string());
        self.toast(ToastEntry::new(
            format!("{} {}", scenario.icon, scenario.name),
            message,
            Severity::Info,
        ));
        self.simulation.scenario_name = Some(scenario.name);
    }

    fn on_scenario_complete(&mut self, scenario: String, summary: ScenarioSummary) {
        info!(
            "🏁 Scenario {} complete: {}/{} blocks",
            scenario, summary.blocked, summary.expected_blocks
        );
        self.end_run();
        self.simulation.progress = Some(100.0);

        let severity = if summary.blocked >= summary.expected_blocks {
            Severity::Success
        } else {
            Severity::Warning
        };
        self.toast(ToastEntry::new(
            "Scenario Complete",
            format!(
                "Blocked {}/{} expected ({:.0}% detection)",
                summary.blocked, summary.expected_blocks, summary.detection_rate
            ),
            severity,
        ));
        self.last_scenario = Some(CompletedScenario { scenario, summary });
    }

    fn on_metrics_reset(&mut self) {
        info!("🗑️  Metrics reset");
        self.metrics = AggregateMetrics::default();
        self.feed.clear();
        self.toasts.clear();
        self.badges.clear();
        self.explanation = None;
        self.run_blocked = 0;
        self.panels = AuxiliaryPanels::default();
        self.last_scenario = None;
        self.simulation.progress = None;
    }

    fn on_decision_mode_changed(&mut self, mode: DecisionMode, stats: DecisionStats) {
        info!("Decision mode is now {}", mode);
        self.decision_mode = mode;
        self.decision_stats = stats;
        self.toast(ToastEntry::new(
            "Decision Mode",
            format!("Switched to {}", mode),
            Severity::Info,
        ));
    }

    fn on_decision_stats(&mut self, stats: DecisionStats) {
        if let Some(mode) = stats.mode {
            self.decision_mode = mode;
        }
        self.decision_stats = stats;
    }

    fn on_error(&mut self, message: String) {
        warn!("Server reported an error: {}", message);
        // a pending run request was rejected before anything started
        if self.controls_locked {
            self.simulation.running = false;
        }
        self.controls_locked = false;
        self.toast(ToastEntry::new("Error", message, Severity::Error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertPreferences;
    use crate::protocol::{DecisionOutcome, EventSubject, RiskSignal};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        cues: Mutex<Vec<u64>>,
    }

    impl AlertSink for RecordingSink {
        fn play_sound(&self, cue: &AlertCue) {
            self.cues.lock().unwrap().push(cue.newly_blocked);
        }
        fn flash(&self, _cue: &AlertCue) {}
    }

    fn dashboard() -> (Dashboard, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let prefs = Arc::new(AlertPreferences::default());
        (Dashboard::new(Duration::from_millis(500), prefs, sink.clone()), sink)
    }

    fn metrics(blocked: u64) -> MetricsUpdate {
        serde_json::from_value(serde_json::json!({
            "data": {"events_produced": blocked * 2, "decisions_made": blocked * 2, "allowed": blocked,
                     "throttled": 0, "escalated": 0, "blocked": blocked, "avg_latency_ms": 3.0}
        }))
        .unwrap()
    }

    fn event(actor: &str, decision: Decision) -> ProcessedEvent {
        ProcessedEvent {
            event: EventSubject {
                actor_id: actor.to_string(),
                action: "bulk_download".to_string(),
                role: None,
                frequency: None,
                geo_change: None,
                sensitivity: None,
            },
            signal: RiskSignal { risk_score: 0.9, risk_factors: vec!["bulk_operation".into()] },
            decision: DecisionOutcome { decision, confidence: None, reason: None },
            latency_ms: 2.0,
            explanation: Some(format!("{} explanation", actor)),
            timestamp: None,
        }
    }

    #[test]
    fn test_block_deltas_accumulate_on_events_badge() {
        let (mut dash, _) = dashboard();
        let t0 = Instant::now();
        let mut expected = 0;
        let mut previous = 0;

        for (i, blocked) in [0u64, 2, 2, 5, 3, 4, 4, 9].into_iter().enumerate() {
            dash.on_arrival(t0 + Duration::from_secs(i as u64));
            dash.on_metrics(metrics(blocked));
            expected += blocked.saturating_sub(previous);
            previous = blocked;
            assert_eq!(dash.badges().count(Section::Events), expected);
        }
        assert_eq!(expected, 11);
    }

    #[test]
    fn test_repeated_snapshot_is_idempotent() {
        let (mut dash, sink) = dashboard();
        let t0 = Instant::now();
        dash.on_arrival(t0);
        dash.on_metrics(metrics(3));
        dash.on_arrival(t0 + Duration::from_secs(2));
        dash.on_metrics(metrics(3));

        assert_eq!(dash.badges().count(Section::Events), 3);
        assert_eq!(*sink.cues.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_focused_events_section_alerts_without_badge() {
        let (mut dash, sink) = dashboard();
        dash.navigate(Section::Events);
        dash.on_metrics(metrics(2));

        assert_eq!(dash.badges().count(Section::Events), 0);
        assert_eq!(sink.cues.lock().unwrap().len(), 1);
        assert_eq!(dash.alerts_fired(), 1);
    }

    #[test]
    fn test_alert_burst_is_throttled() {
        let (mut dash, sink) = dashboard();
        let t0 = Instant::now();
        for (ms, blocked) in [(0, 1), (100, 2), (300, 3), (600, 4)] {
            dash.on_arrival(t0 + Duration::from_millis(ms));
            dash.on_metrics(metrics(blocked));
        }
        assert_eq!(*sink.cues.lock().unwrap(), vec![1, 1]);
        assert_eq!(dash.badges().count(Section::Events), 4);
    }

    #[test]
    fn test_reset_then_block_selects_explanation() {
        let (mut dash, _) = dashboard();
        dash.on_event_processed(event("old", Decision::Allow));
        dash.on_metrics_reset();
        dash.on_event_processed(event("insider_jane", Decision::Block));

        assert_eq!(dash.feed().len(), 1);
        let selected = dash.explanation().unwrap();
        assert_eq!(selected.actor_id, "insider_jane");
        assert_eq!(selected.explanation.as_deref(), Some("insider_jane explanation"));
    }

    #[test]
    fn test_escalate_toasts_but_keeps_explanation() {
        let (mut dash, _) = dashboard();
        dash.on_event_processed(event("blocked_one", Decision::Block));
        dash.on_event_processed(event("escalated_one", Decision::Escalate));

        assert_eq!(dash.explanation().unwrap().actor_id, "blocked_one");
        assert_eq!(dash.toasts().len(), 1);
        assert_eq!(dash.view(&DispatchStats::default()).toasts[0].entry.severity, Severity::Warning);
    }

    #[test]
    fn test_sixty_inserts_keep_last_fifty() {
        let (mut dash, _) = dashboard();
        for i in 1..=60 {
            dash.on_event_processed(event(&format!("actor_{}", i), Decision::Allow));
        }
        let view = dash.view(&DispatchStats::default());
        assert_eq!(view.feed.len(), 50);
        let seqs: Vec<u64> = view.feed.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (11..=60).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_metrics_reset_matches_fresh_state() {
        let (mut dash, _) = dashboard();
        dash.on_metrics(metrics(4));
        dash.on_event_processed(event("a", Decision::Block));
        dash.on_error("boom".into());
        dash.on_metrics_reset();

        let (fresh, _) = dashboard();
        assert_eq!(dash.metrics(), fresh.metrics());
        assert_eq!(dash.feed().len(), 0);
        assert!(dash.feed().is_awaiting_first());
        assert!(dash.toasts().is_empty());
        assert!(dash.badges().is_empty());
        assert!(dash.explanation().is_none());
    }

    #[test]
    fn test_run_start_clears_previous_run_on_first_event() {
        let (mut dash, _) = dashboard();
        dash.on_event_processed(event("run1", Decision::Allow));
        dash.on_metrics(metrics(2));
        dash.lock_controls();

        dash.on_simulation_started(50);
        assert!(dash.simulation().running);
        assert_eq!(dash.run_blocked(), 0);
        assert!(!dash.controls().awaiting_server);
        assert_eq!(dash.feed().len(), 1, "old rows stay until the first new event");

        dash.on_event_processed(event("run2", Decision::Allow));
        assert_eq!(dash.feed().len(), 1);
        assert_eq!(dash.feed().head().unwrap().actor_id, "run2");
    }

    #[test]
    fn test_scenario_lifecycle_and_error_unlocks_controls() {
        let (mut dash, _) = dashboard();
        dash.lock_controls();
        dash.on_error("Unknown scenario: nope".into());
        assert!(!dash.controls().awaiting_server);
        assert!(!dash.simulation().running);

        dash.on_scenario_started(ScenarioInfo {
            name: "Brute Force Attack".into(),
            icon: "🔓".into(),
            id: Some("brute_force".into()),
            description: None,
            expected_blocks: Some(8),
        });
        assert_eq!(dash.simulation().scenario_name.as_deref(), Some("Brute Force Attack"));

        dash.on_scenario_complete(
            "Brute Force Attack".into(),
            ScenarioSummary { blocked: 8, expected_blocks: 8, detection_rate: 100.0, total_events: Some(25) },
        );
        assert!(!dash.simulation().running);
        assert_eq!(dash.view(&DispatchStats::default()).last_scenario.unwrap().summary.blocked, 8);
    }

    #[test]
    fn test_toasts_expire_on_tick() {
        let (mut dash, _) = dashboard();
        let t0 = Instant::now();
        dash.on_arrival(t0);
        dash.on_error("boom".into());
        assert_eq!(dash.tick(t0 + Duration::from_secs(1)), 0);
        assert_eq!(dash.tick(t0 + Severity::Error.default_duration()), 1);
        assert!(dash.view(&DispatchStats::default()).toasts.is_empty());
    }

    #[test]
    fn test_local_toasts_expire_from_when_they_were_raised() {
        let (mut dash, _) = dashboard();
        std::thread::sleep(Duration::from_millis(30));
        let raised = Instant::now();
        dash.notify(ToastEntry::new("Export Failed", "server answered 500", Severity::Info));

        let view = dash.view(&DispatchStats::default());
        assert!(view.toasts[0].expires_at >= raised + Severity::Info.default_duration());
    }

    #[test]
    fn test_link_loss_releases_pending_run_request() {
        let (mut dash, _) = dashboard();
        dash.set_connection(ConnectionStatus { state: ConnectionState::Open, attempt: 0, next_retry: None });
        dash.lock_controls();
        assert!(!dash.controls().can_start);

        dash.set_connection(ConnectionStatus {
            state: ConnectionState::Closed,
            attempt: 1,
            next_retry: Some(Duration::from_secs(1)),
        });
        assert!(!dash.controls().awaiting_server);

        dash.set_connection(ConnectionStatus { state: ConnectionState::Open, attempt: 0, next_retry: None });
        assert!(dash.controls().can_start);
        assert_eq!(dash.toasts().len(), 1, "reconnect announced");
    }
}
