//! Read-only dashboard snapshot handed to renderers

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::buffers::{EventFeedEntry, QueuedToast, Section};
use crate::dispatch::DispatchStats;
use crate::protocol::{
    ActorRisk, AggregateMetrics, DecisionMode, DecisionStats, KafkaMetrics, RiskTrendPoint,
    ScenarioSummary,
};
use crate::transport::ConnectionStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationStatus {
    pub running: bool,
    pub scenario_name: Option<String>,
    pub total_events: Option<u64>,
    /// Percent complete as last reported by the server
    pub progress: Option<f64>,
}

/// Server-reported panels kept as-is for the charts and tables
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuxiliaryPanels {
    pub kafka: Option<KafkaMetrics>,
    pub risk_trend: Vec<RiskTrendPoint>,
    pub top_actors: Vec<ActorRisk>,
    pub confluent_status: Option<Value>,
    pub confluent_metrics: Option<Value>,
    pub ksqldb_summaries: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedScenario {
    pub scenario: String,
    pub summary: ScenarioSummary,
}

/// Which run controls are usable right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlState {
    pub can_start: bool,
    pub can_stop: bool,
    /// A run request went out and the server has not answered yet
    pub awaiting_server: bool,
}

#[derive(Debug, Clone)]
pub struct DashboardView {
    pub connection: ConnectionStatus,
    pub metrics: AggregateMetrics,
    pub simulation: SimulationStatus,
    /// Newest first
    pub feed: Vec<Arc<EventFeedEntry>>,
    /// Oldest first, unexpired only
    pub toasts: Vec<QueuedToast>,
    /// Non-zero badges in section order
    pub badges: Vec<(Section, u64)>,
    pub focused: Section,
    pub explanation: Option<Arc<EventFeedEntry>>,
    pub decision_mode: DecisionMode,
    pub decision_stats: DecisionStats,
    pub panels: AuxiliaryPanels,
    pub controls: ControlState,
    pub last_scenario: Option<CompletedScenario>,
    pub alerts_fired: u64,
    /// Frame counters, filled in by the session
    pub dispatch: DispatchStats,
}

impl DashboardView {
    pub fn badge(&self, section: Section) -> u64 {
        self.badges
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Share of decisions that ended in a block, in percent
    pub fn block_rate(&self) -> f64 {
        if self.metrics.decisions_made == 0 {
            return 0.0;
        }
        self.metrics.blocked as f64 / self.metrics.decisions_made as f64 * 100.0
    }
}
