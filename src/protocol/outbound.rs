//! Outbound (client → server) actions
//!
//! Pure pass-through requests; the server answers through the push channel.

use serde::Serialize;

use super::DecisionMode;
use crate::error::Result;

/// Attack scenarios the server ships with
pub const KNOWN_SCENARIOS: [&str; 3] = ["insider_threat", "brute_force", "data_exfiltration"];

/// A user-triggered request, tagged by `action` on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction {
    StartSimulation {
        event_count: u32,
        attack_percentage: u32,
        duration_seconds: u32,
        use_ai: bool,
    },
    StopSimulation,
    ResetMetrics,
    RunScenario {
        scenario_id: String,
        use_ai: bool,
    },
    SetDecisionMode {
        mode: DecisionMode,
    },
}

impl OutboundAction {
    pub const DEFAULT_EVENT_COUNT: u32 = 50;
    pub const DEFAULT_ATTACK_PERCENTAGE: u32 = 20;
    pub const DEFAULT_DURATION_SECONDS: u32 = 10;

    /// Simulation request with the dashboard's slider defaults
    pub fn default_simulation() -> Self {
        OutboundAction::StartSimulation {
            event_count: Self::DEFAULT_EVENT_COUNT,
            attack_percentage: Self::DEFAULT_ATTACK_PERCENTAGE,
            duration_seconds: Self::DEFAULT_DURATION_SECONDS,
            use_ai: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutboundAction::StartSimulation { .. } => "start_simulation",
            OutboundAction::StopSimulation => "stop_simulation",
            OutboundAction::ResetMetrics => "reset_metrics",
            OutboundAction::RunScenario { .. } => "run_scenario",
            OutboundAction::SetDecisionMode { .. } => "set_decision_mode",
        }
    }

    /// Whether sending this should optimistically lock the run controls
    /// until the server confirms or rejects the run.
    pub fn starts_run(&self) -> bool {
        matches!(
            self,
            OutboundAction::StartSimulation { .. } | OutboundAction::RunScenario { .. }
        )
    }

    /// Encode as a UTF-8 JSON text frame
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
