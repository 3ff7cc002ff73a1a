//! Wire Protocol
//!
//! Typed views of the JSON frames exchanged over the duplex connection.

mod inbound;
mod outbound;

pub use inbound::{
    ActorRisk, AggregateMetrics, Decision, DecisionOutcome, DecisionStats, EventSubject,
    InboundMessage, KafkaMetrics, MessageKind, MetricsUpdate, ProcessedEvent, RiskSignal,
    RiskTrendPoint, ScenarioInfo, ScenarioSummary,
};
pub use outbound::{OutboundAction, KNOWN_SCENARIOS};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the server's hybrid engine routes decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// Rules only
    Fast,
    /// Rules for clear cases, AI for the ambiguous band
    #[default]
    Hybrid,
    /// AI for everything
    FullAi,
}

impl std::fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionMode::Fast => f.write_str("fast"),
            DecisionMode::Hybrid => f.write_str("hybrid"),
            DecisionMode::FullAi => f.write_str("full_ai"),
        }
    }
}

impl FromStr for DecisionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(DecisionMode::Fast),
            "hybrid" => Ok(DecisionMode::Hybrid),
            "full_ai" | "full-ai" | "ai" => Ok(DecisionMode::FullAi),
            other => Err(format!("unknown decision mode '{}'", other)),
        }
    }
}
