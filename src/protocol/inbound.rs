//! Inbound (server → client) message schema
//!
//! Every frame is a JSON object tagged by `type`. Unrecognized tags decode
//! to [`InboundMessage::Unknown`] so newer servers never break older clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DecisionMode;

/// A decoded server push message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Metrics(MetricsUpdate),
    EventProcessed(ProcessedEvent),
    SimulationStarted {
        total_events: u64,
    },
    SimulationComplete,
    ScenarioStarted {
        scenario: ScenarioInfo,
    },
    ScenarioComplete {
        scenario: String,
        summary: ScenarioSummary,
    },
    MetricsReset,
    DecisionModeChanged {
        mode: DecisionMode,
        decision_stats: DecisionStats,
    },
    DecisionStats {
        stats: DecisionStats,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Wire name of the variant
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundMessage::Metrics(_) => MessageKind::Metrics,
            InboundMessage::EventProcessed(_) => MessageKind::EventProcessed,
            InboundMessage::SimulationStarted { .. } => MessageKind::SimulationStarted,
            InboundMessage::SimulationComplete => MessageKind::SimulationComplete,
            InboundMessage::ScenarioStarted { .. } => MessageKind::ScenarioStarted,
            InboundMessage::ScenarioComplete { .. } => MessageKind::ScenarioComplete,
            InboundMessage::MetricsReset => MessageKind::MetricsReset,
            InboundMessage::DecisionModeChanged { .. } => MessageKind::DecisionModeChanged,
            InboundMessage::DecisionStats { .. } => MessageKind::DecisionStats,
            InboundMessage::Error { .. } => MessageKind::Error,
            InboundMessage::Unknown => MessageKind::Unknown,
        }
    }
}

/// Discriminant of an [`InboundMessage`], cheap to copy and log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Metrics,
    EventProcessed,
    SimulationStarted,
    SimulationComplete,
    ScenarioStarted,
    ScenarioComplete,
    MetricsReset,
    DecisionModeChanged,
    DecisionStats,
    Error,
    Unknown,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::Metrics => "metrics",
            MessageKind::EventProcessed => "event_processed",
            MessageKind::SimulationStarted => "simulation_started",
            MessageKind::SimulationComplete => "simulation_complete",
            MessageKind::ScenarioStarted => "scenario_started",
            MessageKind::ScenarioComplete => "scenario_complete",
            MessageKind::MetricsReset => "metrics_reset",
            MessageKind::DecisionModeChanged => "decision_mode_changed",
            MessageKind::DecisionStats => "decision_stats",
            MessageKind::Error => "error",
            MessageKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// METRICS
// ──────────────────────────────────────────────────────────────────────────────

/// Server-reported aggregate counters. Replaced wholesale, never patched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub events_produced: u64,
    pub decisions_made: u64,
    pub allowed: u64,
    pub throttled: u64,
    pub escalated: u64,
    pub blocked: u64,
    pub avg_latency_ms: f64,
}

/// Payload of a `metrics` push.
///
/// The greeting sent right after the socket opens only carries `data`, so
/// every other field is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsUpdate {
    pub data: AggregateMetrics,
    #[serde(default)]
    pub kafka: Option<KafkaMetrics>,
    #[serde(default)]
    pub risk_trend: Vec<RiskTrendPoint>,
    #[serde(default)]
    pub top_actors: Vec<ActorRisk>,
    #[serde(default)]
    pub confluent_status: Option<Value>,
    #[serde(default)]
    pub confluent_metrics: Option<Value>,
    #[serde(default)]
    pub ksqldb_summaries: Vec<Value>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub scenario_name: Option<String>,
    #[serde(default)]
    pub decision_mode: Option<DecisionMode>,
    #[serde(default)]
    pub decision_stats: Option<DecisionStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KafkaMetrics {
    #[serde(default)]
    pub messages_sent: u64,
    #[serde(default)]
    pub messages_per_sec: f64,
    #[serde(default)]
    pub connection_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTrendPoint {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub risk_score: f64,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRisk {
    pub actor_id: String,
    #[serde(default)]
    pub events: u64,
    #[serde(default)]
    pub blocked: u64,
    #[serde(default)]
    pub avg_risk: f64,
    #[serde(default)]
    pub last_action: String,
    #[serde(default)]
    pub last_decision: String,
}

// ──────────────────────────────────────────────────────────────────────────────
// DECISIONS
// ──────────────────────────────────────────────────────────────────────────────

/// Verdict the gatekeeper reached for a single action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Throttle,
    Escalate,
    Block,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Decision::Allow => "ALLOW",
            Decision::Throttle => "THROTTLE",
            Decision::Escalate => "ESCALATE",
            Decision::Block => "BLOCK",
            Decision::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// Hybrid engine counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionStats {
    pub mode: Option<DecisionMode>,
    pub rule_decisions: u64,
    pub cache_hits: u64,
    pub ai_decisions: u64,
    pub avg_rule_latency_ms: f64,
    pub avg_cache_latency_ms: f64,
    pub avg_ai_latency_ms: f64,
    pub ai_pending: u64,
}

// ──────────────────────────────────────────────────────────────────────────────
// PROCESSED EVENTS
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessedEvent {
    pub event: EventSubject,
    pub signal: RiskSignal,
    pub decision: DecisionOutcome,
    pub latency_ms: f64,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubject {
    pub actor_id: String,
    pub action: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub frequency: Option<u32>,
    #[serde(default)]
    pub geo_change: Option<bool>,
    #[serde(default)]
    pub sensitivity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub risk_score: f64,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

// ──────────────────────────────────────────────────────────────────────────────
// SCENARIOS
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub name: String,
    pub icon: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expected_blocks: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub blocked: u64,
    pub expected_blocks: u64,
    pub detection_rate: f64,
    #[serde(default)]
    pub total_events: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_greeting_metrics_only_carries_data() {
        let raw = json!({
            "type": "metrics",
            "data": {
                "events_produced": 12, "decisions_made": 12, "blocked": 3,
                "allowed": 7, "escalated": 1, "throttled": 1, "avg_latency_ms": 4.25
            }
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        match msg {
            InboundMessage::Metrics(update) => {
                assert_eq!(update.data.blocked, 3);
                assert!(update.risk_trend.is_empty());
                assert!(update.decision_stats.is_none());
            }
            other => panic!("unexpected variant {:?}", other.kind()),
        }
    }

    #[test]
    fn test_event_processed_decodes_nested_payload() {
        let raw = json!({
            "type": "event_processed",
            "timestamp": "2025-01-01T00:00:00",
            "event": {"actor_id": "insider_jane", "action": "bulk_download", "role": "analyst",
                      "frequency": 40, "geo_change": false, "sensitivity": "high"},
            "signal": {"risk_score": 0.91, "risk_factors": ["bulk_operation", "sensitive_resource"]},
            "decision": {"decision": "block", "confidence": 0.95, "reason": "rule"},
            "latency_ms": 1.5,
            "explanation": "blocked"
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        let InboundMessage::EventProcessed(event) = msg else {
            panic!("expected event_processed");
        };
        assert_eq!(event.decision.decision, Decision::Block);
        assert_eq!(event.signal.risk_factors.len(), 2);
        assert_eq!(event.event.frequency, Some(40));
    }

    #[test]
    fn test_unknown_tag_and_unknown_decision() {
        let msg: InboundMessage = serde_json::from_value(json!({"type": "heartbeat", "n": 1})).unwrap();
        assert_eq!(msg.kind(), MessageKind::Unknown);

        let outcome: DecisionOutcome = serde_json::from_value(json!({"decision": "quarantine"})).unwrap();
        assert_eq!(outcome.decision, Decision::Other);
    }

    #[test]
    fn test_unit_variants_and_mode_change() {
        let reset: InboundMessage = serde_json::from_str(r#"{"type":"metrics_reset"}"#).unwrap();
        assert_eq!(reset.kind(), MessageKind::MetricsReset);

        let changed: InboundMessage = serde_json::from_value(json!({
            "type": "decision_mode_changed",
            "mode": "full_ai",
            "decision_stats": {"mode": "full_ai", "rule_decisions": 4, "cache_hits": 1, "ai_decisions": 9}
        }))
        .unwrap();
        let InboundMessage::DecisionModeChanged { mode, decision_stats } = changed else {
            panic!("expected decision_mode_changed");
        };
        assert_eq!(mode, DecisionMode::FullAi);
        assert_eq!(decision_stats.ai_decisions, 9);
        assert_eq!(decision_stats.avg_ai_latency_ms, 0.0);
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let raw = json!({"type": "event_processed", "event": {"actor_id": "a"}});
        assert!(serde_json::from_value::<InboundMessage>(raw).is_err());
    }
}
