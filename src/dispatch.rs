//! Message Dispatcher
//!
//! Decodes raw text frames and routes each to exactly one handler method.
//! A bad frame is logged and dropped; it never holds up the next one.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, warn};

use crate::protocol::{
    DecisionMode, DecisionStats, InboundMessage, MessageKind, MetricsUpdate, ProcessedEvent,
    ScenarioInfo, ScenarioSummary,
};

/// One method per inbound message kind. Calls are synchronous and happen in
/// frame arrival order.
pub trait InboundHandler {
    /// Called before routing with the frame's arrival instant
    fn on_arrival(&mut self, _at: Instant) {}

    fn on_metrics(&mut self, update: MetricsUpdate);
    fn on_event_processed(&mut self, event: ProcessedEvent);
    fn on_simulation_started(&mut self, total_events: u64);
    fn on_simulation_complete(&mut self);
    fn on_scenario_started(&mut self, scenario: ScenarioInfo);
    fn on_scenario_complete(&mut self, scenario: String, summary: ScenarioSummary);
    fn on_metrics_reset(&mut self);
    fn on_decision_mode_changed(&mut self, mode: DecisionMode, stats: DecisionStats);
    fn on_decision_stats(&mut self, stats: DecisionStats);
    fn on_error(&mut self, message: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(MessageKind),
    /// Well-formed but of a kind this client does not know
    Ignored,
    /// Not JSON, or missing/invalid required fields
    Malformed,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub handled: u64,
    pub ignored: u64,
    pub malformed: u64,
    pub by_kind: HashMap<MessageKind, u64>,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch<H>(&mut self, raw: &str, at: Instant, handler: &mut H) -> DispatchOutcome
    where
        H: InboundHandler + ?Sized,
    {
        let message: InboundMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed frame ({}): {}", e, preview(raw));
                self.stats.malformed += 1;
                return DispatchOutcome::Malformed;
            }
        };

        let kind = message.kind();
        if kind == MessageKind::Unknown {
            debug!("Ignoring frame of unknown type: {}", preview(raw));
            self.stats.ignored += 1;
            return DispatchOutcome::Ignored;
        }

        handler.on_arrival(at);
        match message {
            InboundMessage::Metrics(update) => handler.on_metrics(update),
            InboundMessage::EventProcessed(event) => handler.on_event_processed(event),
            InboundMessage::SimulationStarted { total_events } => handler.on_simulation_started(total_events),
            InboundMessage::SimulationComplete => handler.on_simulation_complete(),
            InboundMessage::ScenarioStarted { scenario } => handler.on_scenario_started(scenario),
            InboundMessage::ScenarioComplete { scenario, summary } => {
                handler.on_scenario_complete(scenario, summary)
            }
            InboundMessage::MetricsReset => handler.on_metrics_reset(),
            InboundMessage::DecisionModeChanged { mode, decision_stats } => {
                handler.on_decision_mode_changed(mode, decision_stats)
            }
            InboundMessage::DecisionStats { stats } => handler.on_decision_stats(stats),
            InboundMessage::Error { message } => handler.on_error(message),
            InboundMessage::Unknown => {}
        }

        self.stats.handled += 1;
        *self.stats.by_kind.entry(kind).or_insert(0) += 1;
        DispatchOutcome::Handled(kind)
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

fn preview(raw: &str) -> String {
    const LIMIT: usize = 120;
    match raw.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}…", &raw[..cut]),
        None => raw.to_string(),
    }
}
