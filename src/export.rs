//! Export Report
//!
//! One-shot fetch of the server's run report over HTTP. The report is shown
//! to the user and never fed back into the live dashboard state.

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::protocol::{ActorRisk, RiskTrendPoint};

const REPORT_PATH: &str = "/api/export-report";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportSummary {
    pub total_events: u64,
    #[serde(default)]
    pub decisions_made: u64,
    pub blocked: u64,
    pub allowed: u64,
    #[serde(default)]
    pub escalated: u64,
    #[serde(default)]
    pub throttled: u64,
    pub avg_latency_ms: f64,
    /// Blocks per produced event, in percent
    pub block_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockedEvent {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportReport {
    pub generated_at: String,
    pub summary: ReportSummary,
    #[serde(default)]
    pub top_risky_actors: Vec<ActorRisk>,
    #[serde(default)]
    pub blocked_events: Vec<BlockedEvent>,
    #[serde(default)]
    pub risk_trend: Vec<RiskTrendPoint>,
    #[serde(default)]
    pub confluent_status: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportResponse {
    Refused { error: String },
    Report(Box<ExportReport>),
}

impl ExportReport {
    /// Decode a response body; the server answers `{"error": ...}` when
    /// there is nothing to export.
    pub fn from_body(body: &str) -> Result<Self> {
        let response: ExportResponse =
            serde_json::from_str(body).map_err(|e| SyncError::Export(format!("unreadable report: {}", e)))?;
        match response {
            ExportResponse::Refused { error } => Err(SyncError::Export(error)),
            ExportResponse::Report(report) => Ok(*report),
        }
    }

    pub fn render_text(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        out.push_str("AI Risk Gatekeeper Report\n");
        out.push_str(&format!("Generated: {}\n\n", self.generated_at));
        out.push_str(&format!(
            "Events: {}  Decisions: {}  Avg latency: {:.2}ms\n",
            s.total_events, s.decisions_made, s.avg_latency_ms
        ));
        out.push_str(&format!(
            "Blocked: {}  Escalated: {}  Throttled: {}  Allowed: {}  Block rate: {:.1}%\n",
            s.blocked, s.escalated, s.throttled, s.allowed, s.block_rate
        ));

        if !self.top_risky_actors.is_empty() {
            out.push_str("\nTop risky actors:\n");
            for actor in &self.top_risky_actors {
                out.push_str(&format!(
                    "  {:<20} risk {:.2}  events {:>4}  blocked {:>3}\n",
                    actor.actor_id, actor.avg_risk, actor.events, actor.blocked
                ));
            }
        }

        if !self.blocked_events.is_empty() {
            out.push_str("\nBlocked events:\n");
            for event in &self.blocked_events {
                out.push_str(&format!(
                    "  [{}] {} → {} ({:.0}%)\n",
                    event.timestamp.as_deref().unwrap_or("-"),
                    event.actor_id.as_deref().unwrap_or("?"),
                    event.action.as_deref().unwrap_or("?"),
                    event.risk_score.unwrap_or(0.0) * 100.0
                ));
                if !event.explanation.is_empty() {
                    out.push_str(&format!("      {}\n", event.explanation));
                }
            }
        }
        out
    }
}

/// HTTP client for the report endpoint
pub struct ReportClient {
    client: Client,
    url: Url,
}

impl ReportClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let url = config
            .http_base()?
            .join(REPORT_PATH)
            .map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            client: Client::builder()
                .user_agent(concat!("gatekeeper_sync/", env!("CARGO_PKG_VERSION")))
                .build()?,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch once. Any transport, status or decode failure is an
    /// [`SyncError::Export`]; nothing is retried.
    pub async fn fetch(&self) -> Result<ExportReport> {
        debug!("Requesting export report from {}", self.url);
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| SyncError::Export(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SyncError::Export(e.to_string()))?;
        if !status.is_success() {
            return Err(SyncError::Export(format!("server answered {}", status)));
        }
        ExportReport::from_body(&body)
    }
}
