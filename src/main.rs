//! AI Risk Gatekeeper Live Console
//!
//! Terminal front-end for the sync layer:
//! - Live connection to the gatekeeper server with automatic reconnection
//! - Event feed, toasts and block alerts rendered as console lines
//! - Operator commands for simulations, scenarios and decision modes

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use gatekeeper_sync::alert::{ConsoleAlertSink, FilePreferences, PreferenceSource};
use gatekeeper_sync::buffers::{Section, Severity, ToastEntry};
use gatekeeper_sync::export::ReportClient;
use gatekeeper_sync::protocol::{DecisionMode, OutboundAction, KNOWN_SCENARIOS};
use gatekeeper_sync::{DashboardView, SyncConfig, SyncError, SyncHandle, SyncSession, WsConnector};

// ──────────────────────────────────────────────────────────────────────────────
// MAIN ENTRY POINT
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gatekeeper_sync=info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    println!("\n{}", "═".repeat(60));
    println!("🛡️  AI Risk Gatekeeper Live Console v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));

    let config = SyncConfig::from_env();
    let prefs = Arc::new(FilePreferences::new(config.prefs_file.clone()));
    let handle = SyncSession::start(
        &config,
        Arc::new(WsConnector),
        prefs.clone(),
        Arc::new(ConsoleAlertSink),
    )
    .context("Failed to start sync session")?;
    let reports = ReportClient::new(&config)?;

    println!("🔌 Server: {}", config.base_url);
    let current = prefs.load();
    println!(
        "🔔 Alerts: sound {} | visual {}",
        on_off(current.sound_enabled),
        on_off(current.visual_enabled)
    );
    println!("{}\n", "═".repeat(60));

    handle.connect().await;
    tokio::spawn(render_loop(handle.clone()));

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("🛡️  > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        match command.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("\n👋 Goodbye!\n");
                break;
            }
            "help" | "?" => print_help(),
            "start" => {
                let action = parse_simulation(&args);
                report_send(&handle, action);
            }
            "stop" => report_send(&handle, OutboundAction::StopSimulation),
            "reset" => report_send(&handle, OutboundAction::ResetMetrics),
            "scenario" => {
                let Some(id) = args.first() else {
                    println!("Scenarios: {}", KNOWN_SCENARIOS.join(", "));
                    continue;
                };
                let use_ai = args.get(1).is_some_and(|a| *a == "ai");
                report_send(&handle, OutboundAction::RunScenario { scenario_id: id.to_string(), use_ai });
            }
            "mode" => match args.first().map(|m| m.parse::<DecisionMode>()) {
                Some(Ok(mode)) => report_send(&handle, OutboundAction::SetDecisionMode { mode }),
                Some(Err(e)) => println!("⚠️  {}", e),
                None => println!("Decision mode: {}", handle.view().decision_mode),
            },
            "go" => match args.first().map(|s| s.parse::<Section>()) {
                Some(Ok(section)) => {
                    handle.navigate(section);
                    println!("📍 Now viewing {}", section);
                }
                Some(Err(e)) => println!("⚠️  {}", e),
                None => println!("Sections: dashboard, events, analytics, actors"),
            },
            "feed" => {
                let limit = args.first().and_then(|n| n.parse().ok()).unwrap_or(10);
                print_feed(&handle.view(), limit);
            }
            "status" => print_status(&handle.view()),
            "export" => match reports.fetch().await {
                Ok(report) => println!("\n{}", report.render_text()),
                Err(e) => {
                    println!("❌ {}", e);
                    handle.notify(ToastEntry::new("Export Failed", e.to_string(), Severity::Error));
                }
            },
            "sound" | "visual" => {
                let enable = match args.first().copied() {
                    Some("on") => true,
                    Some("off") => false,
                    _ => {
                        println!("Usage: {} on|off", command);
                        continue;
                    }
                };
                let updated = prefs.update(|p| {
                    if command == "sound" {
                        p.sound_enabled = enable;
                    } else {
                        p.visual_enabled = enable;
                    }
                });
                match updated {
                    Ok(p) => println!(
                        "🔔 Alerts: sound {} | visual {}",
                        on_off(p.sound_enabled),
                        on_off(p.visual_enabled)
                    ),
                    Err(e) => println!("❌ Could not save preferences: {}", e),
                }
            }
            "reconnect" => handle.connect().await,
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }
    }

    handle.shutdown().await;
    info!("Console closed");
    Ok(())
}

// ──────────────────────────────────────────────────────────────────────────────
// RENDERING
// ──────────────────────────────────────────────────────────────────────────────

/// Prints status changes, new toasts and new feed rows as they are published
async fn render_loop(handle: SyncHandle) {
    let mut views = handle.subscribe();
    let mut seen_toasts: HashSet<Uuid> = HashSet::new();
    let mut last_status = None;
    let mut last_seq = 0;

    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();

        if last_status != Some(view.connection) {
            println!("\n{}", view.connection);
            last_status = Some(view.connection);
        }

        let fresh: Vec<_> = view
            .feed
            .iter()
            .take_while(|entry| entry.seq > last_seq)
            .collect();
        for entry in fresh.iter().rev() {
            println!(
                "  {:<8} {:<18} {:<20} {:>3}%  {:.1}ms",
                entry.decision.to_string(),
                entry.actor_id,
                entry.action,
                entry.risk_percent(),
                entry.latency_ms
            );
        }
        if let Some(head) = view.feed.first() {
            last_seq = last_seq.max(head.seq);
        }

        for toast in &view.toasts {
            if seen_toasts.insert(toast.id) {
                println!(
                    "{} {}: {}",
                    toast.entry.severity.icon(),
                    toast.entry.title,
                    toast.entry.message
                );
            }
        }
        seen_toasts.retain(|id| view.toasts.iter().any(|t| t.id == *id));
    }
}

fn print_status(view: &DashboardView) {
    let m = &view.metrics;
    println!("\n{}", "─".repeat(50));
    println!("{}", view.connection);
    println!(
        "📊 Events {} | Decisions {} | Blocked {} | Escalated {} | Throttled {} | Allowed {}",
        m.events_produced, m.decisions_made, m.blocked, m.escalated, m.throttled, m.allowed
    );
    println!(
        "⏱️  Avg latency {:.2}ms | Block rate {:.1}% | Mode {}",
        m.avg_latency_ms,
        view.block_rate(),
        view.decision_mode
    );
    if view.simulation.running {
        println!(
            "▶️  Running {} ({:.0}%)",
            view.simulation.scenario_name.as_deref().unwrap_or("simulation"),
            view.simulation.progress.unwrap_or(0.0)
        );
    }
    if let Some(done) = &view.last_scenario {
        println!(
            "🏁 Last scenario {}: {}/{} blocked",
            done.scenario, done.summary.blocked, done.summary.expected_blocks
        );
    }
    for (section, count) in &view.badges {
        println!("🔴 {} ({})", section, count);
    }
    if let Some(selected) = &view.explanation {
        println!("🔍 {} → {}", selected.actor_id, selected.action);
        if let Some(text) = &selected.explanation {
            println!("   {}", text);
        }
    }
    println!(
        "📨 Frames: {} handled, {} ignored, {} malformed | Alerts fired: {}",
        view.dispatch.handled, view.dispatch.ignored, view.dispatch.malformed, view.alerts_fired
    );
    println!("{}\n", "─".repeat(50));
}

fn print_feed(view: &DashboardView, limit: usize) {
    if view.feed.is_empty() {
        println!("Waiting for events...");
        return;
    }
    for entry in view.feed.iter().take(limit) {
        println!(
            "  #{:<4} {} {:<8} {:<18} {:<20} {:>3}%",
            entry.seq,
            entry.received_at.format("%H:%M:%S"),
            entry.decision.to_string(),
            entry.actor_id,
            entry.action,
            entry.risk_percent()
        );
    }
}

fn print_help() {
    println!("💡 Commands:");
    println!("   start [events] [attack%] [seconds] [ai] | stop | reset");
    println!("   scenario <{}> [ai]", KNOWN_SCENARIOS.join("|"));
    println!("   mode <fast|hybrid|full_ai> | go <section> | feed [n] | status");
    println!("   export | sound on|off | visual on|off | reconnect | quit\n");
}

// ──────────────────────────────────────────────────────────────────────────────
// HELPERS
// ──────────────────────────────────────────────────────────────────────────────

fn parse_simulation(args: &[&str]) -> OutboundAction {
    OutboundAction::StartSimulation {
        event_count: args
            .first()
            .and_then(|a| a.parse().ok())
            .unwrap_or(OutboundAction::DEFAULT_EVENT_COUNT),
        attack_percentage: args
            .get(1)
            .and_then(|a| a.parse::<u32>().ok())
            .map(|p| p.min(100))
            .unwrap_or(OutboundAction::DEFAULT_ATTACK_PERCENTAGE),
        duration_seconds: args
            .get(2)
            .and_then(|a| a.parse().ok())
            .unwrap_or(OutboundAction::DEFAULT_DURATION_SECONDS),
        use_ai: args.get(3).is_some_and(|a| *a == "ai"),
    }
}

fn report_send(handle: &SyncHandle, action: OutboundAction) {
    let name = action.name();
    if handle.send(action) {
        println!("📤 {}", name);
    } else {
        println!("⚠️  {}; {} dropped", SyncError::NotConnected, name);
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulation_fills_defaults() {
        assert_eq!(parse_simulation(&[]), OutboundAction::default_simulation());
        assert_eq!(
            parse_simulation(&["80", "150", "5", "ai"]),
            OutboundAction::StartSimulation {
                event_count: 80,
                attack_percentage: 100,
                duration_seconds: 5,
                use_ai: true,
            }
        );
    }
}
