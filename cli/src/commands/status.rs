use color_eyre::eyre::Result;
use gauge_protocol::{BatterySnapshot, VisualState, TECHNOLOGY_UNAVAILABLE};
use serde::Serialize;

use crate::daemon::{is_daemon_running, DaemonClient};
use crate::data::SnapshotCache;
use crate::widget::render;

#[derive(Serialize)]
struct StatusReport<'a> {
    source: &'a str,
    snapshot: &'a BatterySnapshot,
    rendered: &'a VisualState,
}

pub fn run(json: bool) -> Result<()> {
    let (snapshot, source) = load_snapshot()?;
    let rendered = render(snapshot.level, snapshot.is_charging());

    if json {
        let report = StatusReport {
            source,
            snapshot: &snapshot,
            rendered: &rendered,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in text_report(&snapshot, &rendered, source) {
        println!("{}", line);
    }

    Ok(())
}

/// The rendered widget text already carries the level label.
fn text_report(snapshot: &BatterySnapshot, rendered: &VisualState, source: &str) -> Vec<String> {
    let mut lines = vec![rendered.to_text(), String::new()];
    lines.extend(detail_lines(snapshot));
    lines.push(format!("Source:       {}", source));
    lines
}

/// Prefer the daemon's view; fall back to the on-disk cache.
fn load_snapshot() -> Result<(BatterySnapshot, &'static str)> {
    if is_daemon_running() {
        match DaemonClient::connect().and_then(|mut c| c.get_snapshot()) {
            Ok(snapshot) => return Ok((snapshot, "daemon")),
            Err(e) => tracing::warn!(error = %e, "daemon snapshot unavailable, reading cache"),
        }
    }

    let cache = SnapshotCache::open()?;
    Ok((cache.read(), "cache"))
}

fn detail_lines(snapshot: &BatterySnapshot) -> Vec<String> {
    let mut lines = vec![
        format!("Status:       {}", snapshot.status.label()),
        format!("Plugged:      {}", snapshot.plugged.label()),
    ];

    if let Some(voltage) = snapshot.voltage_formatted() {
        lines.push(format!("Voltage:      {}", voltage));
    }
    if let Some(temp) = snapshot.temperature_celsius() {
        lines.push(format!("Temperature:  {}", temp));
    }
    if snapshot.technology != TECHNOLOGY_UNAVAILABLE {
        lines.push(format!("Technology:   {}", snapshot.technology));
    }
    lines.push(format!("Health:       {}", snapshot.health.label()));

    lines
}
