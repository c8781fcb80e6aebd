use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use gauge_protocol::{EventOutcome, HistoryWrite, MonitorEvent, WidgetId};

use crate::alerts::CommandAlerts;
use crate::config::UserConfig;
use crate::daemon::{is_daemon_running, DaemonClient};
use crate::data::{HistoryStore, SnapshotCache, UpdateOrchestrator};
use crate::widget::FileSurface;

/// Hand an event to the daemon, or run the pipeline in-process when no
/// daemon is listening.
pub fn run(event: MonitorEvent, config: &UserConfig) -> Result<()> {
    let event = with_default_targets(event, config);

    let outcome = if is_daemon_running() {
        let mut client = DaemonClient::connect_with_version_check().map_err(|e| eyre!("{}", e))?;
        client.send_event(event).map_err(|e| eyre!("{}", e))?
    } else {
        handle_locally(event, config)?
    };

    for line in outcome_lines(&outcome) {
        println!("{}", line);
    }
    Ok(())
}

/// An empty refresh request means every configured target.
fn with_default_targets(event: MonitorEvent, config: &UserConfig) -> MonitorEvent {
    match event {
        MonitorEvent::WidgetRefreshRequest { target_ids } if target_ids.is_empty() => {
            MonitorEvent::WidgetRefreshRequest {
                target_ids: config.widgets.target_ids(),
            }
        }
        other => other,
    }
}

fn handle_locally(event: MonitorEvent, config: &UserConfig) -> Result<EventOutcome> {
    tracing::debug!(event = event.kind(), "no daemon running, handling in-process");

    let history = HistoryStore::open_or_log().map(Arc::new);
    let cache = Arc::new(SnapshotCache::open()?);
    let surface = FileSurface::new(config.widgets.target_ids());
    let alerts = CommandAlerts::new(&config.alerts);

    let mut orchestrator = UpdateOrchestrator::new(
        history,
        Arc::clone(&cache),
        Box::new(surface),
        Box::new(alerts),
    )
    .with_history_enabled(config.history.enabled);

    let outcome = orchestrator.handle(event);
    cache.flush()?;

    Ok(outcome)
}

fn outcome_lines(outcome: &EventOutcome) -> Vec<String> {
    let mut lines = vec![format!("Event:     {}", outcome.event)];

    let history = match &outcome.history {
        HistoryWrite::Appended { row_id } => Some(format!("recorded (row {})", row_id)),
        HistoryWrite::Unchanged => Some("level unchanged".to_string()),
        HistoryWrite::Duplicate { timestamp } => {
            Some(format!("entry for {} already exists", timestamp))
        }
        HistoryWrite::Failed { reason } => Some(format!("write failed: {}", reason)),
        HistoryWrite::Disabled => Some("disabled".to_string()),
        HistoryWrite::NotApplicable => None,
    };
    if let Some(history) = history {
        lines.push(format!("History:   {}", history));
    }

    if let Some(rendered) = &outcome.rendered {
        lines.push(format!("Widget:    {}", rendered.to_text()));
    }
    if !outcome.updated_targets.is_empty() {
        lines.push(format!("Updated:   {}", join_ids(&outcome.updated_targets)));
    }
    if !outcome.skipped_targets.is_empty() {
        lines.push(format!("Skipped:   {}", join_ids(&outcome.skipped_targets)));
    }

    lines
}

fn join_ids(ids: &[WidgetId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::render;

    #[test]
    fn test_outcome_lines_show_level_label_once() {
        let outcome = EventOutcome {
            history: HistoryWrite::Failed {
                reason: "history store is unavailable".to_string(),
            },
            rendered: Some(render(38, true)),
            updated_targets: vec![WidgetId::new("default")],
            ..EventOutcome::new("sample")
        };

        let lines = outcome_lines(&outcome);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "History:   write failed: history store is unavailable");
        assert!(lines[2].starts_with("Widget:    ["));
        assert_eq!(lines.join("\n").matches("38%").count(), 1);
    }

    #[test]
    fn test_outcome_lines_skip_not_applicable_history() {
        let lines = outcome_lines(&EventOutcome::new("low"));
        assert_eq!(lines, vec!["Event:     low".to_string()]);
    }

    #[test]
    fn test_empty_refresh_uses_configured_targets() {
        let config = UserConfig::parse("[widgets]\ntargets = [\"bar\", \"dock\"]\n");
        let event = with_default_targets(
            MonitorEvent::WidgetRefreshRequest { target_ids: vec![] },
            &config,
        );

        assert_eq!(
            event,
            MonitorEvent::WidgetRefreshRequest {
                target_ids: vec![WidgetId::new("bar"), WidgetId::new("dock")],
            }
        );
    }

    #[test]
    fn test_explicit_refresh_targets_are_kept() {
        let config = UserConfig::default();
        let requested = MonitorEvent::WidgetRefreshRequest {
            target_ids: vec![WidgetId::new("missing")],
        };

        assert_eq!(with_default_targets(requested.clone(), &config), requested);
        assert_eq!(with_default_targets(MonitorEvent::Low, &config), MonitorEvent::Low);
    }

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&[]), "");
        assert_eq!(
            join_ids(&[WidgetId::new("a"), WidgetId::new("b")]),
            "a, b"
        );
    }
}
