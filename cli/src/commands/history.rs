use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::eyre::{eyre, Result};
use gauge_protocol::HistoryEntry;

use crate::cli::HistoryCommands;
use crate::config::UserConfig;
use crate::daemon::{is_daemon_running, DaemonClient};
use crate::data::history_store::{days_before, now_millis};
use crate::data::HistoryStore;

pub fn run(command: Option<HistoryCommands>, config: &UserConfig) -> Result<()> {
    let cmd = command.unwrap_or(HistoryCommands::List {
        limit: 20,
        since: None,
    });

    match cmd {
        HistoryCommands::List { limit, since } => {
            let entries = load_entries(since.as_deref(), Some(limit))?;

            if entries.is_empty() {
                println!("No history recorded.");
                if !config.history.enabled {
                    println!("\nHistory recording is disabled in the config.");
                }
                return Ok(());
            }

            println!(
                "{:<20} {:>6}  {:<13} {:<9} {:>9}",
                "Time", "Level", "Status", "Plugged", "Voltage"
            );
            println!("{}", "-".repeat(62));
            for entry in &entries {
                let voltage = if entry.voltage < 0 {
                    "-".to_string()
                } else {
                    format!("{} mV", entry.voltage)
                };
                println!(
                    "{:<20} {:>5}%  {:<13} {:<9} {:>9}",
                    format_timestamp(entry.timestamp),
                    entry.level,
                    entry.status.label(),
                    entry.plugged.label(),
                    voltage
                );
            }
        }
        HistoryCommands::Export {
            output,
            format,
            since,
        } => {
            let entries = load_entries(since.as_deref(), None)?;

            let content = match format.to_lowercase().as_str() {
                "csv" => export_to_csv(&entries),
                "json" => serde_json::to_string_pretty(&entries)?,
                other => return Err(eyre!("Unknown export format: {}", other)),
            };

            if let Some(path) = output {
                std::fs::write(&path, &content)?;
                println!("Exported {} entries to: {}", entries.len(), path);
            } else {
                println!("{}", content);
            }
        }
        HistoryCommands::Stats => {
            let store = open_store()?;
            let stats = store.stats()?;

            println!("History Database");
            println!("{}", "=".repeat(40));
            println!("Path:        {}", store.path().display());
            println!("Recording:   {}", if config.history.enabled { "on" } else { "off" });
            println!("Retention:   {} days", config.history.retention_days);
            println!("Entries:     {}", stats.entry_count);
            println!("Size:        {}", stats.size_formatted());
            if let Some(oldest) = stats.oldest {
                println!("Oldest:      {}", format_timestamp(oldest));
            }
            if let Some(latest) = store.reader()?.latest()? {
                println!(
                    "Latest:      {} ({}%, {})",
                    format_timestamp(latest.timestamp),
                    latest.level,
                    latest.status.label()
                );
            }
        }
        HistoryCommands::Prune { older_than, yes } => {
            let days = older_than.unwrap_or(config.history.retention_days);
            if days == 0 {
                println!("Retention is 0 days; nothing to prune.");
                return Ok(());
            }
            let cutoff = days_before(now_millis(), days);

            let store = open_store()?;
            let stats = store.stats()?;
            println!("Current database stats:");
            println!("  Entries: {}", stats.entry_count);
            println!("  Size: {}", stats.size_formatted());
            println!(
                "\nWill delete entries older than {} days (before {})",
                days,
                format_timestamp(cutoff)
            );

            if !yes && !confirm()? {
                println!("Cancelled.");
                return Ok(());
            }

            let writer = store.writer();
            let deleted = writer.delete_before(cutoff)?;
            println!("\nDeleted {} entries.", deleted);

            if let Err(e) = writer.vacuum() {
                eprintln!("Warning: vacuum failed: {}", e);
            } else {
                println!("Database vacuumed to reclaim space.");
            }
        }
        HistoryCommands::Clear { yes } => {
            let store = open_store()?;
            let stats = store.stats()?;
            println!("This will delete all {} history entries.", stats.entry_count);

            if !yes && !confirm()? {
                println!("Cancelled.");
                return Ok(());
            }

            let writer = store.writer();
            let deleted = writer.clear()?;
            if let Err(e) = writer.vacuum() {
                eprintln!("Warning: vacuum failed: {}", e);
            }
            println!("Deleted {} entries.", deleted);
        }
    }

    Ok(())
}

fn confirm() -> Result<bool> {
    print!("Proceed? [y/N] ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn open_store() -> Result<HistoryStore> {
    HistoryStore::open().map_err(|e| eyre!("Failed to open history database: {}", e))
}

/// Ask the daemon first so reads never contend with its writer; fall back
/// to the database file.
fn load_entries(since: Option<&str>, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
    let cutoff = since.map(|s| parse_since(s, now_millis())).transpose()?;

    if is_daemon_running() {
        match DaemonClient::connect().and_then(|mut c| c.get_history(cutoff)) {
            Ok(entries) => return Ok(keep_newest(entries, limit)),
            Err(e) => tracing::warn!(error = %e, "daemon history unavailable, reading database"),
        }
    }

    read_local(&open_store()?, cutoff, limit)
}

fn read_local(
    store: &HistoryStore,
    cutoff: Option<i64>,
    limit: Option<usize>,
) -> Result<Vec<HistoryEntry>> {
    let entries = match (cutoff, limit) {
        (Some(cutoff), _) => store.reader()?.entries_since(cutoff)?,
        (None, Some(limit)) => store.reader()?.recent(limit)?,
        (None, None) => store.query()?,
    };
    Ok(keep_newest(entries, limit))
}

/// Trim an ascending list to its newest `limit` entries.
fn keep_newest(mut entries: Vec<HistoryEntry>, limit: Option<usize>) -> Vec<HistoryEntry> {
    if let Some(limit) = limit {
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
    }
    entries
}

/// Resolve a `--since` argument to a millisecond cutoff.
///
/// Accepts a humantime duration counted back from `now` or a UTC date.
pub fn parse_since(input: &str, now: i64) -> Result<i64> {
    let input = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let start = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| eyre!("Invalid date: {}", input))?;
        return Ok(start.and_utc().timestamp_millis());
    }

    let duration: Duration = humantime::parse_duration(input)
        .map_err(|e| eyre!("Invalid --since value '{}': {}", input, e))?;
    let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
    Ok(now.saturating_sub(millis))
}

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn export_to_csv(entries: &[HistoryEntry]) -> String {
    let mut output = String::new();

    output.push_str("timestamp,time,level,status,plugged,voltage_mv,health\n");
    for entry in entries {
        output.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            entry.timestamp,
            format_timestamp(entry.timestamp),
            entry.level,
            escape_csv(entry.status.label()),
            escape_csv(entry.plugged.label()),
            entry.voltage,
            escape_csv(entry.health.label())
        ));
    }

    output
}

pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        let escaped = s.replace('"', "\"\"").replace('\n', " ");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}
