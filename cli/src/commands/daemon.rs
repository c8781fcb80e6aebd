use std::time::Duration;

use bytesize::ByteSize;
use color_eyre::eyre::{eyre, Result};

use crate::cli::DaemonCommands;
use crate::config::{runtime_dir, LogLevel};
use crate::daemon::{is_daemon_running, run_daemon, socket_path, DaemonClient};
use crate::logging::{self, LogMode};

pub fn run(
    command: DaemonCommands,
    log_level: LogLevel,
    log_level_override: Option<LogLevel>,
) -> Result<()> {
    match command {
        DaemonCommands::Start { foreground } => {
            if is_daemon_running() {
                println!("Daemon is already running.");
                return Ok(());
            }

            if foreground {
                let _guard = logging::init(log_level, LogMode::Both, log_level_override);
                println!("Starting daemon in foreground...");
                println!("Press Ctrl+C to stop.");
                run_daemon(true, log_level, log_level_override).map_err(|e| eyre!("{}", e))?;
            } else {
                println!("Starting daemon...");
                run_daemon(false, log_level, log_level_override).map_err(|e| eyre!("{}", e))?;
                std::thread::sleep(Duration::from_millis(500));

                let mut started = false;
                for _ in 0..3 {
                    if is_daemon_running() {
                        started = true;
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(200));
                }

                if started {
                    println!("Daemon started successfully.");
                    println!("Socket: {:?}", socket_path());
                } else {
                    println!("Daemon may have failed to start. Check logs in:");
                    println!("  {}", runtime_dir().display());
                }
            }
        }
        DaemonCommands::Stop => {
            if !is_daemon_running() {
                println!("Daemon is not running.");
                return Ok(());
            }

            let mut client = DaemonClient::connect().map_err(|e| eyre!("{}", e))?;
            client.shutdown().map_err(|e| eyre!("{}", e))?;
            println!("Daemon stopped.");
        }
        DaemonCommands::Status => {
            println!("Daemon Status");
            println!("{}", "-".repeat(40));

            if !is_daemon_running() {
                println!("Running:      no");
                return Ok(());
            }

            let mut client = DaemonClient::connect_with_version_check().map_err(|e| eyre!("{}", e))?;
            let status = client.get_status().map_err(|e| eyre!("{}", e))?;

            println!("Running:      yes");
            println!("Version:      {}", status.version);
            println!(
                "Uptime:       {}",
                humantime::format_duration(Duration::from_secs(status.uptime_secs))
            );
            println!("Events:       {}", status.events_handled);
            println!(
                "History:      {} ({} entries)",
                if status.history_enabled { "on" } else { "off" },
                status.history_entries
            );
            println!("Database:     {}", ByteSize::b(status.database_size_bytes));
            if let Some(last) = status.last_entry_time {
                if let Some(dt) = chrono::DateTime::from_timestamp_millis(last) {
                    println!("Last entry:   {}", dt.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            let targets: Vec<&str> = status.widget_targets.iter().map(|t| t.as_str()).collect();
            println!("Widgets:      {}", targets.join(", "));
        }
    }

    Ok(())
}
