//! Side effects for the LOW and OKAY monitor signals.

use std::io;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::AlertConfig;

pub trait AlertSink {
    /// The level dropped below the low mark.
    fn low(&mut self);

    /// The level recovered after a low.
    fn okay(&mut self);
}

/// Runs the configured shell command for each signal, or just logs it.
pub struct CommandAlerts {
    on_low: Option<String>,
    on_okay: Option<String>,
}

impl CommandAlerts {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            on_low: non_empty(config.on_low.as_deref()),
            on_okay: non_empty(config.on_okay.as_deref()),
        }
    }

    fn run(&self, event: &str, command: Option<&str>) {
        let Some(command) = command else {
            debug!(event, "No alert command configured");
            return;
        };

        match spawn_shell(event, command) {
            Ok(()) => debug!(event, command, "Alert command started"),
            Err(e) => warn!(event, command, error = %e, "Failed to run alert command"),
        }
    }
}

impl AlertSink for CommandAlerts {
    fn low(&mut self) {
        info!("Battery low");
        self.run("LOW", self.on_low.as_deref());
    }

    fn okay(&mut self) {
        info!("Battery okay");
        self.run("OKAY", self.on_okay.as_deref());
    }
}

fn non_empty(command: Option<&str>) -> Option<String> {
    command
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Start `sh -c command` with `GAUGE_EVENT` set and reap it off-thread.
fn spawn_shell(event: &str, command: &str) -> io::Result<()> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("GAUGE_EVENT", event)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let event = event.to_string();
    std::thread::spawn(move || match child.wait() {
        Ok(status) if !status.success() => {
            warn!(event = %event, %status, "Alert command exited with failure")
        }
        Ok(_) => {}
        Err(e) => warn!(event = %event, error = %e, "Failed to wait for alert command"),
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_commands_are_ignored() {
        let alerts = CommandAlerts::new(&AlertConfig {
            on_low: Some("   ".to_string()),
            on_okay: Some(" notify-send ok ".to_string()),
        });
        assert_eq!(alerts.on_low, None);
        assert_eq!(alerts.on_okay.as_deref(), Some("notify-send ok"));
    }

    #[test]
    fn test_command_sees_event_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("event");

        let mut alerts = CommandAlerts::new(&AlertConfig {
            on_low: Some(format!("printf '%s' \"$GAUGE_EVENT\" > '{}'", out.display())),
            on_okay: None,
        });
        alerts.low();
        alerts.okay();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while std::fs::read_to_string(&out).map(|s| s.is_empty()).unwrap_or(true) {
            assert!(std::time::Instant::now() < deadline, "alert command never ran");
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "LOW");
    }
}
