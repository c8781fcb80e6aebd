use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use gauge_protocol::WidgetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }

    pub fn as_tracing_level(&self) -> Option<tracing::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Trace => Some(tracing::Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Entries older than this are pruned by the daemon. 0 keeps everything.
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
    pub low_level: i32,
    pub okay_level: i32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            low_level: 15,
            okay_level: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub targets: Vec<String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            targets: vec!["default".to_string()],
        }
    }
}

impl WidgetConfig {
    pub fn target_ids(&self) -> Vec<WidgetId> {
        self.targets
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(WidgetId::from)
            .collect()
    }
}

/// Shell commands run for the low/okay signals. Unset means log only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub on_low: Option<String>,
    pub on_okay: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub log_level: LogLevel,
    pub history: HistoryConfig,
    pub monitor: MonitorConfig,
    pub widgets: WidgetConfig,
    pub alerts: AlertConfig,
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("gauge")
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("gauge")
}

pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("gauge")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn widgets_dir() -> PathBuf {
    runtime_dir().join("widgets")
}

pub fn ensure_dirs() -> std::io::Result<()> {
    fs::create_dir_all(config_dir())?;
    fs::create_dir_all(data_dir())?;
    fs::create_dir_all(runtime_dir())?;
    Ok(())
}

impl UserConfig {
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(content: &str) -> Self {
        toml::from_str(content).unwrap_or_default()
    }

    pub fn save(&self) -> std::io::Result<()> {
        let _ = ensure_dirs();
        let path = config_path();
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = UserConfig::parse(
            r#"
            log_level = "debug"

            [history]
            retention_days = 7
            "#,
        );

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.history.retention_days, 7);
        assert!(config.history.enabled);
        assert_eq!(config.monitor.low_level, 15);
        assert_eq!(config.widgets.targets, vec!["default".to_string()]);
        assert!(config.alerts.on_low.is_none());
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let config = UserConfig::parse("history = 12");
        assert_eq!(config.history.retention_days, 30);
        assert_eq!(config.monitor.poll_interval_secs, 30);
    }

    #[test]
    fn test_blank_widget_targets_are_dropped() {
        let widgets = WidgetConfig {
            targets: vec!["bar".to_string(), "  ".to_string(), " dock ".to_string()],
        };
        assert_eq!(
            widgets.target_ids(),
            vec![WidgetId::new("bar"), WidgetId::new("dock")]
        );
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("TRACE"), LogLevel::Trace);
        assert_eq!(LogLevel::from_str("off"), LogLevel::Off);
        assert_eq!(LogLevel::from_str("nonsense"), LogLevel::Warn);
        assert!(LogLevel::Off.as_tracing_level().is_none());
    }
}
