mod daemon;
mod history;

pub use daemon::DaemonCommands;
pub use history::HistoryCommands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gauge_protocol::{BatteryHealth, BatteryStatus, PluggedSource, RawSample};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the cached battery snapshot and widget (default)
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Submit a raw battery sample
    Sample(SampleArgs),

    /// Re-render widgets from the cached snapshot
    Refresh {
        /// Widget targets to refresh (defaults to every configured target)
        targets: Vec<String>,
    },

    /// Send a low/okay threshold signal
    Notify {
        #[arg(value_enum)]
        signal: Signal,
    },

    /// Show or edit configuration
    Config {
        /// Print config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },

    /// Manage the background daemon
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// View and manage recorded history
    History {
        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },
}

#[derive(Debug, Args)]
pub struct SampleArgs {
    /// Raw level reading
    #[arg(short, long, allow_negative_numbers = true)]
    pub level: i32,

    /// Scale the level is measured against
    #[arg(short, long, default_value_t = 100, allow_negative_numbers = true)]
    pub scale: i32,

    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,

    #[arg(long, value_enum)]
    pub plugged: Option<PluggedArg>,

    /// Millivolts
    #[arg(long)]
    pub voltage: Option<i32>,

    /// Tenths of a degree Celsius
    #[arg(long, allow_negative_numbers = true)]
    pub temperature: Option<i32>,

    #[arg(long)]
    pub technology: Option<String>,

    #[arg(long, value_enum)]
    pub health: Option<HealthArg>,
}

impl SampleArgs {
    pub fn to_raw(&self) -> RawSample {
        RawSample {
            level: Some(self.level),
            scale: Some(self.scale),
            status: self.status.map(|s| BatteryStatus::from(s).code()),
            plugged: self.plugged.map(|p| PluggedSource::from(p).code()),
            voltage: self.voltage,
            temperature: self.temperature,
            technology: self.technology.clone(),
            health: self.health.map(|h| BatteryHealth::from(h).code()),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Signal {
    Low,
    Okay,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

impl From<StatusArg> for BatteryStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Unknown => BatteryStatus::Unknown,
            StatusArg::Charging => BatteryStatus::Charging,
            StatusArg::Discharging => BatteryStatus::Discharging,
            StatusArg::NotCharging => BatteryStatus::NotCharging,
            StatusArg::Full => BatteryStatus::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PluggedArg {
    None,
    Ac,
    Usb,
    Wireless,
}

impl From<PluggedArg> for PluggedSource {
    fn from(arg: PluggedArg) -> Self {
        match arg {
            PluggedArg::None => PluggedSource::None,
            PluggedArg::Ac => PluggedSource::Ac,
            PluggedArg::Usb => PluggedSource::Usb,
            PluggedArg::Wireless => PluggedSource::Wireless,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HealthArg {
    Unknown,
    Good,
    Overheat,
    Dead,
    OverVoltage,
    Cold,
    Failure,
}

impl From<HealthArg> for BatteryHealth {
    fn from(arg: HealthArg) -> Self {
        match arg {
            HealthArg::Unknown => BatteryHealth::Unknown,
            HealthArg::Good => BatteryHealth::Good,
            HealthArg::Overheat => BatteryHealth::Overheat,
            HealthArg::Dead => BatteryHealth::Dead,
            HealthArg::OverVoltage => BatteryHealth::OverVoltage,
            HealthArg::Cold => BatteryHealth::Cold,
            HealthArg::Failure => BatteryHealth::Failure,
        }
    }
}

/// Battery level cache, history and status bar widgets
#[derive(Debug, Parser)]
#[command(name = "gauge", version, verbatim_doc_comment)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}
