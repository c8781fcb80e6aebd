mod alerts;
mod cli;
mod commands;
mod config;
mod daemon;
mod data;
mod logging;
mod widget;

use clap::Parser;
use color_eyre::eyre::Result;
use gauge_protocol::{MonitorEvent, WidgetId};

use cli::{Cli, Commands, Signal};
use config::{ensure_dirs, LogLevel, UserConfig};
use logging::LogMode;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = ensure_dirs();

    let cli = Cli::parse();
    let config = UserConfig::load();
    let log_level_override = cli.log_level.as_deref().map(LogLevel::from_str);

    match cli.command {
        Some(Commands::Daemon { command }) => {
            commands::daemon::run(command, config.log_level, log_level_override)
        }
        Some(Commands::Sample(args)) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            let event = MonitorEvent::SampleArrived {
                sample: args.to_raw(),
            };
            commands::event::run(event, &config)
        }
        Some(Commands::Refresh { targets }) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            let event = MonitorEvent::WidgetRefreshRequest {
                target_ids: parse_targets(&targets),
            };
            commands::event::run(event, &config)
        }
        Some(Commands::Notify { signal }) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            let event = match signal {
                Signal::Low => MonitorEvent::Low,
                Signal::Okay => MonitorEvent::Okay,
            };
            commands::event::run(event, &config)
        }
        Some(Commands::Config { path, reset, edit }) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            commands::config::run(path, reset, edit)
        }
        Some(Commands::History { command }) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            commands::history::run(command, &config)
        }
        Some(Commands::Status { json }) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            commands::status::run(json)
        }
        None => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            commands::status::run(false)
        }
    }
}

fn parse_targets(targets: &[String]) -> Vec<WidgetId> {
    targets
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(WidgetId::from)
        .collect()
}
