//! Battery sampling traits and the `starship-battery` backed source.

use color_eyre::eyre::{eyre, Result};
use gauge_protocol::{BatteryStatus, PluggedSource, RawSample};
use starship_battery::units::electric_potential::millivolt;
use starship_battery::units::energy::watt_hour;
use starship_battery::units::thermodynamic_temperature::degree_celsius;
use starship_battery::{Manager, State, Technology};

use crate::power_supply;

/// Something that can produce raw power-state samples on demand.
pub trait SampleSource {
    /// Read the current state. Fields the source cannot report stay `None`.
    fn sample(&mut self) -> Result<RawSample>;
}

/// Reads the first battery the OS exposes.
///
/// The raw level/scale pair is remaining energy over full-charge energy in
/// milliwatt-hours, so normalization does the percentage math.
pub struct SystemBattery {
    manager: Manager,
}

impl SystemBattery {
    pub fn new() -> Result<Self> {
        let manager = Manager::new()?;
        Ok(Self { manager })
    }

    /// Check if a battery is available on this system.
    pub fn is_available() -> bool {
        Manager::new()
            .ok()
            .and_then(|m| m.batteries().ok())
            .and_then(|mut b| b.next())
            .and_then(|b| b.ok())
            .is_some()
    }
}

impl SampleSource for SystemBattery {
    fn sample(&mut self) -> Result<RawSample> {
        let mut battery = self
            .manager
            .batteries()?
            .next()
            .ok_or_else(|| eyre!("No battery found"))??;

        self.manager.refresh(&mut battery)?;

        let energy_mwh = (battery.energy().get::<watt_hour>() * 1000.0).round() as i32;
        let full_mwh = (battery.energy_full().get::<watt_hour>() * 1000.0).round() as i32;
        let state = battery.state();

        Ok(RawSample {
            level: Some(energy_mwh),
            scale: Some(full_mwh),
            status: Some(status_code(state)),
            plugged: plugged_code(state),
            voltage: Some(battery.voltage().get::<millivolt>().round() as i32),
            temperature: battery
                .temperature()
                .map(|t| (t.get::<degree_celsius>() * 10.0).round() as i32),
            technology: technology_label(battery.technology()).map(str::to_string),
            health: None,
        })
    }
}

fn status_code(state: State) -> i32 {
    let status = match state {
        State::Charging => BatteryStatus::Charging,
        State::Discharging | State::Empty => BatteryStatus::Discharging,
        State::Full => BatteryStatus::Full,
        _ => BatteryStatus::Unknown,
    };
    status.code()
}

fn plugged_code(state: State) -> Option<i32> {
    if let Some(source) = power_supply::online_source() {
        return Some(source.code());
    }
    match state {
        State::Discharging | State::Empty => Some(PluggedSource::None.code()),
        _ => None,
    }
}

fn technology_label(technology: Technology) -> Option<&'static str> {
    match technology {
        Technology::LithiumIon => Some("Li-ion"),
        Technology::LithiumPolymer => Some("Li-poly"),
        Technology::LithiumIronPhosphate => Some("LiFePO4"),
        Technology::NickelMetalHydride => Some("NiMH"),
        Technology::NickelCadmium => Some("NiCd"),
        Technology::NickelZinc => Some("NiZn"),
        Technology::LeadAcid => Some("Lead-acid"),
        Technology::RechargeableAlkalineManganese => Some("RAM"),
        _ => None,
    }
}
