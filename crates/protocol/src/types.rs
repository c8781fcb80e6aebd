use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::{MIN_SUPPORTED_VERSION, PROTOCOL_VERSION};

/// Level used when the platform reports no usable scale.
pub const DEFAULT_LEVEL: i32 = 50;

/// Sentinel for integer readings the platform did not report.
pub const UNAVAILABLE: i32 = -1;

/// Sentinel for an unreported battery technology.
pub const TECHNOLOGY_UNAVAILABLE: &str = "N/A";

/// Charging status, numbered like the platform battery broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatteryStatus {
    #[default]
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

impl BatteryStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => BatteryStatus::Charging,
            3 => BatteryStatus::Discharging,
            4 => BatteryStatus::NotCharging,
            5 => BatteryStatus::Full,
            _ => BatteryStatus::Unknown,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            BatteryStatus::Unknown => 1,
            BatteryStatus::Charging => 2,
            BatteryStatus::Discharging => 3,
            BatteryStatus::NotCharging => 4,
            BatteryStatus::Full => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatteryStatus::Unknown => "Unknown",
            BatteryStatus::Charging => "Charging",
            BatteryStatus::Discharging => "Discharging",
            BatteryStatus::NotCharging => "Not Charging",
            BatteryStatus::Full => "Full",
        }
    }

    /// Full counts as charging: the device is still on external power.
    pub fn is_charging(&self) -> bool {
        matches!(self, BatteryStatus::Charging | BatteryStatus::Full)
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// External power source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PluggedSource {
    #[default]
    None,
    Ac,
    Usb,
    Wireless,
}

impl PluggedSource {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PluggedSource::Ac,
            2 => PluggedSource::Usb,
            4 => PluggedSource::Wireless,
            _ => PluggedSource::None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            PluggedSource::None => 0,
            PluggedSource::Ac => 1,
            PluggedSource::Usb => 2,
            PluggedSource::Wireless => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PluggedSource::None => "On Battery",
            PluggedSource::Ac => "AC",
            PluggedSource::Usb => "USB",
            PluggedSource::Wireless => "Wireless",
        }
    }
}

impl fmt::Display for PluggedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Battery health as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatteryHealth {
    #[default]
    Unknown,
    Good,
    Overheat,
    Dead,
    OverVoltage,
    Cold,
    Failure,
}

impl BatteryHealth {
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => BatteryHealth::Good,
            3 => BatteryHealth::Overheat,
            4 => BatteryHealth::Dead,
            5 => BatteryHealth::OverVoltage,
            6 => BatteryHealth::Failure,
            7 => BatteryHealth::Cold,
            _ => BatteryHealth::Unknown,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            BatteryHealth::Unknown => 1,
            BatteryHealth::Good => 2,
            BatteryHealth::Overheat => 3,
            BatteryHealth::Dead => 4,
            BatteryHealth::OverVoltage => 5,
            BatteryHealth::Failure => 6,
            BatteryHealth::Cold => 7,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatteryHealth::Unknown => "Unknown",
            BatteryHealth::Good => "Good",
            BatteryHealth::Overheat => "Overheat",
            BatteryHealth::Dead => "Dead",
            BatteryHealth::OverVoltage => "Over Voltage",
            BatteryHealth::Cold => "Cold",
            BatteryHealth::Failure => "Failure",
        }
    }
}

impl fmt::Display for BatteryHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One normalized, point-in-time reading of power-supply state.
///
/// `level` is always within 0-100. Readings the platform did not report
/// carry the [`UNAVAILABLE`] / [`TECHNOLOGY_UNAVAILABLE`] sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatterySnapshot {
    pub level: i32,
    pub status: BatteryStatus,
    pub plugged: PluggedSource,
    /// Millivolts.
    pub voltage: i32,
    /// Tenths of a degree Celsius.
    pub temperature: i32,
    pub technology: String,
    pub health: BatteryHealth,
}

impl Default for BatterySnapshot {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            status: BatteryStatus::Unknown,
            plugged: PluggedSource::None,
            voltage: UNAVAILABLE,
            temperature: UNAVAILABLE,
            technology: TECHNOLOGY_UNAVAILABLE.to_string(),
            health: BatteryHealth::Unknown,
        }
    }
}

impl BatterySnapshot {
    pub fn is_charging(&self) -> bool {
        self.status.is_charging()
    }

    pub fn temperature_celsius(&self) -> Option<String> {
        if self.temperature == UNAVAILABLE {
            return None;
        }
        Some(format!("{:.1}°C", self.temperature as f32 / 10.0))
    }

    pub fn voltage_formatted(&self) -> Option<String> {
        if self.voltage == UNAVAILABLE {
            return None;
        }
        Some(format!("{} mV", self.voltage))
    }
}

/// A persisted history row. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Milliseconds since the Unix epoch; unique per entry.
    pub timestamp: i64,
    pub level: i32,
    pub status: BatteryStatus,
    pub plugged: PluggedSource,
    pub voltage: i32,
    pub health: BatteryHealth,
}

impl HistoryEntry {
    pub fn from_snapshot(timestamp: i64, snapshot: &BatterySnapshot) -> Self {
        Self {
            timestamp,
            level: snapshot.level,
            status: snapshot.status,
            plugged: snapshot.plugged,
            voltage: snapshot.voltage,
            health: snapshot.health,
        }
    }

    /// Entry carrying only the level, as rows migrated from the legacy layout do.
    pub fn level_only(timestamp: i64, level: i32) -> Self {
        Self {
            timestamp,
            level,
            status: BatteryStatus::Unknown,
            plugged: PluggedSource::None,
            voltage: UNAVAILABLE,
            health: BatteryHealth::Unknown,
        }
    }
}

/// Opaque identifier of a display target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(String);

impl WidgetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WidgetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The single visible battery element of a rendered widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualElement {
    /// Near-empty shell shown for levels 0-9.
    Base,
    /// One of the ten 10%-wide tiers, numbered 1-10.
    Tier(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    /// Collapsed: takes no layout space.
    Gone,
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible)
    }
}

/// Render-ready widget state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualState {
    pub element: VisualElement,
    pub charging_overlay: Visibility,
    pub label: String,
}

impl VisualState {
    pub fn tier(&self) -> Option<u8> {
        match self.element {
            VisualElement::Tier(tier) => Some(tier),
            VisualElement::Base => None,
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self.element, VisualElement::Base)
    }

    /// One-line battery glyph, e.g. `[███░░░░░░░] 38% ⚡`.
    pub fn to_text(&self) -> String {
        let body = match self.element {
            VisualElement::Base => format!("!{}", "░".repeat(9)),
            VisualElement::Tier(tier) => {
                let filled = tier.min(10) as usize;
                format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
            }
        };

        let mut text = format!("[{}] {}", body, self.label);
        if self.charging_overlay.is_visible() {
            text.push_str(" ⚡");
        }
        text
    }
}

/// What the history step of an event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryWrite {
    Appended { row_id: i64 },
    /// Level matched the cached snapshot; nothing to record.
    Unchanged,
    /// An entry already exists for this timestamp; the first one was kept.
    Duplicate { timestamp: i64 },
    Failed { reason: String },
    /// Recording is turned off in the configuration.
    Disabled,
    /// The event never touches history.
    NotApplicable,
}

/// Result of handling one monitor event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub event: String,
    pub history: HistoryWrite,
    pub rendered: Option<VisualState>,
    #[serde(default)]
    pub updated_targets: Vec<WidgetId>,
    #[serde(default)]
    pub skipped_targets: Vec<WidgetId>,
}

impl EventOutcome {
    pub fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            history: HistoryWrite::NotApplicable,
            rendered: None,
            updated_targets: Vec::new(),
            skipped_targets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub version: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
    #[serde(default = "default_min_supported_version")]
    pub min_supported_version: u32,
    pub events_handled: u64,
    pub history_entries: i64,
    pub last_entry_time: Option<i64>,
    pub database_size_bytes: u64,
    pub history_enabled: bool,
    #[serde(default)]
    pub widget_targets: Vec<WidgetId>,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            running: false,
            uptime_secs: 0,
            version: String::new(),
            protocol_version: PROTOCOL_VERSION,
            min_supported_version: MIN_SUPPORTED_VERSION,
            events_handled: 0,
            history_entries: 0,
            last_entry_time: None,
            database_size_bytes: 0,
            history_enabled: true,
            widget_targets: Vec::new(),
        }
    }
}

fn default_protocol_version() -> u32 {
    PROTOCOL_VERSION
}

fn default_min_supported_version() -> u32 {
    MIN_SUPPORTED_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for code in 1..=5 {
            assert_eq!(BatteryStatus::from_code(code).code(), code);
        }
        assert_eq!(BatteryStatus::from_code(99), BatteryStatus::Unknown);
        assert_eq!(BatteryStatus::from_code(-1), BatteryStatus::Unknown);
    }

    #[test]
    fn test_plugged_codes() {
        assert_eq!(PluggedSource::from_code(0), PluggedSource::None);
        assert_eq!(PluggedSource::from_code(1), PluggedSource::Ac);
        assert_eq!(PluggedSource::from_code(2), PluggedSource::Usb);
        assert_eq!(PluggedSource::from_code(4), PluggedSource::Wireless);
        assert_eq!(PluggedSource::from_code(3), PluggedSource::None);
    }

    #[test]
    fn test_health_codes() {
        assert_eq!(BatteryHealth::from_code(6), BatteryHealth::Failure);
        assert_eq!(BatteryHealth::from_code(7), BatteryHealth::Cold);
        for code in 1..=7 {
            assert_eq!(BatteryHealth::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_is_charging_includes_full() {
        assert!(BatteryStatus::Charging.is_charging());
        assert!(BatteryStatus::Full.is_charging());
        assert!(!BatteryStatus::Discharging.is_charging());
        assert!(!BatteryStatus::NotCharging.is_charging());
        assert!(!BatteryStatus::Unknown.is_charging());
    }

    #[test]
    fn test_default_snapshot_uses_sentinels() {
        let snapshot = BatterySnapshot::default();
        assert_eq!(snapshot.level, DEFAULT_LEVEL);
        assert_eq!(snapshot.voltage, UNAVAILABLE);
        assert_eq!(snapshot.technology, "N/A");
        assert_eq!(snapshot.temperature_celsius(), None);
        assert_eq!(snapshot.voltage_formatted(), None);
    }

    #[test]
    fn test_temperature_formatting() {
        let snapshot = BatterySnapshot {
            temperature: 305,
            ..BatterySnapshot::default()
        };
        assert_eq!(snapshot.temperature_celsius().as_deref(), Some("30.5°C"));
    }

    #[test]
    fn test_visual_state_text() {
        let charging = VisualState {
            element: VisualElement::Tier(3),
            charging_overlay: Visibility::Visible,
            label: "38%".to_string(),
        };
        assert_eq!(charging.to_text(), "[███░░░░░░░] 38% ⚡");

        let empty = VisualState {
            element: VisualElement::Base,
            charging_overlay: Visibility::Gone,
            label: "4%".to_string(),
        };
        assert_eq!(empty.to_text(), "[!░░░░░░░░░] 4%");
    }
}
