//! Raw platform samples to canonical snapshots.
//!
//! `normalize` is total: anything missing or out of range degrades to the
//! sentinels in `gauge_protocol` instead of failing.

use gauge_protocol::{
    BatteryHealth, BatterySnapshot, BatteryStatus, PluggedSource, RawSample, DEFAULT_LEVEL,
    TECHNOLOGY_UNAVAILABLE, UNAVAILABLE,
};

/// Scale assumed when the platform reports a level without one.
pub const DEFAULT_SCALE: i32 = 100;

pub fn normalize(raw: &RawSample) -> BatterySnapshot {
    let level = match raw.level {
        Some(level) => normalize_level(level, raw.scale.unwrap_or(DEFAULT_SCALE)),
        None => DEFAULT_LEVEL,
    };

    BatterySnapshot {
        level,
        status: raw
            .status
            .map(BatteryStatus::from_code)
            .unwrap_or_default(),
        plugged: raw
            .plugged
            .map(PluggedSource::from_code)
            .unwrap_or_default(),
        voltage: match raw.voltage {
            Some(mv) if mv >= 0 => mv,
            _ => UNAVAILABLE,
        },
        temperature: raw.temperature.unwrap_or(UNAVAILABLE),
        technology: normalize_technology(raw.technology.as_deref()),
        health: raw
            .health
            .map(BatteryHealth::from_code)
            .unwrap_or_default(),
    }
}

/// `round(raw / scale * 100)` clamped to 0-100, or [`DEFAULT_LEVEL`] when
/// `scale` is not positive.
pub fn normalize_level(raw: i32, scale: i32) -> i32 {
    if scale <= 0 {
        return DEFAULT_LEVEL;
    }

    let percent = (raw as f64 / scale as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as i32
}

fn normalize_technology(technology: Option<&str>) -> String {
    match technology.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => TECHNOLOGY_UNAVAILABLE.to_string(),
    }
}

/// The raw form of a snapshot, as a platform reporting on a 0-100 scale
/// would deliver it.
#[cfg(test)]
pub fn to_raw(snapshot: &BatterySnapshot) -> RawSample {
    RawSample {
        level: Some(snapshot.level),
        scale: Some(DEFAULT_SCALE),
        status: Some(snapshot.status.code()),
        plugged: Some(snapshot.plugged.code()),
        voltage: Some(snapshot.voltage),
        temperature: Some(snapshot.temperature),
        technology: Some(snapshot.technology.clone()),
        health: Some(snapshot.health.code()),
    }
}
