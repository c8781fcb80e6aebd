//! External power source detection from sysfs.

use gauge_protocol::PluggedSource;

#[cfg(target_os = "linux")]
const POWER_SUPPLY_PATH: &str = "/sys/class/power_supply";

/// The online external supply, if the platform exposes one.
#[cfg(target_os = "linux")]
pub fn online_source() -> Option<PluggedSource> {
    use std::fs;
    use std::path::Path;

    let power_supply = Path::new(POWER_SUPPLY_PATH);
    let entries = fs::read_dir(power_supply).ok()?;

    let mut any_supply = false;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(kind) = fs::read_to_string(path.join("type")) else {
            continue;
        };
        let source = match supply_source(kind.trim()) {
            Some(source) => source,
            None => continue,
        };
        any_supply = true;

        let online = fs::read_to_string(path.join("online"))
            .map(|s| s.trim() == "1")
            .unwrap_or(false);
        if online {
            return Some(source);
        }
    }

    any_supply.then_some(PluggedSource::None)
}

#[cfg(not(target_os = "linux"))]
pub fn online_source() -> Option<PluggedSource> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn supply_source(kind: &str) -> Option<PluggedSource> {
    match kind {
        "Mains" => Some(PluggedSource::Ac),
        "USB" | "USB_C" | "USB_PD" | "USB_DCP" | "USB_CDP" => Some(PluggedSource::Usb),
        "Wireless" => Some(PluggedSource::Wireless),
        _ => None,
    }
}
