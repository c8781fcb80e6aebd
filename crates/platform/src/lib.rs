//! Host-side monitor for gauge.
//!
//! Reads the machine's battery into the same raw, unnormalized shape a
//! platform battery broadcast would carry, and turns level changes into
//! the low/okay threshold events the update pipeline listens for.
//!
//! # Example
//!
//! ```ignore
//! use gauge_platform::{SampleSource, SystemBattery};
//!
//! let mut battery = SystemBattery::new()?;
//! let sample = battery.sample()?;
//! println!("raw {:?}/{:?}", sample.level, sample.scale);
//! ```

mod power_supply;
mod sample;
mod threshold;

pub use sample::{SampleSource, SystemBattery};
pub use threshold::{ThresholdEvent, ThresholdWatcher};
