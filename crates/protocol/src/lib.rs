//! Shared data model for gauge.
//!
//! Holds the raw and normalized battery types, the persisted history row,
//! the monitor event namespace and the daemon IPC messages. Everything here
//! is plain serde data; behavior lives in `gauge-cli`.

mod event;
mod request;
mod response;
mod types;
mod version;

pub use event::{MonitorEvent, RawSample};
pub use request::DaemonRequest;
pub use response::DaemonResponse;
pub use types::{
    BatteryHealth, BatterySnapshot, BatteryStatus, DaemonStatus, EventOutcome, HistoryEntry,
    HistoryWrite, PluggedSource, Visibility, VisualElement, VisualState, WidgetId, DEFAULT_LEVEL,
    TECHNOLOGY_UNAVAILABLE, UNAVAILABLE,
};
pub use version::{MIN_SUPPORTED_VERSION, PROTOCOL_VERSION};
