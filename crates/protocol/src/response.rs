use serde::{Deserialize, Serialize};

use crate::types::{BatterySnapshot, DaemonStatus, EventOutcome, HistoryEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonResponse {
    Status(DaemonStatus),
    Snapshot(BatterySnapshot),
    History(Vec<HistoryEntry>),
    Handled(EventOutcome),
    Ok,
    Error(String),
}

impl DaemonResponse {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
