use serde::{Deserialize, Serialize};

use crate::event::MonitorEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonRequest {
    GetStatus,
    GetSnapshot,
    GetHistory {
        /// Only entries at or after this timestamp (ms).
        since: Option<i64>,
    },
    Event(MonitorEvent),
    Shutdown,
}

impl DaemonRequest {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
