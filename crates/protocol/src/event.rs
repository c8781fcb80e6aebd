use serde::{Deserialize, Serialize};

use crate::types::WidgetId;

/// A power-state sample exactly as the platform delivered it.
///
/// Every field is optional; normalization substitutes sentinels for
/// anything missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugged: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
}

impl RawSample {
    pub fn with_level(level: i32, scale: i32) -> Self {
        Self {
            level: Some(level),
            scale: Some(scale),
            ..Self::default()
        }
    }
}

/// Events a monitor forwards to the update pipeline.
///
/// Serialized with a string `event` tag: `SAMPLE_ARRIVED`, `LOW`, `OKAY`,
/// `WIDGET_REFRESH_REQUEST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorEvent {
    SampleArrived {
        sample: RawSample,
    },
    Low,
    Okay,
    WidgetRefreshRequest {
        #[serde(default)]
        target_ids: Vec<WidgetId>,
    },
}

impl MonitorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorEvent::SampleArrived { .. } => "SAMPLE_ARRIVED",
            MonitorEvent::Low => "LOW",
            MonitorEvent::Okay => "OKAY",
            MonitorEvent::WidgetRefreshRequest { .. } => "WIDGET_REFRESH_REQUEST",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
