//! Per-session monitor state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime state of one monitored session. Only the monitor mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotMonitorState {
    pub is_active: bool,
    /// Guidances written in the current hourly window
    pub guidances_provided: u32,
    pub last_guidance_time: Option<DateTime<Utc>>,
    pub analysis_in_progress: bool,
}

impl AutopilotMonitorState {
    pub fn new() -> Self {
        Self::default()
    }
}
