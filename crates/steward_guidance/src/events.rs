//! Events emitted to the UI layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use steward_core::GuidanceResult;

/// Monitor status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    Active,
    Standby,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Active => f.write_str("ACTIVE"),
            MonitorStatus::Standby => f.write_str("STANDBY"),
        }
    }
}

/// Something the monitor did for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AutopilotEvent {
    StatusChanged {
        session_id: String,
        status: MonitorStatus,
    },
    GuidanceProvided {
        session_id: String,
        guidance: String,
        source: String,
    },
    AnalysisComplete {
        session_id: String,
        result: GuidanceResult,
    },
    AnalysisError {
        session_id: String,
        error: String,
    },
}

impl AutopilotEvent {
    pub fn session_id(&self) -> &str {
        match self {
            AutopilotEvent::StatusChanged { session_id, .. }
            | AutopilotEvent::GuidanceProvided { session_id, .. }
            | AutopilotEvent::AnalysisComplete { session_id, .. }
            | AutopilotEvent::AnalysisError { session_id, .. } => session_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AutopilotEvent::StatusChanged { .. } => "statusChanged",
            AutopilotEvent::GuidanceProvided { .. } => "guidanceProvided",
            AutopilotEvent::AnalysisComplete { .. } => "analysisComplete",
            AutopilotEvent::AnalysisError { .. } => "analysisError",
        }
    }
}
