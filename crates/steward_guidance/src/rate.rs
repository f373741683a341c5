//! Hourly guidance budget.
//!
//! The window is anchored on the last guidance: once an hour has passed since
//! `last_guidance_time` the counter resets. This is not a sliding window; a
//! burst just before the hour mark resets early.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::state::AutopilotMonitorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    max_per_hour: u32,
}

impl RateBudget {
    pub fn new(max_per_hour: u32) -> Self {
        Self { max_per_hour }
    }

    pub fn max_per_hour(&self) -> u32 {
        self.max_per_hour
    }

    /// Whether another guidance may be written at `now`.
    ///
    /// Resets the counter when the window has rolled over.
    pub fn allows(&self, state: &mut AutopilotMonitorState, now: DateTime<Utc>) -> bool {
        let Some(last) = state.last_guidance_time else {
            return true;
        };

        if now - last >= Duration::hours(1) {
            if state.guidances_provided > 0 {
                debug!("Guidance window rolled over, resetting {} guidances", state.guidances_provided);
            }
            state.guidances_provided = 0;
            return true;
        }

        state.guidances_provided < self.max_per_hour
    }

    /// Count a written guidance.
    pub fn record(&self, state: &mut AutopilotMonitorState, now: DateTime<Utc>) {
        state.guidances_provided = state.guidances_provided.saturating_add(1);
        state.last_guidance_time = Some(now);
    }
}
