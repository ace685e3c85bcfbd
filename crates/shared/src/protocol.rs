//! Push-channel frames and the event names the Tracker server emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event names pushed over the real-time channel.
pub mod events {
    /// Aggregate dashboard numbers changed.
    pub const DASHBOARD_STATS_UPDATE: &str = "dashboard-stats-update";
    pub const ATTENDANCE_UPDATE: &str = "attendance-update";
    pub const LEAVE_UPDATE: &str = "leave-update";
    pub const SHIFT_UPDATE: &str = "shift-update";
}

/// A server-initiated notification.
///
/// Wire form: `{"event": "<name>", "data": <any json>, "ts": "<rfc3339>"}`.
/// `data` and `ts` are optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
}

impl PushEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
            ts: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_event_without_data_defaults_to_null() {
        let ev: PushEvent = serde_json::from_str(r#"{"event":"leave-update"}"#).unwrap();
        assert_eq!(ev.event, events::LEAVE_UPDATE);
        assert!(ev.data.is_null());
        assert!(ev.ts.is_none());
    }
}
