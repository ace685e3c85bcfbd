//! Shared data models for the Tracker REST API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// --- Envelopes ---

/// Single-resource response: `{ "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
}

/// Pagination block of a list response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// List response: `{ "data": [...], "meta": { "page", "total", "totalPages" } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.meta.page < self.meta.total_pages
    }
}

// --- Dashboard ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_employees: u32,
    pub present_today: u32,
    pub absent_today: u32,
    pub on_leave: u32,
    pub late_arrivals: u32,
    pub pending_leave_requests: u32,
    /// Percentage in `0.0..=100.0`.
    pub attendance_rate: f64,
    #[serde(default)]
    pub departments: Vec<DepartmentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub department_id: String,
    pub name: String,
    pub headcount: u32,
    pub present: u32,
}

// --- Leave ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: String,
    pub employee_id: String,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewLeaveRequest {
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeaveUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveStatusChange {
    pub status: LeaveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub leave_type: String,
    pub entitled: f32,
    pub used: f32,
    pub remaining: f32,
}

// --- Attendance ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    OnLeave,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub clock_in: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clock_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClockRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// --- Shifts ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: String,
    pub name: String,
    /// Local wall-clock time, `HH:MM`.
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub employee_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShiftAssignment {
    pub employee_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_envelope_uses_camel_case_meta() {
        let json = r#"{
            "data": [{"id":"s1","name":"Morning","startTime":"08:00","endTime":"16:00"}],
            "meta": {"page": 1, "total": 21, "totalPages": 3}
        }"#;
        let page: Page<Shift> = serde_json::from_str(json).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.data[0].employee_ids.is_empty());
        assert_eq!(page.meta.total_pages, 3);
        assert!(page.has_next());
    }

    #[test]
    fn leave_status_serializes_lowercase() {
        let change = LeaveStatusChange {
            status: LeaveStatus::Approved,
            comment: None,
        };
        assert_eq!(
            serde_json::to_string(&change).unwrap(),
            r#"{"status":"approved"}"#
        );
        assert_eq!(LeaveStatus::Rejected.as_str(), "rejected");
    }
}
