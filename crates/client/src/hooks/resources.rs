//! One read hook per tracker resource.

use dioxus::prelude::*;
use tracker_shared::{AttendanceRecord, DashboardStats, LeaveBalance, LeaveRequest, Page, Shift};

use super::use_query;
use crate::query::QueryState;
use crate::resources::attendance::{self, HistoryFilters};
use crate::resources::dashboard::{self, DashboardFilters};
use crate::resources::leaves::{self, LeaveFilters};
use crate::resources::shifts;

/// Dashboard statistics, polled every 30 seconds and refreshed on
/// `dashboard-stats-update`.
pub fn use_dashboard(filters: DashboardFilters) -> Signal<QueryState<DashboardStats>> {
    use_query(dashboard::keys::filtered(&filters), move |ctx| {
        dashboard::observe(ctx, filters)
    })
}

pub fn use_leaves(filters: LeaveFilters) -> Signal<QueryState<Page<LeaveRequest>>> {
    use_query(leaves::keys::list(&filters), move |ctx| leaves::observe_list(ctx, filters))
}

pub fn use_leave(id: &str) -> Signal<QueryState<LeaveRequest>> {
    use_query(leaves::keys::detail(id), |ctx| leaves::observe_one(ctx, id))
}

pub fn use_leave_balance() -> Signal<QueryState<Vec<LeaveBalance>>> {
    use_query(leaves::keys::balance(), leaves::observe_balance)
}

/// Today's attendance record, polled every 10 seconds.
pub fn use_attendance_today() -> Signal<QueryState<Option<AttendanceRecord>>> {
    use_query(attendance::keys::today(), attendance::observe_today)
}

pub fn use_attendance_history(filters: HistoryFilters) -> Signal<QueryState<Page<AttendanceRecord>>> {
    use_query(attendance::keys::history(&filters), move |ctx| {
        attendance::observe_history(ctx, filters)
    })
}

pub fn use_shifts() -> Signal<QueryState<Vec<Shift>>> {
    use_query(shifts::keys::all(), shifts::observe)
}
