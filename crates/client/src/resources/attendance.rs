//! Attendance: today's record (polled) and history.

use std::time::Duration;

use serde::Serialize;
use tracker_shared::{ApiError, AttendanceRecord, ClockRequest, Envelope, Page};

use crate::api_client::{ApiClient, QueryParams};
use crate::mutation::Mutation;
use crate::provider::TrackerContext;
use crate::query::{QueryError, QueryObserver, QueryOptions};

pub const TODAY_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub mod keys {
    use super::HistoryFilters;
    use crate::query::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("attendance")
    }

    pub fn today() -> QueryKey {
        all().push("today")
    }

    pub fn history(filters: &HistoryFilters) -> QueryKey {
        all().push("history").with(filters)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct HistoryFilters {
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
}

impl HistoryFilters {
    fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .text("from", self.from.as_deref())
            .text("to", self.to.as_deref())
            .opt("page", self.page)
    }
}

/// `None` until the employee clocks in today.
pub async fn fetch_today(api: &ApiClient) -> Result<Option<AttendanceRecord>, ApiError> {
    let envelope: Envelope<Option<AttendanceRecord>> =
        api.get_json("/attendance/today", QueryParams::new()).await?;
    Ok(envelope.data)
}

pub async fn fetch_history(
    api: &ApiClient,
    filters: &HistoryFilters,
) -> Result<Page<AttendanceRecord>, ApiError> {
    api.get_json("/attendance", filters.to_query()).await
}

pub fn observe_today(ctx: &TrackerContext) -> Result<QueryObserver<Option<AttendanceRecord>>, QueryError> {
    let api = ctx.api.clone();
    ctx.cache
        .observe(keys::today(), QueryOptions::polling(TODAY_POLL_INTERVAL), move || {
            let api = api.clone();
            async move { fetch_today(&api).await }
        })
}

pub fn observe_history(
    ctx: &TrackerContext,
    filters: HistoryFilters,
) -> Result<QueryObserver<Page<AttendanceRecord>>, QueryError> {
    let api = ctx.api.clone();
    ctx.cache.observe(keys::history(&filters), QueryOptions::default(), move || {
        let api = api.clone();
        let filters = filters.clone();
        async move { fetch_history(&api, &filters).await }
    })
}

fn clock_mutation(name: &'static str, success: &str, fallback: &str) -> Mutation {
    Mutation::new(name, fallback)
        .invalidates(keys::all())
        .invalidates(super::dashboard::keys::all())
        .on_success(success)
}

pub fn clock_in_mutation() -> Mutation {
    clock_mutation("clock in", "Clocked in", "Failed to clock in")
}

pub fn clock_out_mutation() -> Mutation {
    clock_mutation("clock out", "Clocked out", "Failed to clock out")
}

pub async fn clock_in(ctx: &TrackerContext, request: &ClockRequest) -> Result<AttendanceRecord, ApiError> {
    let write = async {
        let envelope: Envelope<AttendanceRecord> =
            ctx.api.post_json("/attendance/clock-in", request).await?;
        Ok::<_, ApiError>(envelope.data)
    };
    clock_in_mutation().run(&ctx.cache, &ctx.toasts, write).await
}

pub async fn clock_out(ctx: &TrackerContext, request: &ClockRequest) -> Result<AttendanceRecord, ApiError> {
    let write = async {
        let envelope: Envelope<AttendanceRecord> =
            ctx.api.post_json("/attendance/clock-out", request).await?;
        Ok::<_, ApiError>(envelope.data)
    };
    clock_out_mutation().run(&ctx.cache, &ctx.toasts, write).await
}
