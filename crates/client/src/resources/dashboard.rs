//! Dashboard statistics, polled every 30 seconds.

use std::time::Duration;

use serde::Serialize;
use tracker_shared::{ApiError, DashboardStats, Envelope};

use crate::api_client::{is_unfiltered, ApiClient, QueryParams};
use crate::provider::TrackerContext;
use crate::query::{QueryError, QueryObserver, QueryOptions};

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

pub mod keys {
    use super::DashboardFilters;
    use crate::query::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("dashboard-data")
    }

    pub fn filtered(filters: &DashboardFilters) -> QueryKey {
        all().with(&filters.normalized())
    }
}

/// Dashboard filters as picked in the UI. `"all"` and blank mean unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFilters {
    pub department_id: Option<String>,
    pub project_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DashboardFilters {
    /// Same filters with "all"/blank dropdowns and empty dates dropped, so
    /// equivalent selections share a cache entry.
    pub fn normalized(&self) -> Self {
        fn choice(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !is_unfiltered(v))
                .map(str::to_string)
        }
        fn date(value: &Option<String>) -> Option<String> {
            value.clone().filter(|v| !v.is_empty())
        }
        Self {
            department_id: choice(&self.department_id),
            project_id: choice(&self.project_id),
            from: date(&self.from),
            to: date(&self.to),
        }
    }

    fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .filter("departmentId", self.department_id.as_deref())
            .filter("projectId", self.project_id.as_deref())
            .text("from", self.from.as_deref())
            .text("to", self.to.as_deref())
    }
}

pub fn options() -> QueryOptions {
    QueryOptions::polling(POLL_INTERVAL)
}

pub async fn fetch(api: &ApiClient, filters: &DashboardFilters) -> Result<DashboardStats, ApiError> {
    let envelope: Envelope<DashboardStats> = api.get_json("/dashboard", filters.to_query()).await?;
    Ok(envelope.data)
}

pub fn observe(
    ctx: &TrackerContext,
    filters: DashboardFilters,
) -> Result<QueryObserver<DashboardStats>, QueryError> {
    let api = ctx.api.clone();
    let filters = filters.normalized();
    ctx.cache.observe(keys::filtered(&filters), options(), move || {
        let api = api.clone();
        let filters = filters.clone();
        async move { fetch(&api, &filters).await }
    })
}
