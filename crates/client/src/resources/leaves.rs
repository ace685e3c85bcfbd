//! Leave requests and balances.

use serde::Serialize;
use tracker_shared::{
    ApiError, Envelope, LeaveBalance, LeaveRequest, LeaveStatus, LeaveStatusChange, LeaveUpdate,
    NewLeaveRequest, Page,
};

use crate::api_client::{segment, ApiClient, QueryParams};
use crate::mutation::Mutation;
use crate::provider::TrackerContext;
use crate::query::{QueryError, QueryObserver, QueryOptions};

pub mod keys {
    use super::LeaveFilters;
    use crate::query::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("leaves")
    }

    pub fn list(filters: &LeaveFilters) -> QueryKey {
        all().push("list").with(filters)
    }

    pub fn detail(id: &str) -> QueryKey {
        all().push("detail").push(id)
    }

    /// Balances live under their own root; leave writes invalidate both.
    pub fn balance() -> QueryKey {
        QueryKey::new("leave-balance")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct LeaveFilters {
    pub status: Option<LeaveStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl LeaveFilters {
    fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .filter("status", self.status.as_ref().map(LeaveStatus::as_str))
            .text("search", self.search.as_deref())
            .opt("page", self.page)
            .text("from", self.from.as_deref())
            .text("to", self.to.as_deref())
    }
}

// --- Reads ---

pub async fn fetch_list(api: &ApiClient, filters: &LeaveFilters) -> Result<Page<LeaveRequest>, ApiError> {
    api.get_json("/leaves", filters.to_query()).await
}

pub async fn fetch_one(api: &ApiClient, id: &str) -> Result<LeaveRequest, ApiError> {
    let envelope: Envelope<LeaveRequest> = api
        .get_json(&format!("/leaves/{}", segment(id)), QueryParams::new())
        .await?;
    Ok(envelope.data)
}

pub async fn fetch_balance(api: &ApiClient) -> Result<Vec<LeaveBalance>, ApiError> {
    let envelope: Envelope<Vec<LeaveBalance>> =
        api.get_json("/leaves/balance", QueryParams::new()).await?;
    Ok(envelope.data)
}

pub fn observe_list(
    ctx: &TrackerContext,
    filters: LeaveFilters,
) -> Result<QueryObserver<Page<LeaveRequest>>, QueryError> {
    let api = ctx.api.clone();
    ctx.cache.observe(keys::list(&filters), QueryOptions::default(), move || {
        let api = api.clone();
        let filters = filters.clone();
        async move { fetch_list(&api, &filters).await }
    })
}

pub fn observe_one(ctx: &TrackerContext, id: &str) -> Result<QueryObserver<LeaveRequest>, QueryError> {
    let api = ctx.api.clone();
    let id = id.to_string();
    ctx.cache.observe(keys::detail(&id), QueryOptions::default(), move || {
        let api = api.clone();
        let id = id.clone();
        async move { fetch_one(&api, &id).await }
    })
}

pub fn observe_balance(ctx: &TrackerContext) -> Result<QueryObserver<Vec<LeaveBalance>>, QueryError> {
    let api = ctx.api.clone();
    ctx.cache.observe(keys::balance(), QueryOptions::default(), move || {
        let api = api.clone();
        async move { fetch_balance(&api).await }
    })
}

// --- Writes ---

fn leave_mutation(name: &'static str, success: &str, fallback: &str) -> Mutation {
    Mutation::new(name, fallback)
        .invalidates(keys::all())
        .invalidates(keys::balance())
        .invalidates(super::dashboard::keys::all())
        .on_success(success)
}

pub fn create_mutation() -> Mutation {
    leave_mutation(
        "create leave request",
        "Leave request submitted",
        "Failed to submit leave request",
    )
}

pub fn update_mutation() -> Mutation {
    leave_mutation(
        "update leave request",
        "Leave request updated",
        "Failed to update leave request",
    )
}

pub fn delete_mutation() -> Mutation {
    leave_mutation(
        "delete leave request",
        "Leave request deleted",
        "Failed to delete leave request",
    )
}

pub fn review_mutation(status: LeaveStatus) -> Mutation {
    match status {
        LeaveStatus::Approved => leave_mutation("approve leave", "Leave approved", "Failed to approve leave"),
        LeaveStatus::Rejected => leave_mutation("reject leave", "Leave rejected", "Failed to reject leave"),
        _ => leave_mutation(
            "change leave status",
            "Leave status updated",
            "Failed to update leave status",
        ),
    }
}

pub async fn create(ctx: &TrackerContext, request: &NewLeaveRequest) -> Result<LeaveRequest, ApiError> {
    let write = async {
        let envelope: Envelope<LeaveRequest> = ctx.api.post_json("/leaves", request).await?;
        Ok::<_, ApiError>(envelope.data)
    };
    create_mutation().run(&ctx.cache, &ctx.toasts, write).await
}

pub async fn update(ctx: &TrackerContext, id: &str, changes: &LeaveUpdate) -> Result<LeaveRequest, ApiError> {
    let write = async {
        let envelope: Envelope<LeaveRequest> = ctx
            .api
            .patch_json(&format!("/leaves/{}", segment(id)), changes)
            .await?;
        Ok::<_, ApiError>(envelope.data)
    };
    update_mutation().run(&ctx.cache, &ctx.toasts, write).await
}

pub async fn delete(ctx: &TrackerContext, id: &str) -> Result<(), ApiError> {
    let path = format!("/leaves/{}", segment(id));
    let write = ctx.api.delete(&path);
    delete_mutation().run(&ctx.cache, &ctx.toasts, write).await
}

/// Approve or reject a request.
pub async fn review(
    ctx: &TrackerContext,
    id: &str,
    change: &LeaveStatusChange,
) -> Result<LeaveRequest, ApiError> {
    let write = async {
        let envelope: Envelope<LeaveRequest> = ctx
            .api
            .patch_json(&format!("/leaves/{}/status", segment(id)), change)
            .await?;
        Ok::<_, ApiError>(envelope.data)
    };
    review_mutation(change.status).run(&ctx.cache, &ctx.toasts, write).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastKind;
    use crate::query::QueryKey;
    use crate::testing::{FakeChannel, RecordingTransport};
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(transport: &Arc<RecordingTransport>) -> TrackerContext {
        TrackerContext::new(ApiClient::new(transport.clone()), FakeChannel::new(), Default::default())
    }

    fn leave_json(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "employeeId": "e1",
            "leaveType": "annual",
            "startDate": "2024-03-04",
            "endDate": "2024-03-08",
            "status": status,
            "createdAt": "2024-02-20T09:00:00Z"
        })
    }

    #[test]
    fn every_write_declares_the_same_keys() {
        let expected = [
            QueryKey::new("leaves"),
            QueryKey::new("leave-balance"),
            QueryKey::new("dashboard-data"),
        ];
        for mutation in [
            create_mutation(),
            update_mutation(),
            delete_mutation(),
            review_mutation(LeaveStatus::Approved),
            review_mutation(LeaveStatus::Rejected),
        ] {
            assert_eq!(mutation.keys(), &expected, "{}", mutation.name());
        }
        assert!(keys::list(&LeaveFilters::default()).starts_with(&keys::all()));
        assert!(keys::detail("l1").starts_with(&keys::all()));
    }

    #[tokio::test]
    async fn list_sends_only_set_filters() {
        let transport = RecordingTransport::new();
        transport.respond(
            "/leaves",
            Some(json!({ "data": [leave_json("l1", "pending")], "meta": { "page": 2, "total": 11, "totalPages": 2 } })),
        );
        let api = ApiClient::new(transport.clone());

        let filters = LeaveFilters {
            status: Some(LeaveStatus::Pending),
            page: Some(2),
            search: Some("All".into()),
            ..LeaveFilters::default()
        };
        let page = fetch_list(&api, &filters).await.unwrap();
        assert_eq!(page.data[0].id, "l1");
        assert!(!page.has_next());

        let requests = transport.requests();
        assert_eq!(requests[0].query_value("status"), Some("pending"));
        assert_eq!(requests[0].query_value("page"), Some("2"));
        assert_eq!(requests[0].query_value("search"), Some("All"));
    }

    #[tokio::test]
    async fn review_patches_status_and_refetches_balances() {
        let transport = RecordingTransport::new();
        transport.respond("/leaves/l1/status", Some(json!({ "data": leave_json("l1", "approved") })));
        transport.respond("/leaves/balance", Some(json!({ "data": [] })));
        let ctx = context(&transport);

        let mut balance = observe_balance(&ctx).unwrap();
        tokio::time::timeout(Duration::from_secs(5), balance.wait_for(|s| s.fetch_count == 1))
            .await
            .unwrap();

        let change = LeaveStatusChange {
            status: LeaveStatus::Approved,
            comment: None,
        };
        let approved = review(&ctx, "l1", &change).await.unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);

        tokio::time::timeout(Duration::from_secs(5), balance.wait_for(|s| s.fetch_count == 2))
            .await
            .unwrap();
        let sent = transport.requests();
        let patch = sent.iter().find(|r| r.path == "/leaves/l1/status").unwrap();
        assert_eq!(patch.method, Method::PATCH);
        assert_eq!(patch.body, Some(json!({ "status": "approved" })));
        assert_eq!(ctx.toasts.snapshot()[0].message, "Leave approved");
    }

    #[tokio::test]
    async fn failed_create_reports_server_message_and_keeps_cache() {
        let transport = RecordingTransport::new();
        transport.fail("/leaves", 422, r#"{"message":["endDate must be after startDate"]}"#);
        let ctx = context(&transport);

        let mut list = observe_list(&ctx, LeaveFilters::default()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), list.wait_for(|s| s.fetch_count == 1))
            .await
            .unwrap();

        let request = NewLeaveRequest {
            leave_type: "annual".into(),
            start_date: "2024-03-08".parse().unwrap(),
            end_date: "2024-03-04".parse().unwrap(),
            reason: None,
        };
        let err = create(&ctx, &request).await.unwrap_err();
        assert_eq!(err.status(), Some(422));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(list.state().fetch_count, 1);
        let shown = ctx.toasts.snapshot();
        let toast = &shown[0];
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, "endDate must be after startDate");
    }

    #[tokio::test]
    async fn delete_encodes_the_id() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport);
        delete(&ctx, "a/b").await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::DELETE);
        assert_eq!(sent[0].path, "/leaves/a%2Fb");
        assert_eq!(ctx.toasts.snapshot()[0].message, "Leave request deleted");
    }
}
