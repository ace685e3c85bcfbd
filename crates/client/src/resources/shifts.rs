//! Shift roster, polled every 30 seconds.

use std::time::Duration;

use tracker_shared::{ApiError, Envelope, Shift, ShiftAssignment};

use crate::api_client::{segment, ApiClient, QueryParams};
use crate::mutation::Mutation;
use crate::provider::TrackerContext;
use crate::query::{QueryError, QueryObserver, QueryOptions};

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

pub mod keys {
    use crate::query::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("shifts")
    }
}

pub async fn fetch(api: &ApiClient) -> Result<Vec<Shift>, ApiError> {
    let envelope: Envelope<Vec<Shift>> = api.get_json("/shifts", QueryParams::new()).await?;
    Ok(envelope.data)
}

pub fn observe(ctx: &TrackerContext) -> Result<QueryObserver<Vec<Shift>>, QueryError> {
    let api = ctx.api.clone();
    ctx.cache
        .observe(keys::all(), QueryOptions::polling(POLL_INTERVAL), move || {
            let api = api.clone();
            async move { fetch(&api).await }
        })
}

fn roster_mutation(name: &'static str, success: &str, fallback: &str) -> Mutation {
    Mutation::new(name, fallback)
        .invalidates(keys::all())
        .invalidates(super::dashboard::keys::all())
        .on_success(success)
}

pub fn assign_mutation() -> Mutation {
    roster_mutation("assign shift", "Shift assigned", "Failed to assign shift")
}

pub fn unassign_mutation() -> Mutation {
    roster_mutation("unassign shift", "Shift unassigned", "Failed to unassign shift")
}

pub async fn assign(ctx: &TrackerContext, shift_id: &str, employees: &ShiftAssignment) -> Result<Shift, ApiError> {
    let path = format!("/shifts/{}/assign", segment(shift_id));
    let write = async {
        let envelope: Envelope<Shift> = ctx.api.post_json(&path, employees).await?;
        Ok::<_, ApiError>(envelope.data)
    };
    assign_mutation().run(&ctx.cache, &ctx.toasts, write).await
}

pub async fn unassign(ctx: &TrackerContext, shift_id: &str, employees: &ShiftAssignment) -> Result<Shift, ApiError> {
    let path = format!("/shifts/{}/unassign", segment(shift_id));
    let write = async {
        let envelope: Envelope<Shift> = ctx.api.post_json(&path, employees).await?;
        Ok::<_, ApiError>(envelope.data)
    };
    unassign_mutation().run(&ctx.cache, &ctx.toasts, write).await
}
