//! Dioxus hooks over the query cache, the push channel and mutations.
//!
//! Everything here reads [`crate::TrackerContext`] from the nearest
//! [`crate::TrackerProvider`].

mod query;
mod resources;

pub use query::{use_invalidation, use_mutation, use_query, use_refetch, use_toasts, UseMutation};
pub use resources::{
    use_attendance_history, use_attendance_today, use_dashboard, use_leave, use_leave_balance,
    use_leaves, use_shifts,
};
