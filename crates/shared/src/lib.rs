//! Shared types for the Tracker client: REST envelopes, domain models,
//! push-channel frames and API errors.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
