//! Typed REST resources: key builders, fetchers, observers and writes.
//!
//! Every resource owns its key root in a `keys` module. Read hooks build
//! keys from it and writes declare their invalidations from it, so the two
//! always agree.

pub mod attendance;
pub mod dashboard;
pub mod leaves;
pub mod shifts;
