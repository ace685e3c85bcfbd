//! Keyed request cache with invalidation.
//!
//! Hooks observe a [`QueryKey`]; the cache runs at most one fetch driver per
//! key and fans its [`QueryState`] out to every observer. Mutations and push
//! events call [`QueryCache::invalidate`] with a key prefix to get observed
//! data refetched.

mod cache;
mod key;
mod state;

pub use cache::{QueryCache, QueryError, QueryObserver};
pub use key::QueryKey;
pub use state::{QueryOptions, QueryState};
