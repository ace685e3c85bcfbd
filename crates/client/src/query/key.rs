use std::fmt;

use serde::Serialize;

/// Ordered cache key, e.g. `["dashboard-data", "{\"department\":\"eng\"}"]`.
///
/// Build keys with the per-resource helpers in [`crate::resources`] rather
/// than by hand, so the hook that reads a key and the mutation that
/// invalidates it can't drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(root: impl Into<String>) -> Self {
        Self(vec![root.into()])
    }

    pub fn push(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Append `params` as one segment (its compact JSON form).
    pub fn with<T: Serialize>(self, params: &T) -> Self {
        let segment = match serde_json::to_value(params) {
            Ok(value) => value.to_string(),
            Err(e) => {
                crate::log_error!("query key parameters failed to serialize: {}", e);
                String::new()
            }
        };
        self.push(segment)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.is_empty())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}
