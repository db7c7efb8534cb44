//! Shared lookup result types.

use serde::{Deserialize, Serialize};

/// Where a lookup result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    /// Served from the durable TTL cache; no upstream call was made.
    Cache,
    /// Fetched from the upstream API on a cache miss.
    Api,
}
