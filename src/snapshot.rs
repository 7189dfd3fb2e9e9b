//! Serializable statistics snapshots.
//!
//! This module captures a typed collection's statistics view as plain
//! serializable data, for handing to whatever reporting layer the host
//! system uses. It is deliberately dumb: names and 64-bit values, nothing
//! else. The tick-to-millisecond policy already happened inside
//! [`statistics`](crate::CounterCollection::statistics).
//!
//! # Feature flag
//!
//! Requires the `serde` feature (enabled by default):
//!
//! ```toml
//! [dependencies]
//! tallies = { version = "0.1", features = ["serde"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::collection::CounterCollection;
use crate::schema::CounterEnum;

/// One exported counter: display name (with any prefix and `Ms` suffix
/// already applied) and its value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterSample {
    /// The export key.
    pub name: String,
    /// Folded count, or truncated elapsed milliseconds for stopwatch
    /// counters.
    pub value: i64,
}

/// A point-in-time export of a whole collection, in key order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    /// The exported counters.
    pub counters: Vec<CounterSample>,
}

impl StatisticsSnapshot {
    /// Captures the statistics view of `collection` under `prefix`.
    pub fn capture<E: CounterEnum>(
        collection: &CounterCollection<E>,
        prefix: Option<&str>,
    ) -> Self {
        StatisticsSnapshot {
            counters: collection
                .statistics(prefix)
                .into_iter()
                .map(|(name, value)| CounterSample { name, value })
                .collect(),
        }
    }

    /// Finds a counter by its export key.
    pub fn get(&self, name: &str) -> Option<&CounterSample> {
        self.counters.iter().find(|sample| sample.name == name)
    }
}
