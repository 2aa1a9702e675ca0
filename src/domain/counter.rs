//! Counter state.

use serde::{Deserialize, Serialize};

/// Persistent state of a named counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Counter name (the namespace name).
    pub name: String,

    /// Last value handed out; the next increment returns `seq + 1`.
    pub seq: i64,

    /// Number of writes applied to this counter.
    #[serde(default)]
    pub version: u64,

    /// Last update timestamp (milliseconds since epoch).
    pub updated_at: i64,
}

impl CounterState {
    /// Create a new counter state.
    #[must_use]
    pub fn new(name: String, seq: i64) -> Self {
        Self {
            name,
            seq,
            version: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Record a write.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}
