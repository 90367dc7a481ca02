//! Decoding of the uWSGI stats document and per-status worker tallies.
//!
//! The stats server writes one JSON object per connection. Only a small part
//! of it matters here:
//! - `version`: uWSGI version (optional, logged, any JSON type)
//! - `workers`: array of worker objects, each with a `status` such as
//!   `idle`, `busy`, `cheap` or `pause`
//!
//! Everything else in the document is ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WaitError};

/// Status label of a worker that has nothing to do
pub const IDLE: &str = "idle";

/// Label used for workers that report no status at all
pub const UNKNOWN: &str = "unknown";

/// Key under which the worker count is rendered
pub const TOTAL: &str = "total";

/// Decode a raw stats response into a JSON document
pub fn decode(bytes: Vec<u8>) -> Result<Value> {
    let text = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&text)?)
}

/// One entry of the `workers` array
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Kept as raw JSON; only used in log lines
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

impl WorkerRecord {
    /// The worker's status, or `unknown` when it reported none
    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or(UNKNOWN)
    }

    /// Worker id for log lines, `?` when absent
    pub fn display_id(&self) -> String {
        match self.id {
            Some(Value::String(ref id)) => id.clone(),
            Some(ref id) => id.to_string(),
            None => "?".to_string(),
        }
    }
}

/// The parts of a stats document the wait loop looks at
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Kept as raw JSON; only used in log lines
    #[serde(default)]
    pub version: Option<Value>,
    pub workers: Vec<WorkerRecord>,
}

impl StatsSnapshot {
    /// Extract the snapshot from a decoded stats document
    pub fn from_value(value: &Value) -> Result<Self> {
        if value.get("workers").is_none() {
            return Err(WaitError::Schema(
                "expecting JSON with \"workers\" key".to_string(),
            ));
        }
        StatsSnapshot::deserialize(value)
            .map_err(|e| WaitError::Schema(format!("unexpected stats layout: {}", e)))
    }
}

/// Worker counts per status label for a single poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTally {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl StatusTally {
    /// Count the workers of a snapshot by status
    pub fn from_snapshot(snapshot: &StatsSnapshot) -> Self {
        let mut tally = Self::default();
        for worker in &snapshot.workers {
            tally.record(worker.status_label());
        }
        tally
    }

    fn record(&mut self, label: &str) {
        *self.counts.entry(label.to_string()).or_insert(0) += 1;
        self.total += 1;
    }

    /// Number of workers reporting `label`
    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Number of workers observed
    pub fn total(&self) -> usize {
        self.total
    }

    /// True when every worker is idle, including when there are none
    pub fn all_idle(&self) -> bool {
        self.count(IDLE) == self.total
    }

    /// Labels and counts in lexicographic order, `total` included
    pub fn entries(&self) -> Vec<(&str, usize)> {
        let mut merged: BTreeMap<&str, usize> = self
            .counts
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        merged.insert(TOTAL, self.total);
        merged.into_iter().collect()
    }
}

impl fmt::Display for StatusTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(label, count)| format!("{}: {}", label, count))
            .collect();
        write!(f, "{}", line.join(" "))
    }
}
