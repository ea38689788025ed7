use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Registration statistics captured from the target table. Consumed by
/// the notifier to diff against the previous run's snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoterStats {
    pub total_voters: u64,
    pub by_party: BTreeMap<String, u64>,
}

/// Structured result of one refresh run. The controller returns this
/// instead of raising, so an orchestrating pipeline can continue with
/// its remaining steps and tests can assert on specifics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub success: bool,
    pub source_file: Option<String>,
    pub rows_loaded: u64,
    pub rows_skipped: u64,
    pub batches_written: u64,
    /// Expected columns absent from the source file (schema drift).
    pub missing_columns: Vec<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadOutcome {
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            source_file: None,
            rows_loaded: 0,
            rows_skipped: 0,
            batches_written: 0,
            missing_columns: Vec::new(),
            error: None,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn failed(mut self, error: String) -> Self {
        self.success = false;
        self.error = Some(error);
        self.finished_at = Utc::now();
        self
    }
}
