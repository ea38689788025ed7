//! Completion notifications for voter data loads.
//!
//! After a successful load the notifier diffs the current registration
//! statistics against the snapshot persisted by the previous run and
//! pushes a summary through a delivery channel. The loader contains any
//! failure raised here; a lost notification never fails a load.

pub mod channel;
pub mod snapshot;

use async_trait::async_trait;
use common::Result;
use common::models::{LoadOutcome, VoterStats};
use std::collections::BTreeMap;
use tracing::info;

pub use channel::{LogChannel, NotificationChannel};
pub use snapshot::{Snapshot, SnapshotStore};

/// Extension point the refresh controller calls once after a
/// successful load.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, stats: &VoterStats, outcome: &LoadOutcome) -> Result<()>;
}

/// Changes between the current statistics and the previous snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsDiff {
    pub is_first_run: bool,
    pub total_change: i64,
    pub party_changes: BTreeMap<String, i64>,
}

impl StatsDiff {
    pub fn between(current: &VoterStats, previous: Option<&Snapshot>) -> Self {
        let Some(previous) = previous else {
            return Self {
                is_first_run: true,
                total_change: current.total_voters as i64,
                party_changes: BTreeMap::new(),
            };
        };

        let prev = &previous.stats;
        let mut party_changes = BTreeMap::new();
        for (party, count) in &current.by_party {
            let prev_count = prev.by_party.get(party).copied().unwrap_or(0);
            party_changes.insert(party.clone(), *count as i64 - prev_count as i64);
        }

        Self {
            is_first_run: false,
            total_change: current.total_voters as i64 - prev.total_voters as i64,
            party_changes,
        }
    }
}

/// Standard notifier: snapshot diff plus a delivery channel.
pub struct UpdateNotifier {
    snapshots: SnapshotStore,
    channel: Box<dyn NotificationChannel>,
}

impl UpdateNotifier {
    pub fn new(snapshots: SnapshotStore, channel: Box<dyn NotificationChannel>) -> Self {
        Self { snapshots, channel }
    }

    fn format_summary(stats: &VoterStats, diff: &StatsDiff, outcome: &LoadOutcome) -> String {
        let mut lines = Vec::new();
        if diff.is_first_run {
            lines.push("NC Votes - initial data load".to_string());
        } else {
            lines.push(format!(
                "NC Votes - data update ({:+} registrations)",
                diff.total_change
            ));
        }
        lines.push(format!("Total registered voters: {}", stats.total_voters));
        lines.push(format!(
            "Rows loaded: {} (skipped {})",
            outcome.rows_loaded, outcome.rows_skipped
        ));
        for (party, count) in &stats.by_party {
            match diff.party_changes.get(party) {
                Some(change) => lines.push(format!("{party}: {count} ({change:+})")),
                None => lines.push(format!("{party}: {count}")),
            }
        }
        lines.join("\n")
    }
}

#[async_trait]
impl CompletionNotifier for UpdateNotifier {
    async fn notify(&self, stats: &VoterStats, outcome: &LoadOutcome) -> Result<()> {
        let previous = self.snapshots.load_previous().await;
        let diff = StatsDiff::between(stats, previous.as_ref());

        let subject = if diff.is_first_run {
            "NC Votes - Initial Data Load".to_string()
        } else {
            format!("NC Votes - Data Update ({:+} registrations)", diff.total_change)
        };
        let body = Self::format_summary(stats, &diff, outcome);

        self.channel.send(&subject, &body).await?;

        // Persist after a successful send so a failed notification is
        // retried with the same baseline on the next run.
        self.snapshots.save(stats).await?;

        info!(
            total_voters = stats.total_voters,
            total_change = diff.total_change,
            first_run = diff.is_first_run,
            "Completion notification sent"
        );
        Ok(())
    }
}
