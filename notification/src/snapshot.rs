use chrono::{DateTime, Utc};
use common::Result;
use common::models::VoterStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info};

/// Statistics snapshot persisted between load runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub stats: VoterStats,
    pub timestamp: DateTime<Utc>,
}

/// Whole-file JSON persistence for the last snapshot.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the previous snapshot. Absent or unreadable snapshots are
    /// treated as a first run, not an error.
    pub async fn load_previous(&self) -> Option<Snapshot> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(_) => {
                info!(path = %self.path.display(), "No previous snapshot found");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to parse snapshot");
                None
            }
        }
    }

    pub async fn save(&self, stats: &VoterStats) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let snapshot = Snapshot {
            stats: stats.clone(),
            timestamp: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(&self.path, data).await?;
        info!(path = %self.path.display(), "Snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("last_snapshot.json"));

        let mut stats = VoterStats::default();
        stats.total_voters = 42;
        stats.by_party.insert("DEM".to_string(), 25);
        stats.by_party.insert("REP".to_string(), 17);

        store.save(&stats).await.unwrap();
        let loaded = store.load_previous().await.unwrap();
        assert_eq!(loaded.stats, stats);
    }

    #[tokio::test]
    async fn missing_snapshot_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nope.json"));
        assert!(store.load_previous().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_snapshot.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let store = SnapshotStore::new(path);
        assert!(store.load_previous().await.is_none());
    }
}
