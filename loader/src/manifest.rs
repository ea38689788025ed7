//! Manifest of downloaded data files.
//!
//! Single source of truth for file provenance: the scraper appends an
//! entry per download, the loader asks for the latest file of a given
//! type. The manifest is one JSON array rewritten whole on every
//! append. Concurrent writers would race on that read-modify-write and
//! can lose entries; the pipeline runs single-process, so this is a
//! documented limitation rather than a guarded path.

use chrono::{DateTime, SubsecRound, Utc};
use common::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    RegistrationZip,
    RegistrationData,
    ResultsZip,
    ResultsData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub source_url: String,
    pub file_type: FileType,
    pub downloaded_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all entries. An absent or unparseable manifest yields an
    /// empty sequence (logged); only writes are allowed to fail.
    async fn load(&self) -> Vec<ManifestEntry> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(_) => {
                info!(path = %self.path.display(), "No existing manifest found");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<ManifestEntry>>(&data) {
            Ok(entries) => {
                debug!(entries = entries.len(), "Loaded manifest");
                entries
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to parse manifest");
                Vec::new()
            }
        }
    }

    async fn save(&self, entries: &[ManifestEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, data).await?;
        info!(entries = entries.len(), "Manifest saved");
        Ok(())
    }

    pub async fn add_entry(
        &self,
        filename: &str,
        source_url: &str,
        file_type: FileType,
        metadata: BTreeMap<String, Value>,
    ) -> Result<()> {
        let mut entries = self.load().await;
        entries.push(ManifestEntry {
            filename: filename.to_string(),
            source_url: source_url.to_string(),
            file_type,
            downloaded_at: Utc::now().trunc_subsecs(0),
            metadata,
        });
        self.save(&entries).await?;
        info!(filename = filename, "Added manifest entry");
        Ok(())
    }

    /// Most recent entry of the given type, by download timestamp
    /// rather than append order.
    pub async fn get_latest_file(&self, file_type: FileType) -> Option<ManifestEntry> {
        let entries = self.load().await;
        let latest = entries
            .into_iter()
            .filter(|e| e.file_type == file_type)
            .max_by_key(|e| e.downloaded_at);

        match &latest {
            Some(entry) => {
                info!(filename = %entry.filename, ?file_type, "Found latest file")
            }
            None => warn!(?file_type, "No files of this type found in manifest"),
        }
        latest
    }

    pub async fn get_all_files(&self, file_type: Option<FileType>) -> Vec<ManifestEntry> {
        let entries = self.load().await;
        match file_type {
            Some(file_type) => entries
                .into_iter()
                .filter(|e| e.file_type == file_type)
                .collect(),
            None => entries,
        }
    }

    pub async fn file_exists(&self, filename: &str) -> bool {
        self.load().await.iter().any(|e| e.filename == filename)
    }
}
