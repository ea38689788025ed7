//! Full-refresh controller for the raw voters table.
//!
//! One run replaces the whole table with the contents of the latest
//! registration file: locate the source through the manifest, count
//! rows for progress reporting, truncate once up front, then stream
//! read-transform-insert batches in file order. A batch insert failure
//! aborts the run and leaves the table partially loaded; truncation is
//! not transactional. Concurrent runs against the same table are
//! undefined behavior.

use crate::age::apply_age_group;
use crate::columns::{AGE_GROUP_COLUMN, EXPECTED_COLUMNS};
use crate::manifest::{FileType, ManifestStore};
use crate::reader::BatchReader;
use crate::store::VoterStore;
use chrono::{Datelike, Utc};
use common::{Error, Result};
use common::models::LoadOutcome;
use notification::CompletionNotifier;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct RefreshController {
    manifest: ManifestStore,
    data_dir: PathBuf,
    store: Arc<dyn VoterStore>,
    notifier: Option<Arc<dyn CompletionNotifier>>,
    batch_size: usize,
    has_headers: bool,
    reference_year: Option<i32>,
}

impl RefreshController {
    pub fn new(
        manifest: ManifestStore,
        data_dir: impl Into<PathBuf>,
        store: Arc<dyn VoterStore>,
        batch_size: usize,
        has_headers: bool,
    ) -> Self {
        Self {
            manifest,
            data_dir: data_dir.into(),
            store,
            notifier: None,
            batch_size,
            has_headers,
            reference_year: None,
        }
    }

    /// Hook invoked once after a successful load. Failures inside the
    /// notifier are logged and contained, never escalated.
    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Pin the calendar year used for age bucketing. Defaults to the
    /// current UTC year at run time.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// Run the full refresh. Never raises past this boundary: any
    /// failure is logged with context and reported in the outcome so an
    /// orchestrating pipeline can continue with its other stages.
    pub async fn run(&self) -> LoadOutcome {
        let mut outcome = LoadOutcome::started(Utc::now());

        match self.execute(&mut outcome).await {
            Ok(()) => {
                outcome.success = true;
                outcome.finished_at = Utc::now();
                info!(
                    rows_loaded = outcome.rows_loaded,
                    rows_skipped = outcome.rows_skipped,
                    batches = outcome.batches_written,
                    "Successfully loaded voter records"
                );
                self.notify(&outcome).await;
                outcome
            }
            Err(e) => {
                error!(
                    source_file = outcome.source_file.as_deref().unwrap_or("<unresolved>"),
                    rows_loaded = outcome.rows_loaded,
                    error = %e,
                    "Failed to load raw voter data"
                );
                outcome.failed(e.to_string())
            }
        }
    }

    async fn execute(&self, outcome: &mut LoadOutcome) -> Result<()> {
        let path = self.locate_source().await?;
        outcome.source_file = Some(path.display().to_string());
        info!(path = %path.display(), "Loading raw voter data");

        let reader = BatchReader::new(&path, self.batch_size, self.has_headers);

        // Full pre-pass scan, paid before any data moves, so progress
        // percentages stay meaningful on multi-million-row files.
        info!("Counting total rows...");
        let total_rows = reader.count_data_rows().await?;
        info!(total_rows = total_rows, "Total rows to process");

        let existing_rows = self.store.count_rows().await?;
        if existing_rows > 0 {
            warn!(existing_rows = existing_rows, "Table already has rows");
            info!("Truncating existing data...");
            self.store.truncate().await?;
        }

        let mut stream = reader.open().await?;
        outcome.missing_columns = stream.missing_columns().to_vec();

        // Align the file layout to the table: keep expected columns in
        // file order, drop unexpected ones, append the derived column.
        let source_columns = stream.columns().clone();
        let keep_indices: Vec<usize> = source_columns
            .iter()
            .enumerate()
            .filter(|(_, c)| EXPECTED_COLUMNS.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();
        let mut insert_columns: Vec<String> = keep_indices
            .iter()
            .map(|&i| source_columns[i].clone())
            .collect();
        insert_columns.push(AGE_GROUP_COLUMN.to_string());

        let reference_year = self.reference_year.unwrap_or_else(|| Utc::now().year());

        while let Some(mut batch) = stream.next_batch().await? {
            apply_age_group(&mut batch, reference_year);
            let age_idx = batch.columns.len() - 1;

            let rows: Vec<Vec<Option<String>>> = batch
                .rows
                .into_iter()
                .map(|row| {
                    let mut aligned: Vec<Option<String>> = Vec::with_capacity(insert_columns.len());
                    for &i in &keep_indices {
                        aligned.push(row[i].clone());
                    }
                    aligned.push(row[age_idx].clone());
                    aligned
                })
                .collect();

            let inserted = self.store.insert_batch(&insert_columns, &rows).await?;
            outcome.rows_loaded += inserted;
            outcome.batches_written += 1;

            // Log every 10 batches or at 100k-row milestones, not per
            // batch, to keep multi-million-row runs readable.
            if total_rows > 0
                && (outcome.batches_written % 10 == 0
                    || outcome.rows_loaded % 100_000 < self.batch_size as u64)
            {
                let percent = (outcome.rows_loaded as f64 / total_rows as f64) * 100.0;
                info!(
                    rows_loaded = outcome.rows_loaded,
                    total_rows = total_rows,
                    percent = %format!("{percent:.1}"),
                    "Progress"
                );
            }
        }

        outcome.rows_skipped = stream.skipped_rows();
        if outcome.rows_skipped > 0 {
            warn!(
                rows_skipped = outcome.rows_skipped,
                "Malformed rows skipped during read"
            );
        }
        Ok(())
    }

    async fn locate_source(&self) -> Result<PathBuf> {
        let entry = self
            .manifest
            .get_latest_file(FileType::RegistrationData)
            .await
            .ok_or_else(|| {
                Error::SourceNotFound("no voter data file found in manifest".to_string())
            })?;

        let path = self.data_dir.join(&entry.filename);
        if !path.exists() {
            return Err(Error::SourceNotFound(format!(
                "file not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    async fn notify(&self, outcome: &LoadOutcome) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        info!("Sending completion notification...");
        let stats = match self.store.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to gather statistics for notification");
                return;
            }
        };

        // A lost notification must not fail the load.
        if let Err(e) = notifier.notify(&stats, outcome).await {
            warn!(error = %e, "Failed to send completion notification");
        }
    }
}
