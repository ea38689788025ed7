//! Bulk-load pipeline for the North Carolina statewide voter
//! registration extract.
//!
//! The pipeline locates the latest downloaded file through the
//! manifest, streams it in batches, derives the age-group column, and
//! full-refreshes the raw voters table, notifying once on success.

pub mod age;
pub mod columns;
pub mod manifest;
pub mod reader;
pub mod refresh;
pub mod store;

use common::Result;
use common::config::Settings;
use common::models::LoadOutcome;
use manifest::ManifestStore;
use notification::{LogChannel, SnapshotStore, UpdateNotifier};
use refresh::RefreshController;
use std::sync::Arc;
use store::PgVoterStore;
use tracing::info;

/// Wire up the configured pipeline and run one full refresh.
pub async fn run_voter_load(
    config_path: &str,
    batch_size_override: Option<usize>,
) -> Result<LoadOutcome> {
    let settings = Settings::new(config_path)?;
    let batch_size = batch_size_override.unwrap_or(settings.loader.batch_size);

    info!(
        config = config_path,
        batch_size = batch_size,
        table = %settings.loader.table,
        "Starting voter load"
    );

    let store = Arc::new(
        PgVoterStore::connect(&settings.database.url(), &settings.loader.table).await?,
    );
    let manifest = ManifestStore::new(&settings.paths.manifest_path);

    let mut controller = RefreshController::new(
        manifest,
        &settings.paths.data_dir,
        store,
        batch_size,
        settings.loader.has_headers,
    );

    if settings.notification.enabled {
        let notifier = UpdateNotifier::new(
            SnapshotStore::new(&settings.paths.snapshot_path),
            Box::new(LogChannel),
        );
        controller = controller.with_notifier(Arc::new(notifier));
    }

    Ok(controller.run().await)
}
