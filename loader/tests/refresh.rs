use async_trait::async_trait;
use common::models::{LoadOutcome, VoterStats};
use common::{Error, Result};
use loader::manifest::{FileType, ManifestStore};
use loader::refresh::RefreshController;
use loader::store::{MemoryVoterStore, VoterStore};
use notification::CompletionNotifier;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const HEADER: &str = "county_desc\tparty_cd\tbirth_year";

/// Write a source file into a temp data dir and register it in a
/// manifest alongside it.
async fn setup(lines: &[&str]) -> (TempDir, ManifestStore) {
    let dir = tempfile::tempdir().unwrap();
    let content = lines.join("\n") + "\n";
    tokio::fs::write(dir.path().join("ncvoter_Statewide.txt"), content)
        .await
        .unwrap();

    let manifest = ManifestStore::new(dir.path().join("manifest.json"));
    manifest
        .add_entry(
            "ncvoter_Statewide.txt",
            "https://example.org/ncvoter_Statewide.zip",
            FileType::RegistrationData,
            BTreeMap::new(),
        )
        .await
        .unwrap();
    (dir, manifest)
}

fn controller(
    dir: &TempDir,
    manifest: ManifestStore,
    store: Arc<dyn VoterStore>,
) -> RefreshController {
    RefreshController::new(manifest, dir.path(), store, 1000, true).with_reference_year(2025)
}

#[tokio::test]
async fn loads_sample_file_and_derives_age_groups() {
    let (dir, manifest) = setup(&[HEADER, "Wake\tDEM\t1980", "Orange\tREP\t1975"]).await;
    let store = Arc::new(MemoryVoterStore::new());

    let outcome = controller(&dir, manifest, store.clone()).run().await;

    assert!(outcome.success, "error: {:?}", outcome.error);
    assert_eq!(outcome.rows_loaded, 2);
    assert_eq!(outcome.rows_skipped, 0);
    assert!(outcome.error.is_none());

    // Ages 45 and 50 in 2025.
    assert_eq!(
        store.column_values("age_group"),
        vec![Some("36-50".to_string()), Some("51-65".to_string())]
    );
    assert_eq!(
        store.column_values("county_desc"),
        vec![Some("Wake".to_string()), Some("Orange".to_string())]
    );
}

#[tokio::test]
async fn rerunning_truncates_and_reproduces_identical_table() {
    let (dir, manifest) = setup(&[HEADER, "Wake\tDEM\t1980", "Orange\tREP\t1975"]).await;
    let store = Arc::new(MemoryVoterStore::new());
    let controller = controller(&dir, manifest, store.clone());

    let first = controller.run().await;
    assert!(first.success);
    let rows_after_first = store.rows();

    let second = controller.run().await;
    assert!(second.success);
    assert_eq!(second.rows_loaded, first.rows_loaded);
    assert_eq!(store.rows(), rows_after_first);
    assert_eq!(store.count_rows().await.unwrap(), 2);
}

#[tokio::test]
async fn hostile_birth_years_load_as_unknown() {
    // Signed and overlong years are syntactically valid rows; the run
    // must complete and bucket them as Unknown, never panic.
    let (dir, manifest) = setup(&[
        HEADER,
        "Wake\tDEM\t-2147483648",
        "Orange\tREP\t-5",
        "Durham\tUNA\t99999999999999999999",
        "Guilford\tDEM\t1980",
    ])
    .await;
    let store = Arc::new(MemoryVoterStore::new());

    let outcome = controller(&dir, manifest, store.clone()).run().await;

    assert!(outcome.success, "error: {:?}", outcome.error);
    assert_eq!(outcome.rows_loaded, 4);
    assert_eq!(
        store.column_values("age_group"),
        vec![
            Some("Unknown".to_string()),
            Some("Unknown".to_string()),
            Some("Unknown".to_string()),
            Some("36-50".to_string()),
        ]
    );
}

#[tokio::test]
async fn malformed_rows_are_skipped_and_counted() {
    let (dir, manifest) = setup(&[
        HEADER,
        "Wake\tDEM\t1980",
        "garbage line",
        "Orange\tREP\t1975",
        "too\tmany\tfields\there",
        "Durham\tUNA\t1990",
    ])
    .await;
    let store = Arc::new(MemoryVoterStore::new());

    let outcome = controller(&dir, manifest, store.clone()).run().await;

    assert!(outcome.success);
    assert_eq!(outcome.rows_loaded, 3);
    assert_eq!(outcome.rows_skipped, 2);
    assert_eq!(store.count_rows().await.unwrap(), 3);
}

#[tokio::test]
async fn missing_expected_columns_warn_but_load_succeeds() {
    // No birth_year column at all.
    let (dir, manifest) = setup(&["county_desc\tparty_cd", "Wake\tDEM"]).await;
    let store = Arc::new(MemoryVoterStore::new());

    let outcome = controller(&dir, manifest, store.clone()).run().await;

    assert!(outcome.success);
    assert!(outcome.missing_columns.contains(&"birth_year".to_string()));
    assert_eq!(
        store.column_values("age_group"),
        vec![Some("Unknown".to_string())]
    );
}

#[tokio::test]
async fn unexpected_columns_are_dropped_without_aborting() {
    let (dir, manifest) = setup(&[
        "county_desc\tparty_cd\tbirth_year\tbrand_new_col",
        "Wake\tDEM\t1980\tsurprise",
    ])
    .await;
    let store = Arc::new(MemoryVoterStore::new());

    let outcome = controller(&dir, manifest, store.clone()).run().await;

    assert!(outcome.success);
    assert_eq!(outcome.rows_loaded, 1);
    assert!(!store.columns().contains(&"brand_new_col".to_string()));
}

#[tokio::test]
async fn empty_manifest_is_a_contained_failure() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = ManifestStore::new(dir.path().join("manifest.json"));
    let store = Arc::new(MemoryVoterStore::new());

    let outcome = controller(&dir, manifest, store).run().await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("manifest"));
}

#[tokio::test]
async fn missing_file_on_disk_is_a_contained_failure() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = ManifestStore::new(dir.path().join("manifest.json"));
    manifest
        .add_entry(
            "gone.txt",
            "https://example.org/gone.zip",
            FileType::RegistrationData,
            BTreeMap::new(),
        )
        .await
        .unwrap();
    let store = Arc::new(MemoryVoterStore::new());

    let outcome = controller(&dir, manifest, store).run().await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("file not found"));
}

/// Store whose inserts always fail, standing in for a constraint
/// violation at write time.
struct FailingStore;

#[async_trait]
impl VoterStore for FailingStore {
    async fn count_rows(&self) -> Result<u64> {
        Ok(0)
    }
    async fn truncate(&self) -> Result<()> {
        Ok(())
    }
    async fn insert_batch(&self, _: &[String], _: &[Vec<Option<String>>]) -> Result<u64> {
        Err(Error::Insert("constraint violation".to_string()))
    }
    async fn stats(&self) -> Result<VoterStats> {
        Ok(VoterStats::default())
    }
}

#[tokio::test]
async fn insert_error_fails_fast_without_raising() {
    let (dir, manifest) = setup(&[HEADER, "Wake\tDEM\t1980"]).await;

    let outcome = controller(&dir, manifest, Arc::new(FailingStore)).run().await;

    assert!(!outcome.success);
    assert_eq!(outcome.rows_loaded, 0);
    assert!(outcome.error.unwrap().contains("constraint violation"));
}

#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(VoterStats, LoadOutcome)>>,
    fail: bool,
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify(&self, stats: &VoterStats, outcome: &LoadOutcome) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((stats.clone(), outcome.clone()));
        if self.fail {
            Err(Error::Notification("smtp unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn notifier_is_invoked_once_with_post_load_stats() {
    let (dir, manifest) = setup(&[HEADER, "Wake\tDEM\t1980", "Orange\tREP\t1975"]).await;
    let store = Arc::new(MemoryVoterStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let outcome = controller(&dir, manifest, store)
        .with_notifier(notifier.clone())
        .run()
        .await;

    assert!(outcome.success);
    let calls = notifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (stats, seen_outcome) = &calls[0];
    assert_eq!(stats.total_voters, 2);
    assert_eq!(stats.by_party["DEM"], 1);
    assert_eq!(stats.by_party["REP"], 1);
    assert!(seen_outcome.success);
}

#[tokio::test]
async fn notifier_failure_never_fails_the_load() {
    let (dir, manifest) = setup(&[HEADER, "Wake\tDEM\t1980"]).await;
    let store = Arc::new(MemoryVoterStore::new());
    let notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..Default::default()
    });

    let outcome = controller(&dir, manifest, store)
        .with_notifier(notifier.clone())
        .run()
        .await;

    assert!(outcome.success);
    assert!(outcome.error.is_none());
    assert_eq!(notifier.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failure_never_reaches_the_notifier() {
    let (dir, manifest) = setup(&[HEADER, "Wake\tDEM\t1980"]).await;
    let notifier = Arc::new(RecordingNotifier::default());

    let outcome = controller(&dir, manifest, Arc::new(FailingStore))
        .with_notifier(notifier.clone())
        .run()
        .await;

    assert!(!outcome.success);
    assert!(notifier.calls.lock().unwrap().is_empty());
}
