use super::VoterStore;
use crate::columns::PARTY_COLUMN;
use async_trait::async_trait;
use common::{Error, Result};
use common::models::VoterStats;
use std::sync::Mutex;

/// In-process store backing tests and dry runs. Mirrors the semantics
/// the Postgres store provides: ordered append, whole-table truncate,
/// party statistics.
#[derive(Default)]
pub struct MemoryVoterStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl MemoryVoterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> Vec<String> {
        self.inner.lock().unwrap().columns.clone()
    }

    pub fn rows(&self) -> Vec<Vec<Option<String>>> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn column_values(&self, column: &str) -> Vec<Option<String>> {
        let inner = self.inner.lock().unwrap();
        let Some(idx) = inner.columns.iter().position(|c| c == column) else {
            return Vec::new();
        };
        inner.rows.iter().map(|r| r[idx].clone()).collect()
    }
}

#[async_trait]
impl VoterStore for MemoryVoterStore {
    async fn count_rows(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().rows.len() as u64)
    }

    async fn truncate(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.rows.clear();
        inner.columns.clear();
        Ok(())
    }

    async fn insert_batch(
        &self,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.columns.is_empty() {
            inner.columns = columns.to_vec();
        } else if inner.columns != columns {
            return Err(Error::Insert(
                "batch columns do not match table columns".to_string(),
            ));
        }
        for row in rows {
            if row.len() != columns.len() {
                return Err(Error::Insert(format!(
                    "row has {} fields, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            inner.rows.push(row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn stats(&self) -> Result<VoterStats> {
        let inner = self.inner.lock().unwrap();
        let mut stats = VoterStats {
            total_voters: inner.rows.len() as u64,
            ..Default::default()
        };
        if let Some(idx) = inner.columns.iter().position(|c| c == PARTY_COLUMN) {
            for row in &inner.rows {
                if let Some(party) = &row[idx] {
                    *stats.by_party.entry(party.clone()).or_insert(0) += 1;
                }
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn insert_truncate_and_count() {
        let store = MemoryVoterStore::new();
        let columns = cols(&["county_desc", "party_cd"]);

        store
            .insert_batch(
                &columns,
                &[
                    vec![Some("Wake".to_string()), Some("DEM".to_string())],
                    vec![Some("Orange".to_string()), Some("REP".to_string())],
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.count_rows().await.unwrap(), 2);

        store.truncate().await.unwrap();
        assert_eq!(store.count_rows().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_counts_parties_skipping_nulls() {
        let store = MemoryVoterStore::new();
        let columns = cols(&["party_cd"]);
        store
            .insert_batch(
                &columns,
                &[
                    vec![Some("DEM".to_string())],
                    vec![Some("DEM".to_string())],
                    vec![Some("REP".to_string())],
                    vec![None],
                ],
            )
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_voters, 4);
        assert_eq!(stats.by_party["DEM"], 2);
        assert_eq!(stats.by_party["REP"], 1);
        assert!(!stats.by_party.contains_key("UNA"));
    }

    #[tokio::test]
    async fn mismatched_row_width_is_an_insert_error() {
        let store = MemoryVoterStore::new();
        let columns = cols(&["a", "b"]);
        let err = store
            .insert_batch(&columns, &[vec![Some("only one".to_string())]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Insert(_)));
    }
}
