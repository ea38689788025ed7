use super::VoterStore;
use crate::columns::{AGE_GROUP_COLUMN, EXPECTED_COLUMNS, PARTY_COLUMN};
use async_trait::async_trait;
use common::{Error, Result};
use common::models::VoterStats;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// Postgres keeps bind parameters in a u16, so one statement can carry
/// at most 65535 binds. Leave headroom and chunk inserts accordingly.
const MAX_BIND_PARAMS: usize = 60_000;

pub struct PgVoterStore {
    pool: PgPool,
    table: String,
}

impl PgVoterStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Open a pool against the configured database and make sure the
    /// target table exists.
    pub async fn connect(database_url: &str, table: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        let store = Self::new(pool, table);
        store.ensure_table().await?;
        Ok(store)
    }

    /// Create the target schema and table when absent. All source
    /// fields are TEXT; drifted-away columns simply load as NULL.
    pub async fn ensure_table(&self) -> Result<()> {
        if let Some((schema, _)) = self.table.split_once('.') {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
                .execute(&self.pool)
                .await?;
        }

        let mut column_defs: Vec<String> = EXPECTED_COLUMNS
            .iter()
            .map(|c| format!("\"{c}\" TEXT"))
            .collect();
        column_defs.push(format!("\"{AGE_GROUP_COLUMN}\" TEXT"));

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            column_defs.join(", ")
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        info!(table = %self.table, "Ensured target table exists");
        Ok(())
    }
}

#[async_trait]
impl VoterStore for PgVoterStore {
    async fn count_rows(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn truncate(&self) -> Result<()> {
        sqlx::query(&format!("TRUNCATE TABLE {}", self.table))
            .execute(&self.pool)
            .await?;
        info!(table = %self.table, "Truncated existing data");
        Ok(())
    }

    async fn insert_batch(
        &self,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if columns.is_empty() {
            return Err(Error::Insert("batch has no columns".to_string()));
        }

        let column_list = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let rows_per_stmt = (MAX_BIND_PARAMS / columns.len()).max(1);

        // One transaction per batch keeps the batch all-or-nothing even
        // when it spans several INSERT statements.
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(rows_per_stmt) {
            let mut placeholders = Vec::with_capacity(chunk.len());
            let mut param = 1usize;
            for _ in chunk {
                let row_params: Vec<String> = (0..columns.len())
                    .map(|_| {
                        let p = format!("${param}");
                        param += 1;
                        p
                    })
                    .collect();
                placeholders.push(format!("({})", row_params.join(", ")));
            }

            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.table,
                column_list,
                placeholders.join(", ")
            );

            let mut query = sqlx::query(&sql);
            for row in chunk {
                if row.len() != columns.len() {
                    return Err(Error::Insert(format!(
                        "row has {} fields, expected {}",
                        row.len(),
                        columns.len()
                    )));
                }
                for value in row {
                    query = query.bind(value.as_deref());
                }
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(rows = rows.len(), table = %self.table, "Inserted batch");
        Ok(rows.len() as u64)
    }

    async fn stats(&self) -> Result<VoterStats> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT \"{PARTY_COLUMN}\", COUNT(*) FROM {} \
             WHERE \"{PARTY_COLUMN}\" IS NOT NULL GROUP BY \"{PARTY_COLUMN}\"",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut stats = VoterStats {
            total_voters: total as u64,
            ..Default::default()
        };
        for row in rows {
            let party: String = row.get(0);
            let count: i64 = row.get(1);
            stats.by_party.insert(party, count as u64);
        }
        Ok(stats)
    }
}
