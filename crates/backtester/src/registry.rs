//! Run and batch registry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use replay_core::types::{BatchSummary, Run};
use replay_core::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Registry of runs grouped into batches.
#[async_trait]
pub trait RunRegistry: Send + Sync {
    /// Runs recorded under a batch identifier.
    async fn batch_runs(&self, batch_id: Uuid) -> Result<Vec<Run>>;

    /// Distinct symbols traded by a run, from its ledger entries.
    async fn run_symbols(&self, run_id: i64) -> Result<Vec<String>>;

    /// Create a run row. Called once per replayed run, before any of
    /// its trades are written.
    async fn create_run(
        &self,
        strategy: &str,
        batch_id: Uuid,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Run>;

    /// Batches from the last `days` days, newest first.
    async fn recent_batches(&self, days: i64) -> Result<Vec<BatchSummary>>;
}

/// Postgres-backed run registry.
pub struct PgRunRegistry {
    pool: PgPool,
}

impl PgRunRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRegistry for PgRunRegistry {
    async fn batch_runs(&self, batch_id: Uuid) -> Result<Vec<Run>> {
        let rows = sqlx::query(
            r#"
            SELECT id, batch_id, strategy, start_time, duration_minutes, created_at
            FROM runs
            WHERE batch_id = $1
            ORDER BY id
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_run).collect())
    }

    async fn run_symbols(&self, run_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT symbol
            FROM trades
            WHERE run_id = $1
            ORDER BY symbol
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("symbol")).collect())
    }

    async fn create_run(
        &self,
        strategy: &str,
        batch_id: Uuid,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Run> {
        let row = sqlx::query(
            r#"
            INSERT INTO runs (batch_id, strategy, start_time, duration_minutes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, batch_id, strategy, start_time, duration_minutes, created_at
            "#,
        )
        .bind(batch_id)
        .bind(strategy)
        .bind(start_time)
        .bind(duration_minutes)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_run(&row))
    }

    async fn recent_batches(&self, days: i64) -> Result<Vec<BatchSummary>> {
        let cutoff = Utc::now() - Duration::days(days);

        let rows = sqlx::query(
            r#"
            SELECT batch_id,
                   min(strategy) AS strategy,
                   min(created_at) AS first_run_at,
                   count(*) AS run_count
            FROM runs
            WHERE created_at >= $1
            GROUP BY batch_id
            ORDER BY first_run_at DESC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| BatchSummary {
                batch_id: r.get("batch_id"),
                strategy: r.get("strategy"),
                first_run_at: r.get("first_run_at"),
                run_count: r.get("run_count"),
            })
            .collect())
    }
}

fn row_to_run(r: &sqlx::postgres::PgRow) -> Run {
    Run {
        id: r.get("id"),
        batch_id: r.get("batch_id"),
        strategy: r.get("strategy"),
        start_time: r.get("start_time"),
        duration_minutes: r.get("duration_minutes"),
        created_at: r.get("created_at"),
    }
}
