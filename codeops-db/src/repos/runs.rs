//! Repository for finished run records

use chrono::Utc;
use codeops_core::{RunRecord, StoredRun};
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::{RunRow, RunTotals};

/// Repository over the `run_records` table
pub struct RunRecordRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RunRecordRepository<'a> {
    /// Create a new run record repository
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a finished run, returning its id
    pub async fn insert(&self, record: &RunRecord) -> Result<i64> {
        let record_json = serde_json::to_string(record)?;

        let result = sqlx::query(
            r#"
            INSERT INTO run_records (
                commit_ref, verdict, latency_seconds, confidence,
                tokens_used, final_state, record_json, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.commit_ref)
        .bind(record.verdict.as_str())
        .bind(record.latency_seconds.max(0.0))
        .bind(record.confidence().map(i64::from))
        .bind(i64::try_from(record.tokens_used).unwrap_or(i64::MAX))
        .bind(record.final_state.as_str())
        .bind(&record_json)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a run by id
    pub async fn get_by_id(&self, id: i64) -> Result<StoredRun> {
        sqlx::query_as::<_, RunRow>("SELECT * FROM run_records WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => Error::NotFound(format!("run record {}", id)),
                e => e.into(),
            })?
            .into_stored()
    }

    /// Most recent runs, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<StoredRun>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query_as::<_, RunRow>(
            "SELECT * FROM run_records ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(RunRow::into_stored)
        .collect()
    }

    /// Runs for one commit reference, newest first
    pub async fn list_by_commit(&self, commit_ref: &str) -> Result<Vec<StoredRun>> {
        sqlx::query_as::<_, RunRow>(
            "SELECT * FROM run_records WHERE commit_ref = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(commit_ref)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(RunRow::into_stored)
        .collect()
    }

    /// Totals across every stored run
    pub async fn totals(&self) -> Result<RunTotals> {
        let (total, successes, avg_latency_seconds, avg_confidence): (
            i64,
            Option<i64>,
            Option<f64>,
            Option<f64>,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                SUM(CASE WHEN verdict = 'success' THEN 1 ELSE 0 END),
                AVG(latency_seconds),
                AVG(confidence)
            FROM run_records
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        Ok(RunTotals {
            total,
            successes: successes.unwrap_or(0),
            avg_latency_seconds,
            avg_confidence,
        })
    }
}
