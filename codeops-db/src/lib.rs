//! Database layer for CodeOps
//!
//! Persists finished pipeline runs in SQLite and serves them back newest
//! first. [`SqliteRunStore`] is the [`RunStore`] the pipeline writes to.

pub mod db;
pub mod error;
pub mod models;
pub mod repos;

use async_trait::async_trait;
use codeops_core::{RunRecord, RunStore, StoredRun};
use std::path::Path;
use tracing::debug;

pub use db::{Database, DatabaseConfig};
pub use error::{Error, Result};
pub use models::{RunRow, RunTotals};
pub use repos::RunRecordRepository;

/// Run store backed by a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteRunStore {
    db: Database,
}

impl SqliteRunStore {
    /// Open (and migrate) the database at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    /// Open the database at the default location
    pub async fn open_default() -> Result<Self> {
        Self::open(Database::default_path()?).await
    }

    /// Get the run records repository
    pub fn runs(&self) -> RunRecordRepository<'_> {
        RunRecordRepository::new(self.db.pool())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn save(&self, record: &RunRecord) -> codeops_core::Result<i64> {
        let id = self.runs().insert(record).await?;
        debug!(id, commit_ref = %record.commit_ref, "Stored run record");
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> codeops_core::Result<Vec<StoredRun>> {
        Ok(self.runs().recent(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeops_core::{PipelineState, RunError, RunState, StageName, Verdict};
    use tempfile::TempDir;

    fn record(commit_ref: &str, done: bool) -> RunRecord {
        let mut state = RunState::new(Some(commit_ref));
        state.plan = Some("1. Set ENV_VAR".to_string());
        state.add_tokens(25);
        state.finish();

        if done {
            state.into_record(PipelineState::Done, None)
        } else {
            state.into_record(
                PipelineState::Failed,
                Some(RunError {
                    stage: StageName::Reflection,
                    message: "Completion service unavailable".to_string(),
                }),
            )
        }
    }

    async fn store(dir: &TempDir) -> SqliteRunStore {
        SqliteRunStore::open(dir.path().join("runs.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let original = record("abc123", true);

        let id = store.save(&original).await.unwrap();
        let loaded = store.runs().get_by_id(id).await.unwrap();

        assert_eq!(loaded.id, id);
        assert_eq!(loaded.record, original);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        for commit in ["first", "second", "third"] {
            store.save(&record(commit, true)).await.unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        let commits: Vec<_> = recent.iter().map(|r| r.record.commit_ref.as_str()).collect();
        assert_eq!(commits, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn test_failed_run_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let id = store.save(&record("abc", false)).await.unwrap();
        let loaded = store.runs().get_by_id(id).await.unwrap().record;

        assert_eq!(loaded.verdict, Verdict::Failure);
        assert_eq!(loaded.error.unwrap().stage, StageName::Reflection);
    }

    #[tokio::test]
    async fn test_missing_id() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        assert!(matches!(
            store.runs().get_by_id(99).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_counts_and_totals() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        store.save(&record("a", true)).await.unwrap();
        store.save(&record("b", true)).await.unwrap();
        store.save(&record("a", false)).await.unwrap();

        let runs = store.runs();
        let for_a = runs.list_by_commit("a").await.unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].record.verdict, Verdict::Failure);

        let totals = runs.totals().await.unwrap();
        assert_eq!(totals.total, 3);
        assert_eq!(totals.successes, 2);
        // No critique on these records
        assert_eq!(totals.avg_confidence, None);
    }

    #[tokio::test]
    async fn test_empty_totals() {
        let dir = TempDir::new().unwrap();
        let totals = store(&dir).await.runs().totals().await.unwrap();
        assert_eq!(totals.total, 0);
        assert_eq!(totals.successes, 0);
        assert_eq!(totals.avg_latency_seconds, None);
    }
}
