//! Persistence boundary for finished runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::RunRecord;
use crate::Result;

/// A record as it was saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub record: RunRecord,
}

/// Durable run history
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Save a record, returning its id; saved records are never modified
    async fn save(&self, record: &RunRecord) -> Result<i64>;

    /// Most recent records, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<StoredRun>>;
}
