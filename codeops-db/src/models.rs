//! Database row types

use chrono::{DateTime, Utc};
use codeops_core::{RunRecord, StoredRun};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A row of the `run_records` table
///
/// The full record lives in `record_json`; the other columns are copies
/// kept for filtering and listing without decoding JSON.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunRow {
    pub id: i64,
    pub commit_ref: String,
    pub verdict: String,
    pub latency_seconds: f64,
    pub confidence: Option<i64>,
    pub tokens_used: i64,
    pub final_state: String,
    pub record_json: String,
    pub created_at: DateTime<Utc>,
}

impl RunRow {
    /// Decode the stored record
    pub fn into_stored(self) -> Result<StoredRun> {
        let record: RunRecord = serde_json::from_str(&self.record_json).map_err(|e| {
            Error::InvalidData(format!("run record {} does not decode: {}", self.id, e))
        })?;

        Ok(StoredRun {
            id: self.id,
            created_at: self.created_at,
            record,
        })
    }
}

/// Aggregate counts over stored runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub total: i64,
    pub successes: i64,
    pub avg_latency_seconds: Option<f64>,
    pub avg_confidence: Option<f64>,
}
