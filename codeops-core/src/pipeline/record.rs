//! Run state threaded through the pipeline and the record it becomes

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{PipelineState, StageName, Verdict};
use crate::critic::CritiqueResult;

/// Output of the context analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextAnalysis {
    /// Free-text analysis from the model
    pub analysis: String,
    /// Number of snippets that were analyzed
    pub snippet_count: usize,
    /// Leading characters of the joined snippets
    pub context_preview: String,
    pub timestamp: DateTime<Utc>,
}

/// How the execution stage finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// No repository operation ran
    SimulatedSuccess,
    /// Every repository operation succeeded
    Completed,
    /// At least one repository operation failed
    CompletedWithErrors,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::SimulatedSuccess => "simulated_success",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::CompletedWithErrors => "completed_with_errors",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempted repository operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Operation name (`create_branch`, `open_pull_request`, ...)
    pub tool: String,
    pub ok: bool,
    /// Result on success, error message on failure
    pub detail: String,
}

/// Output of the execution stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Action descriptions in plan order
    pub actions_taken: Vec<String>,
    /// Wall-clock seconds spent in the stage
    pub execution_time: f64,
    /// Repository operations attempted, in order
    pub tool_results: Vec<ToolOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// URL of the pull request opened during execution, if any
    pub fn pull_request_url(&self) -> Option<&str> {
        self.tool_results
            .iter()
            .find(|t| t.ok && t.tool == super::execution::TOOL_OPEN_PULL_REQUEST)
            .map(|t| t.detail.as_str())
    }
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub stage: StageName,
    pub message: String,
}

/// Mutable state for one pipeline invocation
///
/// Owned by exactly one run; stages fill in their field in order.
#[derive(Debug, Clone)]
pub struct RunState {
    pub commit_ref: String,
    pub context_snippets: Vec<String>,
    pub analysis: Option<ContextAnalysis>,
    pub plan: Option<String>,
    pub reflection: Option<String>,
    pub execution_result: Option<ExecutionResult>,
    pub critique: Option<CritiqueResult>,
    pub state: PipelineState,
    pub tokens_used: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub latency_seconds: f64,
    started: Instant,
}

impl RunState {
    /// Commit reference used when the caller does not supply one
    pub const DEFAULT_COMMIT_REF: &'static str = "latest";

    /// Start a run for the given commit reference
    pub fn new(commit_ref: Option<&str>) -> Self {
        let commit_ref = commit_ref
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(Self::DEFAULT_COMMIT_REF);

        Self {
            commit_ref: commit_ref.to_string(),
            context_snippets: Vec::new(),
            analysis: None,
            plan: None,
            reflection: None,
            execution_result: None,
            critique: None,
            state: PipelineState::Start,
            tokens_used: 0,
            started_at: Utc::now(),
            finished_at: None,
            latency_seconds: 0.0,
            started: Instant::now(),
        }
    }

    /// Move to the state reached by completing `stage`
    pub fn advance(&mut self, stage: StageName) {
        self.state = stage.completes();
    }

    /// Add tokens billed for a stage
    pub fn add_tokens(&mut self, tokens: u64) {
        self.tokens_used = self.tokens_used.saturating_add(tokens);
    }

    /// Stop the clock; latency covers entry to the last completed stage
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.latency_seconds = self.started.elapsed().as_secs_f64();
    }

    /// Turn the finished state into its durable record
    pub fn into_record(self, final_state: PipelineState, error: Option<RunError>) -> RunRecord {
        let verdict = if final_state == PipelineState::Done {
            Verdict::Success
        } else {
            Verdict::Failure
        };

        RunRecord {
            verdict,
            latency_seconds: self.latency_seconds.max(0.0),
            commit_ref: self.commit_ref,
            analysis: self.analysis,
            plan: self.plan,
            reflection: self.reflection,
            execution: self.execution_result,
            critique: self.critique,
            tokens_used: self.tokens_used,
            final_state,
            error,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Immutable result of a finished run
///
/// Field names are the integration point for the dashboard and the run
/// store, so they must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub verdict: Verdict,
    pub latency_seconds: f64,
    pub commit_ref: String,
    pub analysis: Option<ContextAnalysis>,
    pub plan: Option<String>,
    pub reflection: Option<String>,
    pub execution: Option<ExecutionResult>,
    pub critique: Option<CritiqueResult>,
    pub tokens_used: u64,
    pub final_state: PipelineState,
    pub error: Option<RunError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunRecord {
    /// Critic confidence, if the run got that far
    pub fn confidence(&self) -> Option<u8> {
        self.critique.as_ref().map(|c| c.confidence)
    }

    /// Short numeric id derived from the commit reference
    pub fn run_id(&self) -> u32 {
        run_id_for(&self.commit_ref)
    }
}

/// Deterministic four-digit id for a commit reference (FNV-1a)
pub(crate) fn run_id_for(commit_ref: &str) -> u32 {
    let hash = commit_ref
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
        });
    (hash % 10_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_commit_ref() {
        assert_eq!(RunState::new(None).commit_ref, "latest");
        assert_eq!(RunState::new(Some("  ")).commit_ref, "latest");
        assert_eq!(RunState::new(Some("abc123")).commit_ref, "abc123");
    }

    #[test]
    fn test_verdict_follows_final_state() {
        let mut state = RunState::new(Some("abc123"));
        state.finish();
        let record = state.clone().into_record(PipelineState::Done, None);
        assert_eq!(record.verdict, Verdict::Success);

        let record = state.into_record(
            PipelineState::Failed,
            Some(RunError {
                stage: StageName::Planning,
                message: "boom".to_string(),
            }),
        );
        assert_eq!(record.verdict, Verdict::Failure);
        assert_eq!(record.error.unwrap().stage, StageName::Planning);
    }

    #[test]
    fn test_latency_is_non_negative() {
        let mut state = RunState::new(None);
        state.finish();
        assert!(state.latency_seconds >= 0.0);
        assert!(state.finished_at.unwrap() >= state.started_at);
    }

    #[test]
    fn test_record_json_fields() {
        let mut state = RunState::new(Some("deadbeef"));
        state.plan = Some("1. Fix it".to_string());
        state.add_tokens(42);
        state.finish();

        let json = serde_json::to_value(state.into_record(PipelineState::Done, None)).unwrap();
        for field in [
            "verdict",
            "latency_seconds",
            "commit_ref",
            "analysis",
            "plan",
            "reflection",
            "execution",
            "critique",
            "started_at",
            "finished_at",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["verdict"], "success");
        assert_eq!(json["tokens_used"], 42);
        assert_eq!(json["final_state"], "done");
    }

    #[test]
    fn test_run_id_is_stable() {
        assert_eq!(run_id_for("abc123"), run_id_for("abc123"));
        assert!(run_id_for("abc123") < 10_000);
    }
}
