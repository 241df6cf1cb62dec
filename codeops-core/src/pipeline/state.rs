//! Pipeline states, stage names and verdicts

use serde::{Deserialize, Serialize};

/// Position of a run in the reasoning state machine
///
/// Transitions are strictly sequential; any stage may instead move the run to
/// [`PipelineState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Run created, nothing done yet
    #[default]
    Start,
    /// Context snippets fetched (possibly none)
    ContextRetrieved,
    /// Context analysis produced
    Analyzed,
    /// Action plan produced
    Planned,
    /// Reflection on the plan produced
    Reflected,
    /// Plan executed (simulated unless repository actions are enabled)
    Executed,
    /// Critic review produced
    Critiqued,
    /// Final summary sent
    Summarized,
    /// Run finished successfully
    Done,
    /// Run stopped at a failing stage
    Failed,
}

impl PipelineState {
    /// Get the next state on the success path
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Start => Some(PipelineState::ContextRetrieved),
            PipelineState::ContextRetrieved => Some(PipelineState::Analyzed),
            PipelineState::Analyzed => Some(PipelineState::Planned),
            PipelineState::Planned => Some(PipelineState::Reflected),
            PipelineState::Reflected => Some(PipelineState::Executed),
            PipelineState::Executed => Some(PipelineState::Critiqued),
            PipelineState::Critiqued => Some(PipelineState::Summarized),
            PipelineState::Summarized => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// The stage that runs from this state, if any
    pub fn pending_stage(&self) -> Option<StageName> {
        match self {
            PipelineState::Start => Some(StageName::ContextRetrieval),
            PipelineState::ContextRetrieved => Some(StageName::Analysis),
            PipelineState::Analyzed => Some(StageName::Planning),
            PipelineState::Planned => Some(StageName::Reflection),
            PipelineState::Reflected => Some(StageName::Execution),
            PipelineState::Executed => Some(StageName::Critique),
            PipelineState::Critiqued
            | PipelineState::Summarized
            | PipelineState::Done
            | PipelineState::Failed => None,
        }
    }

    /// Stable identifier used in logs and records
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::ContextRetrieved => "context_retrieved",
            PipelineState::Analyzed => "analyzed",
            PipelineState::Planned => "planned",
            PipelineState::Reflected => "reflected",
            PipelineState::Executed => "executed",
            PipelineState::Critiqued => "critiqued",
            PipelineState::Summarized => "summarized",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reasoning step that can fail a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ContextRetrieval,
    Analysis,
    Planning,
    Reflection,
    Execution,
    Critique,
}

impl StageName {
    /// Stable identifier used in logs and records
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::ContextRetrieval => "context_retrieval",
            StageName::Analysis => "analysis",
            StageName::Planning => "planning",
            StageName::Reflection => "reflection",
            StageName::Execution => "execution",
            StageName::Critique => "critique",
        }
    }

    /// The state a run reaches when this stage completes
    pub fn completes(&self) -> PipelineState {
        match self {
            StageName::ContextRetrieval => PipelineState::ContextRetrieved,
            StageName::Analysis => PipelineState::Analyzed,
            StageName::Planning => PipelineState::Planned,
            StageName::Reflection => PipelineState::Reflected,
            StageName::Execution => PipelineState::Executed,
            StageName::Critique => PipelineState::Critiqued,
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::Failure => "failure",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(Verdict::Success),
            "failure" => Ok(Verdict::Failure),
            other => Err(format!("unknown verdict: {}", other)),
        }
    }
}
