//! The multi-step reasoning pipeline
//!
//! `Start → ContextRetrieved → Analyzed → Planned → Reflected → Executed →
//! Critiqued → Summarized → Done`, with `Failed` reachable from any stage.

pub mod execution;
mod orchestrator;
mod record;
pub mod stages;
mod state;

pub use execution::{parse_actions, PlanExecutor, RequestedOperations};
pub use orchestrator::Pipeline;
pub use record::{
    ContextAnalysis, ExecutionResult, ExecutionStatus, RunError, RunRecord, RunState,
    ToolOutcome,
};
pub use stages::ReasoningStages;
pub use state::{PipelineState, StageName, Verdict};
