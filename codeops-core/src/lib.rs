//! CodeOps Core - reasoning pipeline for the CodeOps agent
//!
//! This crate turns retrieved repository context into a critiqued action plan
//! through successive calls to an external text-completion service. The
//! collaborators it talks to (context store, notifier, repository host, run
//! store) are traits so the surrounding crates and tests can plug in their own.

pub mod completion;
pub mod confidence;
pub mod config;
pub mod context;
pub mod critic;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod prompts;
pub mod repository;
pub mod secrets;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use completion::{
    Completion, CompletionClient, CompletionError, CompletionRequest, CompletionService,
    OpenAiService, RetryPolicy,
};
pub use config::{CliOverrides, CompletionConfig, Config, DatabaseConfig, PipelineConfig};
pub use context::{ContextSnippet, ContextStore, InMemoryContextStore};
pub use critic::{CriticAgent, CritiqueResult, ReviewKind};
pub use error::{Error, Result};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use notify::{LogNotifier, Notifier, SlackNotifier};
pub use pipeline::{
    ContextAnalysis, ExecutionResult, ExecutionStatus, Pipeline, PipelineState, RunError,
    RunRecord, RunState, StageName, ToolOutcome, Verdict,
};
pub use repository::{PullRequest, RepositoryHost};
pub use secrets::Secrets;
pub use store::{RunStore, StoredRun};
