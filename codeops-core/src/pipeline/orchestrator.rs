//! Pipeline orchestrator
//!
//! Drives one [`RunState`] through every stage in order and always hands back
//! a [`RunRecord`]. Only a stage whose completion call gives out moves the
//! run to `Failed`; context, notification, repository and persistence errors
//! are logged and absorbed.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::execution::PlanExecutor;
use super::record::{RunError, RunRecord, RunState};
use super::stages::ReasoningStages;
use super::state::{PipelineState, StageName, Verdict};
use crate::completion::CompletionClient;
use crate::config::PipelineConfig;
use crate::context::ContextStore;
use crate::critic::CriticAgent;
use crate::metrics::MetricsAggregator;
use crate::notify::{self, Notifier};
use crate::repository::RepositoryHost;
use crate::store::RunStore;
use crate::{Error, Result};

/// The reasoning pipeline and its collaborators
///
/// A pipeline is shared freely between concurrent runs; each run owns its
/// state and only the metrics aggregator is shared.
#[derive(Clone)]
pub struct Pipeline {
    stages: ReasoningStages,
    critic: CriticAgent,
    executor: PlanExecutor,
    context_store: Arc<dyn ContextStore>,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<dyn RunStore>>,
    metrics: Arc<MetricsAggregator>,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .field("executor", &self.executor)
            .field("context_store", &self.context_store.name())
            .field("notifier", &self.notifier.name())
            .field("store", &self.store.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline that simulates execution and persists nothing
    pub fn new(
        client: CompletionClient,
        context_store: Arc<dyn ContextStore>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<MetricsAggregator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            stages: ReasoningStages::new(client.clone(), config.context_preview_chars),
            critic: CriticAgent::new(client),
            executor: PlanExecutor::simulated(),
            context_store,
            notifier,
            store: None,
            metrics,
            config,
        }
    }

    /// Allow the execution stage to act on a hosted repository
    pub fn with_repository(mut self, repository: Arc<dyn RepositoryHost>) -> Self {
        self.executor = PlanExecutor::with_repository(
            repository,
            self.config.repository_actions,
            self.config.base_branch.clone(),
        );
        self
    }

    /// Persist every finished run
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Run the pipeline for a commit (`"latest"` when `None`)
    ///
    /// Never fails: a failing stage yields a record with verdict `failure`.
    pub async fn run(&self, commit_ref: Option<&str>) -> RunRecord {
        let mut run = RunState::new(commit_ref);
        info!(commit_ref = %run.commit_ref, repo = %self.config.repo, "Starting reasoning pipeline");

        let outcome = self.drive(&mut run).await;
        run.finish();

        let (final_state, run_error) = match outcome {
            Ok(()) => {
                info!(
                    commit_ref = %run.commit_ref,
                    latency_seconds = run.latency_seconds,
                    tokens = run.tokens_used,
                    "Reasoning pipeline completed"
                );
                (PipelineState::Done, None)
            }
            Err(e) => {
                let stage = failed_stage(&e, run.state);
                error!(
                    commit_ref = %run.commit_ref,
                    stage = %stage,
                    reached = %run.state,
                    error = %e,
                    "Reasoning pipeline failed"
                );
                self.notify(
                    "error",
                    notify::error_message(
                        &e.to_string(),
                        Some(&format!("Commit: {}, Repo: {}", run.commit_ref, self.config.repo)),
                    ),
                )
                .await;
                (
                    PipelineState::Failed,
                    Some(RunError {
                        stage,
                        message: e.to_string(),
                    }),
                )
            }
        };

        let verdict = if final_state == PipelineState::Done {
            Verdict::Success
        } else {
            Verdict::Failure
        };
        self.metrics.record_run(verdict, run.latency_seconds);
        self.metrics.record_tokens(run.tokens_used);

        let record = run.into_record(final_state, run_error);
        self.persist(&record).await;
        record
    }

    async fn drive(&self, run: &mut RunState) -> Result<()> {
        self.retrieve_context(run).await;

        self.stages.analyze(run).await?;

        self.stages.plan(run).await?;
        if let Some(plan) = &run.plan {
            let message = notify::plan_message(plan, self.config.notification_preview_chars);
            self.notify("plan", message).await;
        }

        self.stages.reflect(run).await?;
        if let Some(reflection) = &run.reflection {
            let message =
                notify::reflection_message(reflection, self.config.notification_preview_chars);
            self.notify("reflection", message).await;
        }

        let plan = run.plan.clone().unwrap_or_default();
        let execution = self.executor.execute(&plan, &run.commit_ref).await;
        let pr_url = execution.pull_request_url().map(str::to_string);
        run.execution_result = Some(execution);
        run.advance(StageName::Execution);

        let reflection = run.reflection.clone().unwrap_or_default();
        let context = run
            .analysis
            .as_ref()
            .map(|a| a.context_preview.clone())
            .unwrap_or_default();
        let critique = self
            .critic
            .critique(&plan, &reflection, &context)
            .await
            .map_err(|e| e.in_stage(StageName::Critique))?;
        self.metrics.record_critic(critique.confidence);
        run.add_tokens(critique.tokens_used);
        info!(confidence = critique.confidence, "Critic review recorded");

        let summary = CriticAgent::critique_summary(&critique);
        run.critique = Some(critique);
        run.advance(StageName::Critique);
        self.notify("critique", notify::critique_message(&summary)).await;

        let message = notify::run_summary_message(
            Verdict::Success,
            &self.config.repo,
            Some(super::record::run_id_for(&run.commit_ref)),
            pr_url.as_deref(),
        );
        self.notify("summary", message).await;
        run.state = PipelineState::Summarized;

        Ok(())
    }

    async fn retrieve_context(&self, run: &mut RunState) {
        match self
            .context_store
            .retrieve(&run.commit_ref, self.config.top_k)
            .await
        {
            Ok(snippets) => {
                info!(
                    store = self.context_store.name(),
                    snippets = snippets.len(),
                    "Context retrieved"
                );
                run.context_snippets = snippets.into_iter().map(|s| s.text).collect();
            }
            Err(e) => {
                let degraded = match e {
                    Error::ContextRetrievalDegraded(_) => e,
                    other => Error::ContextRetrievalDegraded(other.to_string()),
                };
                warn!(
                    store = self.context_store.name(),
                    error = %degraded,
                    "Continuing without context"
                );
                run.context_snippets.clear();
            }
        }
        run.advance(StageName::ContextRetrieval);
    }

    async fn notify(&self, milestone: &str, message: String) {
        if let Err(e) = self.notifier.push(&message).await {
            warn!(
                milestone,
                notifier = self.notifier.name(),
                error = %e,
                "Notification dropped"
            );
        }
    }

    async fn persist(&self, record: &RunRecord) {
        let Some(store) = &self.store else {
            return;
        };

        match store.save(record).await {
            Ok(id) => info!(run_id = id, verdict = %record.verdict, "Run record saved"),
            Err(e) => warn!(error = %e, "Failed to save run record"),
        }
    }
}

fn failed_stage(error: &Error, reached: PipelineState) -> StageName {
    match error {
        Error::StageFailed { stage, .. } => *stage,
        _ => reached.pending_stage().unwrap_or(StageName::Critique),
    }
}
