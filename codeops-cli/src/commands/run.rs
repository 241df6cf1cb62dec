//! Run command - drive the pipeline for one commit

use std::sync::Arc;

use clap::Args;
use codeops_core::{
    Config, InMemoryContextStore, LogNotifier, MetricsAggregator, Notifier, Pipeline, RunRecord,
    Secrets, SlackNotifier,
};
use codeops_db::SqliteRunStore;
use codeops_github::GitHubClient;
use tracing::{info, warn};

use super::completion_client;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Commit reference to analyze (defaults to "latest")
    #[arg(short, long)]
    pub commit: Option<String>,

    /// Context documents available to retrieval (repeatable)
    #[arg(long = "context", value_name = "TEXT")]
    pub context: Vec<String>,

    /// Do not persist the run
    #[arg(long)]
    pub no_db: bool,

    /// Print the run record and metrics as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let secrets = Secrets::load()?;
        let client = completion_client(config, &secrets)?;

        let context_store = Arc::new(InMemoryContextStore::with_documents(self.context.clone()));
        let notifier = notifier(&secrets);
        let metrics = Arc::new(MetricsAggregator::new());

        let mut pipeline = Pipeline::new(
            client,
            context_store,
            notifier,
            metrics.clone(),
            config.pipeline.clone(),
        );

        if config.pipeline.repository_actions {
            match GitHubClient::from_secrets(&config.pipeline.repo, &secrets) {
                Ok(github) => pipeline = pipeline.with_repository(Arc::new(github)),
                Err(e) => warn!(error = %e, "Repository actions disabled"),
            }
        }

        if config.database.enabled && !self.no_db {
            pipeline = pipeline.with_store(Arc::new(open_store(config).await?));
        }

        info!(commit = self.commit.as_deref().unwrap_or("latest"), "Starting run");
        let record = pipeline.run(self.commit.as_deref()).await;
        let snapshot = metrics.snapshot();

        if self.json {
            let output = serde_json::json!({
                "record": record,
                "metrics": snapshot.to_json(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_record(&record);
            println!();
            println!("Metrics:");
            println!("  runs: {} ({} failed)", snapshot.total_runs, snapshot.failure_count());
            println!("  success rate: {:.0}%", snapshot.success_rate() * 100.0);
            println!("  avg latency: {:.2}s", snapshot.avg_latency_seconds());
            println!("  avg confidence: {:.1}", snapshot.avg_confidence());
            println!("  tokens: {}", snapshot.total_tokens);
        }

        if !record.verdict.is_success() {
            anyhow::bail!("Run failed in state {}", record.final_state);
        }

        Ok(())
    }
}

fn notifier(secrets: &Secrets) -> Arc<dyn Notifier> {
    match secrets.slack_webhook_url() {
        Some(url) => match SlackNotifier::new(url) {
            Ok(slack) => Arc::new(slack),
            Err(e) => {
                warn!(error = %e, "Falling back to log notifications");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    }
}

pub(crate) async fn open_store(config: &Config) -> anyhow::Result<SqliteRunStore> {
    let store = match &config.database.path {
        Some(path) => SqliteRunStore::open(path).await,
        None => SqliteRunStore::open_default().await,
    };
    store.map_err(|e| anyhow::anyhow!("Failed to open run database: {}", e))
}

fn print_record(record: &RunRecord) {
    println!("CodeOps Run");
    println!("===========");
    println!();
    println!("Commit: {}", record.commit_ref);
    println!("Run ID: {}", record.run_id());
    println!("Verdict: {}", record.verdict);
    println!("Final state: {}", record.final_state);
    println!("Latency: {:.2}s", record.latency_seconds);
    println!("Tokens: {}", record.tokens_used);

    if let Some(confidence) = record.confidence() {
        println!("Confidence: {}/100", confidence);
    }

    if let Some(execution) = &record.execution {
        println!();
        println!("Execution ({}):", execution.status);
        for action in &execution.actions_taken {
            println!("  - {}", action);
        }
        for outcome in &execution.tool_results {
            let mark = if outcome.ok { "ok" } else { "failed" };
            println!("  [{}] {}: {}", mark, outcome.tool, outcome.detail);
        }
        if let Some(url) = execution.pull_request_url() {
            println!("  Pull request: {}", url);
        }
    }

    if let Some(error) = &record.error {
        println!();
        println!("Failed during {}: {}", error.stage, error.message);
    }
}
