//! Critique and quick-review commands - run the critic outside the pipeline

use std::path::PathBuf;

use clap::Args;
use codeops_core::{Config, CriticAgent, CritiqueResult, Secrets};

use super::{completion_client, read_input};

/// Arguments for the critique command
#[derive(Args, Debug)]
pub struct CritiqueArgs {
    /// File containing the plan
    #[arg(long)]
    pub plan: PathBuf,

    /// File containing the reflection on the plan
    #[arg(long)]
    pub reflection: PathBuf,

    /// File with additional context for the critic
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Print the critique as JSON
    #[arg(long)]
    pub json: bool,
}

impl CritiqueArgs {
    /// Execute the critique command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let plan = read_input(&self.plan)?;
        let reflection = read_input(&self.reflection)?;
        let context = match &self.context {
            Some(path) => read_input(path)?,
            None => String::new(),
        };

        let critic = CriticAgent::new(completion_client(config, &Secrets::load()?)?);
        let result = critic.critique(&plan, &reflection, &context).await?;
        print_result(&result, self.json)
    }
}

/// Arguments for the quick-review command
#[derive(Args, Debug)]
pub struct QuickReviewArgs {
    /// File containing the plan
    #[arg(long)]
    pub plan: PathBuf,

    /// Print the review as JSON
    #[arg(long)]
    pub json: bool,
}

impl QuickReviewArgs {
    /// Execute the quick-review command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let plan = read_input(&self.plan)?;

        let critic = CriticAgent::new(completion_client(config, &Secrets::load()?)?);
        let result = critic.quick_review(&plan).await?;
        print_result(&result, self.json)
    }
}

fn print_result(result: &CritiqueResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", CriticAgent::critique_summary(result));
    println!();
    println!("{}", result.text);
    Ok(())
}
