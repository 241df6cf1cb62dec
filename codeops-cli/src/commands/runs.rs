//! Runs command - list stored pipeline runs

use chrono::Local;
use clap::Args;
use codeops_core::{Config, RunStore, StoredRun};
use codeops_db::RunTotals;

use super::run::open_store;

/// List stored runs, newest first
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Maximum number of runs to show
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// Only show runs for this commit reference
    #[arg(short, long)]
    pub commit: Option<String>,

    /// Print the runs as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunsArgs {
    /// Execute the runs command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = open_store(config).await?;

        let runs = match &self.commit {
            Some(commit) => {
                let mut runs = store.runs().list_by_commit(commit).await?;
                runs.truncate(self.limit);
                runs
            }
            None => store.recent(self.limit).await?,
        };
        let totals = store.runs().totals().await?;

        if self.json {
            let records: Vec<_> = runs
                .iter()
                .map(|run| {
                    serde_json::json!({
                        "id": run.id,
                        "created_at": run.created_at,
                        "record": run.record,
                    })
                })
                .collect();
            let output = serde_json::json!({
                "runs": records,
                "totals": totals,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if runs.is_empty() {
            println!("No stored runs.");
        } else {
            println!("Recent Runs:");
            println!();
            for run in &runs {
                print_run(run);
            }
        }

        println!();
        println!("{}", totals_line(&totals));
        Ok(())
    }
}

fn print_run(run: &StoredRun) {
    let record = &run.record;
    let confidence = record
        .confidence()
        .map(|c| format!("{}/100", c))
        .unwrap_or_else(|| "-".to_string());

    println!(
        "  #{:<5} {}  {:<8} {:<12} {:>7.2}s  confidence {}  [{}]",
        run.id,
        run.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        record.verdict,
        record.commit_ref,
        record.latency_seconds,
        confidence,
        record.final_state,
    );
    if let Some(error) = &record.error {
        println!("          failed during {}: {}", error.stage, error.message);
    }
}

/// One-line summary over every stored run
fn totals_line(totals: &RunTotals) -> String {
    if totals.total == 0 {
        return "All runs: none stored".to_string();
    }

    let mut line = format!(
        "All runs: {} ({} succeeded, {:.0}%)",
        totals.total,
        totals.successes,
        totals.successes as f64 * 100.0 / totals.total as f64
    );
    if let Some(latency) = totals.avg_latency_seconds {
        line.push_str(&format!(", avg latency {:.2}s", latency));
    }
    if let Some(confidence) = totals.avg_confidence {
        line.push_str(&format!(", avg confidence {:.1}", confidence));
    }
    line
}
