//! CodeOps CLI - Command line interface for the CodeOps agent
//!
//! Runs the analysis, planning, reflection, execution and critique pipeline
//! against a commit and reports the outcome.

mod commands;

use clap::{Parser, Subcommand};
use codeops_core::{CliOverrides, Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CritiqueArgs, QuickReviewArgs, RunArgs, RunsArgs, SecretsArgs};

/// CodeOps: self-correcting reasoning agent for CI/CD failures
#[derive(Parser, Debug)]
#[command(name = "codeops")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Model to use (overrides config and env)
    #[arg(long, global = true, env = "CODEOPS_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible completion endpoint (overrides config and env)
    #[arg(long, global = true, env = "CODEOPS_BASE_URL")]
    base_url: Option<String>,

    /// Repository as owner/repo (overrides config and env)
    #[arg(long, global = true, env = "CODEOPS_REPO")]
    repo: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Run the pipeline for a commit
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Critique a plan and its reflection
    Critique(CritiqueArgs),

    /// Quick review of a plan on its own
    QuickReview(QuickReviewArgs),

    /// List stored runs, newest first
    Runs(RunsArgs),

    /// Manage credentials
    Secrets(SecretsArgs),

    /// Show current configuration
    Config,
}

fn init_tracing(verbose: bool, json_logs: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration with overrides
    let config = Config::load_with_overrides(CliOverrides {
        model: cli.model.clone(),
        base_url: cli.base_url.clone(),
        repo: cli.repo.clone(),
        max_attempts: None,
    })?;

    if cli.verbose {
        tracing::info!(
            model = %config.completion.model,
            repo = %config.pipeline.repo,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("codeops {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Critique(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::QuickReview(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Runs(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Secrets(args)) => {
            args.execute()?;
        }
        Some(Commands::Config) => {
            print_config(&config);
        }
        None => {
            println!("CodeOps - self-correcting reasoning agent for CI/CD failures");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("CodeOps Configuration");
    println!("=====================");
    println!();
    println!("Completion:");
    println!(
        "  base_url: {}",
        config.completion.base_url.as_deref().unwrap_or("(default)")
    );
    println!("  model: {}", config.completion.model);
    println!("  temperature: {}", config.completion.temperature);
    println!("  max_tokens: {}", config.completion.max_tokens);
    println!("  timeout: {:?}", config.completion.timeout);
    println!("  max_attempts: {}", config.completion.max_attempts);
    println!("  base_delay: {:?}", config.completion.base_delay);
    println!();
    println!("Pipeline:");
    println!("  repo: {}", config.pipeline.repo);
    println!("  base_branch: {}", config.pipeline.base_branch);
    println!("  top_k: {}", config.pipeline.top_k);
    println!("  repository_actions: {}", config.pipeline.repository_actions);
    println!();
    println!("Database:");
    println!("  enabled: {}", config.database.enabled);
    println!(
        "  path: {}",
        config
            .database
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(default)".to_string())
    );
    println!();
    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_context() {
        let cli = Cli::try_parse_from([
            "codeops",
            "--repo",
            "acme/service",
            "run",
            "--commit",
            "abc123",
            "--context",
            "ENV_VAR is required by the deploy step",
            "--context",
            "CI runs on ubuntu",
            "--no-db",
        ])
        .unwrap();

        assert_eq!(cli.repo.as_deref(), Some("acme/service"));
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.commit.as_deref(), Some("abc123"));
                assert_eq!(args.context.len(), 2);
                assert!(args.no_db);
                assert!(!args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_critique_requires_reflection() {
        assert!(Cli::try_parse_from(["codeops", "critique", "--plan", "plan.md"]).is_err());
    }

    #[test]
    fn test_parse_runs_default_limit() {
        let cli = Cli::try_parse_from(["codeops", "runs"]).unwrap();
        match cli.command {
            Some(Commands::Runs(args)) => {
                assert_eq!(args.limit, 10);
                assert!(args.commit.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_runs_for_commit() {
        let cli = Cli::try_parse_from(["codeops", "runs", "--commit", "abc123", "-n", "3"]).unwrap();
        match cli.command {
            Some(Commands::Runs(args)) => {
                assert_eq!(args.commit.as_deref(), Some("abc123"));
                assert_eq!(args.limit, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_secrets_init() {
        let cli = Cli::try_parse_from(["codeops", "secrets", "init"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Secrets(SecretsArgs {
                command: commands::secrets::SecretsCommand::Init
            }))
        ));
    }
}
