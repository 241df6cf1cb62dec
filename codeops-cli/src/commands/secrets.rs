//! Secrets command - manage the credentials file

use clap::{Args, Subcommand};
use codeops_core::Secrets;

/// Manage ~/.config/codeops/secrets.toml
#[derive(Args, Debug)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// Create an empty secrets file with mode 0600
    Init,

    /// Show which credentials are available, without printing them
    Status,
}

impl SecretsArgs {
    /// Execute the secrets command
    pub fn execute(&self) -> anyhow::Result<()> {
        match self.command {
            SecretsCommand::Init => {
                let path = Secrets::create_template()?;
                println!("Created {}", path.display());
                println!("Add your credentials, or set OPENAI_API_KEY, GITHUB_TOKEN and SLACK_WEBHOOK_URL.");
            }
            SecretsCommand::Status => {
                let secrets = Secrets::load()?;
                let mark = |present: bool| if present { "set" } else { "missing" };
                println!("Secrets:");
                println!("  openai api key: {}", mark(secrets.openai_api_key().is_some()));
                println!("  github token: {}", mark(secrets.github_token().is_some()));
                println!("  slack webhook: {}", mark(secrets.slack_webhook_url().is_some()));
                if let Some(path) = Secrets::default_secrets_path() {
                    println!();
                    println!("Secrets file: {}", path.display());
                }
            }
        }
        Ok(())
    }
}
