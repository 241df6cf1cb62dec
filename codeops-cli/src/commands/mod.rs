//! CLI command implementations

pub mod review;
pub mod run;
pub mod runs;
pub mod secrets;

pub use review::{CritiqueArgs, QuickReviewArgs};
pub use run::RunArgs;
pub use runs::RunsArgs;
pub use secrets::SecretsArgs;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use codeops_core::{CompletionClient, Config, OpenAiService, Secrets};

/// Build the completion client from configuration and secrets
pub(crate) fn completion_client(config: &Config, secrets: &Secrets) -> anyhow::Result<CompletionClient> {
    let api_key = secrets.openai_api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "Completion API key not found. Set OPENAI_API_KEY environment variable \
             or add api_key to ~/.config/codeops/secrets.toml"
        )
    })?;

    let mut service = OpenAiService::new(api_key, &config.completion.model);
    if let Some(base_url) = &config.completion.base_url {
        service = service.with_base_url(base_url);
    }

    Ok(CompletionClient::from_config(Arc::new(service), &config.completion))
}

/// Read a text input file, naming it in the error
pub(crate) fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
