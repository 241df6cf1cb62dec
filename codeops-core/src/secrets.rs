//! Secrets management for the CodeOps agent
//!
//! Secrets are stored separately from configuration to avoid accidental sharing.
//! The secrets file is located at `~/.config/codeops/secrets.toml` and must have
//! restrictive permissions (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variables (OPENAI_API_KEY, GITHUB_TOKEN, SLACK_WEBHOOK_URL)
//! 2. Secrets file (~/.config/codeops/secrets.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// Completion service credentials
    pub openai: OpenAiSecrets,
    /// GitHub credentials
    pub github: GitHubSecrets,
    /// Slack notification endpoint
    pub slack: SlackSecrets,
}

/// Completion service secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiSecrets {
    /// API key
    pub api_key: Option<String>,
}

/// GitHub-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// GitHub Personal Access Token
    pub token: Option<String>,
}

/// Slack-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SlackSecrets {
    /// Incoming webhook URL
    pub webhook_url: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = std::fs::metadata(path).map_err(Error::Io)?;
            let mode = metadata.permissions().mode();

            // Readable by group or others
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), mode = format!("{:o}", mode & 0o777), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        for value in [
            &mut secrets.openai.api_key,
            &mut secrets.github.token,
            &mut secrets.slack.webhook_url,
        ]
        .into_iter()
        .flatten()
        {
            *value = value.trim().to_string();
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/codeops/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("codeops").join("secrets.toml"))
    }

    /// Completion service API key, preferring OPENAI_API_KEY
    pub fn openai_api_key(&self) -> Option<String> {
        resolve("OPENAI_API_KEY", self.openai.api_key.as_deref())
    }

    /// GitHub token, preferring GITHUB_TOKEN
    pub fn github_token(&self) -> Option<String> {
        resolve("GITHUB_TOKEN", self.github.token.as_deref())
    }

    /// Slack webhook URL, preferring SLACK_WEBHOOK_URL
    pub fn slack_webhook_url(&self) -> Option<String> {
        resolve("SLACK_WEBHOOK_URL", self.slack.webhook_url.as_deref())
    }

    /// Write an empty secrets file at the default location
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;
        Self::create_template_at(&path)?;
        Ok(path)
    }

    /// Write an empty secrets file at `path` with mode 0600
    ///
    /// Refuses to overwrite an existing file.
    pub fn create_template_at(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let template = toml::to_string_pretty(&Secrets::default())
            .map_err(|e| Error::Config(format!("Failed to render secrets template: {}", e)))?;
        let contents = format!("{}\n{}", SECRETS_HEADER, template);

        std::fs::write(path, contents).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(Error::Io)?;
        }

        warn!(path = %path.display(), "Created secrets template, add credentials before running");
        Ok(())
    }
}

const SECRETS_HEADER: &str = "\
# CodeOps secrets: do not commit this file. It must stay chmod 600.
#
# [openai]   api_key = \"sk-...\"
# [github]   token = \"ghp_...\"  (contents and pull requests read/write)
# [slack]    webhook_url = \"https://hooks.slack.com/services/...\"
";

fn resolve(env_var: &str, from_file: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim().to_string();
        if !value.is_empty() {
            debug!(env_var, "Using secret from environment");
            return Some(value);
        }
    }

    from_file
        .filter(|v| !v.is_empty())
        .map(|v| {
            debug!(env_var, "Using secret from secrets file");
            v.to_string()
        })
}
