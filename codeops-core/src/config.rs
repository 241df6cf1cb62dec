//! Configuration management for the CodeOps agent
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (CODEOPS_*)
//! 3. Config file (~/.config/codeops/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Completion service configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// OpenAI-compatible endpoint (None for the public OpenAI API)
    pub base_url: Option<String>,

    /// Model to request
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on generated tokens per call
    pub max_tokens: u32,

    /// Timeout for a single attempt
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Attempts per call, including the first
    pub max_attempts: u32,

    /// Backoff delay after the first failure; doubles after each further failure
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1, // Low temperature for consistent reasoning
            max_tokens: 1000,
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Reasoning pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Repository the agent works on (owner/repo)
    pub repo: String,

    /// Branch that fix branches are cut from
    pub base_branch: String,

    /// Number of context snippets to retrieve
    pub top_k: usize,

    /// Characters of joined context kept as the preview passed to later stages
    pub context_preview_chars: usize,

    /// Characters of plan/reflection text included in notifications
    pub notification_preview_chars: usize,

    /// Allow the execution stage to mutate the hosted repository
    pub repository_actions: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repo: "octocat/Hello-World".to_string(),
            base_branch: "main".to_string(),
            top_k: 5,
            context_preview_chars: 500,
            notification_preview_chars: 400,
            repository_actions: false,
        }
    }
}

/// Run history database configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Whether completed runs are persisted
    pub enabled: bool,

    /// Database file (None for ~/.cache/codeops/codeops.db)
    pub path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Completion service configuration
    pub completion: CompletionConfig,

    /// Pipeline configuration
    pub pipeline: PipelineConfig,

    /// Database configuration
    pub database: DatabaseConfig,
}

/// Overrides supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub repo: Option<String>,
    pub max_attempts: Option<u32>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/codeops/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("codeops").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - CODEOPS_MODEL: Model to use
    /// - CODEOPS_BASE_URL: Completion endpoint
    /// - CODEOPS_REPO: Repository (owner/repo)
    /// - CODEOPS_MAX_ATTEMPTS: Attempts per completion call
    /// - CODEOPS_DB_PATH: Run history database file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("CODEOPS_MODEL") {
            self.completion.model = model;
        }

        if let Ok(base_url) = std::env::var("CODEOPS_BASE_URL") {
            self.completion.base_url = Some(base_url);
        }

        if let Ok(repo) = std::env::var("CODEOPS_REPO") {
            self.pipeline.repo = repo;
        }

        if let Some(attempts) = std::env::var("CODEOPS_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.completion.max_attempts = attempts;
        }

        if let Ok(path) = std::env::var("CODEOPS_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(model) = overrides.model {
            self.completion.model = model;
        }

        if let Some(base_url) = overrides.base_url {
            self.completion.base_url = Some(base_url);
        }

        if let Some(repo) = overrides.repo {
            self.pipeline.repo = repo;
        }

        if let Some(attempts) = overrides.max_attempts {
            self.completion.max_attempts = attempts;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(overrides: CliOverrides) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()
            .with_cli_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.completion.max_attempts == 0 {
            return Err(Error::Config(
                "completion.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.pipeline.top_k == 0 {
            return Err(Error::Config("pipeline.top_k must be at least 1".to_string()));
        }

        Ok(())
    }
}
