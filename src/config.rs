use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 1800;
const DEFAULT_ANALYZER_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .patch-review.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Repository provisioning and git invocation settings
    #[serde(default)]
    pub repos: ReposConfig,

    /// Analyzer (Claude Code) invocation settings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token for comment fetching. If None, falls back to the
    /// GITHUB_TOKEN env var. Unauthenticated requests work but are rate-limited.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReposConfig {
    /// Base directory holding local clones as <base_dir>/<owner>/<repo>
    pub base_dir: Option<PathBuf>,

    /// Per-invocation timeout for git commands, in seconds
    pub command_timeout_secs: Option<u64>,

    /// Permit reset --hard + clean -fd when stashing a dirty tree fails.
    /// Destroys uncommitted work; off unless explicitly enabled.
    pub allow_destructive_reset: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzerConfig {
    /// Analyzer binary to invoke
    pub command: Option<String>,

    /// Timeout for one analyzer invocation, in seconds
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from .patch-review.toml in the current directory,
    /// or defaults if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".patch-review.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to the GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    /// Base directory for local clones; defaults to ~/repos.
    pub fn base_dir(&self) -> PathBuf {
        self.repos.base_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("repos")
        })
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(
            self.repos
                .command_timeout_secs
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        )
    }

    pub fn allow_destructive_reset(&self) -> bool {
        self.repos.allow_destructive_reset.unwrap_or(false)
    }

    pub fn analyzer_command(&self) -> String {
        self.analyzer
            .command
            .clone()
            .unwrap_or_else(|| "claude".to_string())
    }

    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs(
            self.analyzer
                .timeout_secs
                .unwrap_or(DEFAULT_ANALYZER_TIMEOUT_SECS),
        )
    }
}
