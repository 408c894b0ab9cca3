use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
pub const DEFAULT_CONFIG_PATH: &str = ".ado-review/config.yml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub status_check: StatusCheckConfig,
}

/// Connection defaults. The token is never read from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub repository: Option<String>,
    pub auth: AuthScheme,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            project: None,
            repository: None,
            auth: AuthScheme::Basic,
        }
    }
}

/// Defaults for pull request status checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCheckConfig {
    pub genre: String,
    pub context: String,
}

impl Default for StatusCheckConfig {
    fn default() -> Self {
        Self {
            genre: "copilot".to_string(),
            context: "code review".to_string(),
        }
    }
}

/// How the token is presented in the Authorization header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Basic base64(":" + token)`, for personal access tokens
    #[default]
    Basic,
    /// `Bearer <token>`, for OAuth / pipeline access tokens
    Bearer,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub base_url: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub repository: Option<String>,
    pub pull_request_id: Option<u64>,
    pub token: Option<String>,
    pub auth: Option<AuthScheme>,
}

/// Fully resolved target pull request and credentials
#[derive(Clone)]
pub struct Connection {
    pub base_url: String,
    pub organization: String,
    pub project: String,
    pub repository: String,
    pub pull_request_id: u64,
    pub token: String,
    pub auth: AuthScheme,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("repository", &self.repository)
            .field("pull_request_id", &self.pull_request_id)
            .field("token", &"<redacted>")
            .field("auth", &self.auth)
            .finish()
    }
}

impl Connection {
    /// `org/project/repo!id`, for log and console output
    pub fn describe(&self) -> String {
        format!(
            "{}/{}/{}!{}",
            self.organization, self.project, self.repository, self.pull_request_id
        )
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Merge command line / environment values over the file defaults
    pub fn resolve_connection(&self, overrides: ConnectionOverrides) -> Result<Connection> {
        let defaults = &self.connection;

        let base_url = overrides
            .base_url
            .unwrap_or_else(|| defaults.base_url.clone());
        let organization = overrides
            .organization
            .or_else(|| defaults.organization.clone())
            .filter(|s| !s.trim().is_empty())
            .context("Missing organization: pass --organization or set AZURE_DEVOPS_ORG")?;
        let project = overrides
            .project
            .or_else(|| defaults.project.clone())
            .filter(|s| !s.trim().is_empty())
            .context("Missing project: pass --project or set AZURE_DEVOPS_PROJECT")?;
        let repository = overrides
            .repository
            .or_else(|| defaults.repository.clone())
            .filter(|s| !s.trim().is_empty())
            .context("Missing repository: pass --repository or set AZURE_DEVOPS_REPO")?;
        let pull_request_id = overrides
            .pull_request_id
            .context("Missing pull request id: pass --pr-id or set AZURE_DEVOPS_PR_ID")?;
        let token = overrides
            .token
            .filter(|s| !s.trim().is_empty())
            .context("Missing token: pass --token or set AZURE_DEVOPS_TOKEN")?;

        Ok(Connection {
            base_url,
            organization,
            project,
            repository,
            pull_request_id,
            token,
            auth: overrides.auth.unwrap_or(defaults.auth),
        })
    }
}
