//! Normalizes source-control webhook deliveries into one provider-agnostic
//! event model.
//!
//! The Gitee provider lives in [`gitee`]; the model in [`webhook`].

pub mod error;
pub mod gitee;
pub mod logging;
pub mod utils;
pub mod webhook;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{BoxError, WebhookError};
use crate::gitee::{PayloadSchema, SecretResolver, WebhookService};
use crate::webhook::{Repository, Webhook};

/// Relay configuration, read from TOML
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub schema: PayloadSchema,
    /// Secret for repositories without their own entry
    pub default_secret: Option<String>,
    /// Directory for rolling log files; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Rotated log files to keep
    pub log_max_files: Option<usize>,
    #[serde(default)]
    pub repository: Vec<RepositoryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConfig {
    pub namespace: String,
    pub name: String,
    pub secret: Option<String>,
}

impl RepositoryConfig {
    pub fn matches(&self, repo: &Repository) -> bool {
        self.namespace == repo.namespace && self.name == repo.name
    }
}

impl RelayConfig {
    /// Load and parse the configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WebhookError> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            WebhookError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, WebhookError> {
        let config: RelayConfig = toml::from_str(s)?;
        for repo in &config.repository {
            if repo.namespace.is_empty() || repo.name.is_empty() {
                return Err(WebhookError::Config(
                    "repository entries need a namespace and a name".to_string(),
                ));
            }
        }
        Ok(config)
    }

    /// Secret for a repository: its own entry first, then the default.
    /// Empty when neither is set, which disables verification.
    pub fn secret_for(&self, repo: &Repository) -> &str {
        self.repository
            .iter()
            .find(|r| r.matches(repo))
            .and_then(|r| r.secret.as_deref())
            .or(self.default_secret.as_deref())
            .unwrap_or_default()
    }
}

impl SecretResolver for RelayConfig {
    fn resolve(&self, hook: &Webhook) -> Result<String, BoxError> {
        Ok(self.secret_for(hook.repository()).to_string())
    }
}

pub struct AppState {
    pub service: WebhookService,
    pub config: RelayConfig,
}

pub type SharedState = Arc<AppState>;
