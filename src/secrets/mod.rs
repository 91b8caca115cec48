//! Secret store access for the expected API key.
//!
//! Supports multiple backends:
//! - Environment variables (local development)
//! - In-memory (for testing)
//! - AWS Secrets Manager - requires `secrets-aws` feature

#[cfg(feature = "secrets-aws")]
mod aws;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(feature = "secrets-aws")]
pub use aws::{AwsSecretsManager, AwsSecretsManagerConfig};
use thiserror::Error;

use crate::config::SecretsConfig;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SecretResult<T> = Result<T, SecretError>;

/// Read access to a secret store.
///
/// Implementations are shared across concurrent requests for the lifetime of
/// the process.
#[async_trait]
pub trait SecretManager: Send + Sync {
    /// Get a secret's raw string value by name. Returns None if not found.
    async fn get(&self, name: &str) -> SecretResult<Option<String>>;

    /// Check if the secret manager is healthy/connected.
    async fn health_check(&self) -> SecretResult<()> {
        Ok(())
    }
}

/// In-memory secret manager (for testing only)
pub struct MemorySecretManager {
    secrets: Arc<dashmap::DashMap<String, String>>,
}

impl MemorySecretManager {
    pub fn new() -> Self {
        Self {
            secrets: Arc::new(dashmap::DashMap::new()),
        }
    }

    /// Builder-style insert.
    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.secrets.remove(name);
    }
}

impl Default for MemorySecretManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretManager for MemorySecretManager {
    async fn get(&self, name: &str) -> SecretResult<Option<String>> {
        Ok(self.secrets.get(name).map(|v| v.value().clone()))
    }
}

/// Environment-based secret manager.
///
/// Secret names are mapped to environment variable names by upper-casing
/// and replacing every non-alphanumeric character with `_`, so
/// `denodo-poc/api/auth-key` is read from `DENODO_POC_API_AUTH_KEY`.
pub struct EnvSecretManager;

impl EnvSecretManager {
    pub fn new() -> Self {
        Self
    }

    pub fn var_name(name: &str) -> String {
        name.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Default for EnvSecretManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretManager for EnvSecretManager {
    async fn get(&self, name: &str) -> SecretResult<Option<String>> {
        Ok(std::env::var(Self::var_name(name)).ok())
    }
}

/// Build the secret manager selected by configuration.
///
/// Returns `None` when no store is configured. Remote backends are probed
/// once; a failed probe is logged but does not abort startup, since the
/// credential validator treats an unreachable store as a degraded state
/// rather than a fatal one.
pub async fn build_secret_manager(
    config: &SecretsConfig,
) -> SecretResult<Option<Arc<dyn SecretManager>>> {
    let manager: Arc<dyn SecretManager> = match config {
        SecretsConfig::None => {
            tracing::warn!(
                "No secrets manager configured. The expected API key cannot be fetched; \
                 requests are only admitted if auth.fallback is enabled."
            );
            return Ok(None);
        }
        SecretsConfig::Env => Arc::new(EnvSecretManager::new()),
        #[cfg(feature = "secrets-aws")]
        SecretsConfig::Aws(aws_config) => {
            let mut cfg = match &aws_config.region {
                Some(region) => AwsSecretsManagerConfig::new(region),
                None => AwsSecretsManagerConfig::from_env(),
            }
            .with_prefix(&aws_config.prefix);

            if let Some(endpoint_url) = &aws_config.endpoint_url {
                cfg = cfg.with_endpoint_url(endpoint_url);
            }

            let manager = AwsSecretsManager::new(cfg).await?;

            match manager.health_check().await {
                Ok(()) => tracing::info!(
                    region = ?aws_config.region,
                    prefix = %aws_config.prefix,
                    "Connected to AWS Secrets Manager"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    region = ?aws_config.region,
                    "AWS Secrets Manager is not reachable at startup"
                ),
            }

            Arc::new(manager)
        }
    };

    Ok(Some(manager))
}
