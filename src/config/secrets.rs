//! Secrets manager configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the secret store that holds the expected API key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretsConfig {
    /// No secret store. The expected key is never available, so requests are
    /// only admitted through `auth.fallback`.
    #[default]
    None,

    /// Environment variable-based secrets.
    /// The secret name is mapped to `UPPER_SNAKE_CASE`
    /// (`denodo-poc/api/auth-key` → `DENODO_POC_API_AUTH_KEY`).
    Env,

    /// AWS Secrets Manager. Requires the `secrets-aws` feature.
    #[cfg(feature = "secrets-aws")]
    Aws(AwsSecretsConfig),
}

impl SecretsConfig {
    pub fn is_none(&self) -> bool {
        matches!(self, SecretsConfig::None)
    }

    /// Short backend name for logs and health output.
    pub fn backend_name(&self) -> &'static str {
        match self {
            SecretsConfig::None => "none",
            SecretsConfig::Env => "env",
            #[cfg(feature = "secrets-aws")]
            SecretsConfig::Aws(_) => "aws",
        }
    }
}

#[cfg(feature = "secrets-aws")]
/// Configuration for AWS Secrets Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSecretsConfig {
    /// AWS region (e.g., "eu-west-3"). If not set, uses the AWS_REGION environment variable.
    #[serde(default)]
    pub region: Option<String>,

    /// Prefix prepended to the secret name (default: none).
    #[serde(default)]
    pub prefix: String,

    /// Custom endpoint URL (for localstack or other AWS-compatible services)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}
