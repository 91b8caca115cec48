//! Configuration module for the permissions service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every section is
//! optional; an empty file (or no file at all) yields a working local setup.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [secrets]
//! type = "aws"
//! region = "eu-west-3"
//!
//! [auth]
//! secret_name = "${SECRET_NAME}"
//! ```

mod auth;
mod observability;
mod registry;
mod secrets;
mod server;

use std::path::Path;

pub use auth::*;
pub use observability::*;
pub use registry::*;
pub use secrets::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the permissions service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionsApiConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// API key authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Secret store holding the expected API key.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Where permission records come from.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl PermissionsApiConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        // Catch feature-gated secret backends before serde turns them into
        // an opaque "unknown variant" error.
        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        check_disabled_features(&raw)?;

        let config: PermissionsApiConfig =
            toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.registry.validate()?;
        Ok(())
    }

    /// Settings that are valid but leave the service unable to admit
    /// requests, or admitting them without a verified key.
    ///
    /// Returned rather than logged so callers can report them once logging
    /// is up.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.auth.fallback.enabled {
            warnings.push(format!(
                "auth.fallback is enabled: while the secret store is unavailable, any API key \
                 longer than {} characters is accepted. Do not enable this in production.",
                self.auth.fallback.min_key_length
            ));
        } else if self.secrets.is_none() {
            warnings.push(
                "No secrets manager configured and auth.fallback is disabled. \
                 Every request will be rejected with 401. Configure [secrets] to \
                 serve traffic."
                    .to_string(),
            );
        }
        warnings
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Check for feature-gated configuration values before typed deserialization.
fn check_disabled_features(raw: &toml::Value) -> Result<(), ConfigError> {
    let mut issues: Vec<(String, &str)> = Vec::new();

    if let Some(type_val) = raw
        .get("secrets")
        .and_then(|v| v.get("type"))
        .and_then(|v| v.as_str())
    {
        check_secrets_feature(type_val, &mut issues);
    }

    if issues.is_empty() {
        return Ok(());
    }

    let mut features: Vec<&str> = issues.iter().map(|(_, f)| *f).collect();
    features.sort_unstable();
    features.dedup();

    let details = issues
        .iter()
        .map(|(what, feature)| format!("  - {} requires the '{}' feature", what, feature))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::Validation(format!(
        "Configuration uses features that are not compiled into this binary:\n{}\n\
         Rebuild with: cargo build --features {}",
        details,
        features.join(",")
    )))
}

fn check_secrets_feature(type_val: &str, _issues: &mut Vec<(String, &str)>) {
    match type_val {
        #[cfg(not(feature = "secrets-aws"))]
        "aws" => _issues.push((
            "secrets.type = \"aws\"".to_string(),
            "secrets-aws",
        )),
        _ => {}
    }
}

/// Expand `${VAR_NAME}` references, skipping anything after a `#` comment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("Invalid interpolation pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
