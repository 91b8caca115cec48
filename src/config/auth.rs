use std::time::Duration;

use http::HeaderName;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Secret name used when neither the config file nor `SECRET_NAME` sets one.
pub const DEFAULT_SECRET_NAME: &str = "denodo-poc/api/auth-key";

/// Environment variable consulted for the default secret name.
pub const SECRET_NAME_ENV: &str = "SECRET_NAME";

/// API key authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Header carrying the caller's API key. Matched case-insensitively.
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Name of the secret holding the expected key.
    /// Defaults to `$SECRET_NAME`, then `denodo-poc/api/auth-key`.
    #[serde(default = "default_secret_name")]
    pub secret_name: String,

    /// JSON field inside the secret value that holds the key.
    #[serde(default = "default_secret_field")]
    pub secret_field: String,

    /// Upper bound on a single secret fetch. A timeout counts as an
    /// unavailable secret store.
    #[serde(default = "default_secret_timeout_ms")]
    pub secret_timeout_ms: u64,

    /// Degraded-mode acceptance while the secret store is unavailable.
    #[serde(default)]
    pub fallback: FallbackAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header_name: default_header_name(),
            secret_name: default_secret_name(),
            secret_field: default_secret_field(),
            secret_timeout_ms: default_secret_timeout_ms(),
            fallback: FallbackAuthConfig::default(),
        }
    }
}

impl AuthConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        HeaderName::try_from(self.header_name.as_str()).map_err(|_| {
            ConfigError::Validation(format!(
                "auth.header_name '{}' is not a valid HTTP header name",
                self.header_name
            ))
        })?;

        if self.secret_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.secret_name must not be empty".into(),
            ));
        }
        if self.secret_field.is_empty() {
            return Err(ConfigError::Validation(
                "auth.secret_field must not be empty".into(),
            ));
        }
        if self.secret_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "auth.secret_timeout_ms must be greater than zero".into(),
            ));
        }

        if self.fallback.enabled {
            if self.fallback.min_key_length == 0 {
                return Err(ConfigError::Validation(
                    "auth.fallback.min_key_length must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }

    /// The configured header name, parsed.
    ///
    /// Falls back to `x-api-key` for configs that skipped validation.
    pub fn header(&self) -> HeaderName {
        HeaderName::try_from(self.header_name.as_str())
            .unwrap_or_else(|_| HeaderName::from_static("x-api-key"))
    }

    pub fn secret_timeout(&self) -> Duration {
        Duration::from_millis(self.secret_timeout_ms)
    }
}

/// Fallback policy for when the expected key cannot be fetched.
///
/// With `enabled = true`, any supplied key strictly longer than
/// `min_key_length` characters is accepted while the secret store is
/// unreachable. Every such acceptance is logged at `warn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackAuthConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_min_key_length")]
    pub min_key_length: usize,
}

impl Default for FallbackAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_key_length: default_min_key_length(),
        }
    }
}

fn default_header_name() -> String {
    "X-API-Key".to_string()
}

fn default_secret_name() -> String {
    std::env::var(SECRET_NAME_ENV)
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_string())
}

fn default_secret_field() -> String {
    "apiKey".to_string()
}

fn default_secret_timeout_ms() -> u64 {
    3000
}

fn default_min_key_length() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_name_default() {
        temp_env::with_var_unset(SECRET_NAME_ENV, || {
            assert_eq!(AuthConfig::default().secret_name, DEFAULT_SECRET_NAME);
        });
    }

    #[test]
    fn test_secret_name_from_env() {
        temp_env::with_var(SECRET_NAME_ENV, Some("staging/api/key"), || {
            assert_eq!(AuthConfig::default().secret_name, "staging/api/key");
        });
    }

    #[test]
    fn test_blank_secret_name_env_ignored() {
        temp_env::with_var(SECRET_NAME_ENV, Some("  "), || {
            assert_eq!(AuthConfig::default().secret_name, DEFAULT_SECRET_NAME);
        });
    }

    #[test]
    fn test_header_is_lowercased() {
        let config = AuthConfig::default();
        assert_eq!(config.header().as_str(), "x-api-key");
    }

    #[test]
    fn test_fallback_zero_length_rejected() {
        let config = AuthConfig {
            fallback: FallbackAuthConfig {
                enabled: true,
                min_key_length: 0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = AuthConfig {
            secret_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
