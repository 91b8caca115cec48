//! API key authentication.
//!
//! The caller's key is compared against a key held in the secret store. When
//! the store cannot produce the key, requests are rejected unless the
//! degraded fallback (`auth.fallback`) is enabled.

mod error;

use std::{sync::Arc, time::Duration};

pub use error::{AuthError, SecretFetchError};
use http::{HeaderMap, HeaderName};
use subtle::ConstantTimeEq;

use crate::{
    config::{AuthConfig, FallbackAuthConfig},
    secrets::SecretManager,
};

/// How an authenticated request got through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Key matched the secret store's key.
    SecretMatch,
    /// Secret store unavailable; admitted on key length alone.
    DegradedFallback,
}

/// Validates the API key header of inbound requests.
///
/// Cheap to share: holds only configuration and a shared secret-store handle.
pub struct CredentialValidator {
    secrets: Option<Arc<dyn SecretManager>>,
    header: HeaderName,
    secret_name: String,
    secret_field: String,
    secret_timeout: Duration,
    fallback: FallbackAuthConfig,
}

impl CredentialValidator {
    pub fn new(config: &AuthConfig, secrets: Option<Arc<dyn SecretManager>>) -> Self {
        Self {
            secrets,
            header: config.header(),
            secret_name: config.secret_name.clone(),
            secret_field: config.secret_field.clone(),
            secret_timeout: config.secret_timeout(),
            fallback: config.fallback.clone(),
        }
    }

    /// True if the request may proceed.
    pub async fn validate(&self, headers: &HeaderMap) -> bool {
        match self.authenticate(headers).await {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(reason = e.code(), error = %e, "API key rejected");
                false
            }
        }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthMethod, AuthError> {
        let supplied = self.supplied_key(headers)?;

        match self.expected_key().await {
            Ok(expected) => {
                let matches: bool = supplied.as_bytes().ct_eq(expected.as_bytes()).into();
                if matches {
                    Ok(AuthMethod::SecretMatch)
                } else {
                    Err(AuthError::InvalidApiKey)
                }
            }
            Err(cause) => self.degraded(supplied, cause),
        }
    }

    /// Header names in a `HeaderMap` are case-insensitive, so `X-API-Key`
    /// and `x-api-key` both resolve here.
    fn supplied_key<'a>(&self, headers: &'a HeaderMap) -> Result<&'a str, AuthError> {
        let value = headers
            .get(&self.header)
            .ok_or(AuthError::MissingApiKey)?
            .to_str()
            .map_err(|_| AuthError::InvalidApiKeyFormat)?;

        if value.is_empty() {
            return Err(AuthError::MissingApiKey);
        }
        Ok(value)
    }

    async fn expected_key(&self) -> Result<String, SecretFetchError> {
        let secrets = self.secrets.as_ref().ok_or(SecretFetchError::NotConfigured)?;

        let raw = tokio::time::timeout(self.secret_timeout, secrets.get(&self.secret_name))
            .await
            .map_err(|_| SecretFetchError::Timeout(self.secret_timeout.as_millis() as u64))??
            .ok_or_else(|| SecretFetchError::NotFound(self.secret_name.clone()))?;

        self.parse_secret(&raw)
    }

    /// The secret value is a JSON object; the key lives in `secret_field`.
    fn parse_secret(&self, raw: &str) -> Result<String, SecretFetchError> {
        let malformed = |reason: String| SecretFetchError::Malformed {
            name: self.secret_name.clone(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| malformed(format!("not JSON: {e}")))?;

        match value.get(&self.secret_field).and_then(|v| v.as_str()) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            Some(_) => Err(malformed(format!("field '{}' is empty", self.secret_field))),
            None => Err(malformed(format!(
                "missing string field '{}'",
                self.secret_field
            ))),
        }
    }

    fn degraded(&self, supplied: &str, cause: SecretFetchError) -> Result<AuthMethod, AuthError> {
        if !self.fallback.enabled {
            tracing::error!(
                error = %cause,
                secret_name = %self.secret_name,
                "Expected API key unavailable and auth.fallback is disabled; rejecting request"
            );
            return Err(AuthError::SecretUnavailable(cause));
        }

        let length = supplied.chars().count();
        if length > self.fallback.min_key_length {
            tracing::warn!(
                error = %cause,
                secret_name = %self.secret_name,
                key_length = length,
                "Expected API key unavailable; admitting request via degraded fallback \
                 (length check only, weaker than normal authentication)"
            );
            Ok(AuthMethod::DegradedFallback)
        } else {
            tracing::warn!(
                error = %cause,
                key_length = length,
                min_key_length = self.fallback.min_key_length,
                "Expected API key unavailable; supplied key too short for degraded fallback"
            );
            Err(AuthError::SecretUnavailable(cause))
        }
    }
}
