use thiserror::Error;

/// Why a request was not authenticated.
///
/// Every variant maps to the same 401 response; the distinction only shows
/// up in logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No API key header, or an empty one
    #[error("API key header missing")]
    MissingApiKey,

    /// Header present but not valid UTF-8
    #[error("API key header is not valid UTF-8")]
    InvalidApiKeyFormat,

    /// Key did not match the expected key
    #[error("API key does not match")]
    InvalidApiKey,

    /// The expected key could not be fetched and fallback is disabled or
    /// the supplied key is too short for it
    #[error("Expected API key unavailable: {0}")]
    SecretUnavailable(#[source] SecretFetchError),
}

impl AuthError {
    /// Stable code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingApiKey => "missing_api_key",
            AuthError::InvalidApiKeyFormat => "invalid_api_key_format",
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::SecretUnavailable(_) => "secret_unavailable",
        }
    }
}

/// Failure to obtain the expected API key from the secret store.
#[derive(Debug, Error)]
pub enum SecretFetchError {
    #[error("no secrets manager configured")]
    NotConfigured,

    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("secret fetch timed out after {0} ms")]
    Timeout(u64),

    #[error("secret store error: {0}")]
    Store(#[from] crate::secrets::SecretError),

    #[error("secret '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },
}
