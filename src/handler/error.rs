use http::StatusCode;
use thiserror::Error;

use crate::registry::RegistryError;

pub const UNAUTHORIZED_MESSAGE: &str = "Invalid or missing API key";
pub const MISSING_USER_ID_MESSAGE: &str = "userId parameter is required";

/// Terminal failure of a permissions request.
///
/// Each variant corresponds to exactly one response shape; see
/// [`HandlerError::status`] and [`HandlerError::error_name`].
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn missing_user_id() -> Self {
        HandlerError::BadRequest(MISSING_USER_ID_MESSAGE.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Unauthorized => StatusCode::UNAUTHORIZED,
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `error` field in the response body.
    pub fn error_name(&self) -> &'static str {
        match self {
            HandlerError::Unauthorized => "Unauthorized",
            HandlerError::BadRequest(_) => "Bad Request",
            HandlerError::Internal(_) => "Internal Server Error",
        }
    }
}

impl From<RegistryError> for HandlerError {
    fn from(err: RegistryError) -> Self {
        HandlerError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Internal(format!("Failed to serialize response: {err}"))
    }
}
