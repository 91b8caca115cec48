//! The permissions request pipeline.
//!
//! authenticate → extract `userId` → registry lookup → shape response.
//! Every outcome, including panics inside the pipeline, becomes an
//! [`ApiResponse`]; nothing escapes to the transport.

mod error;
mod event;
mod response;

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

pub use error::{HandlerError, MISSING_USER_ID_MESSAGE, UNAUTHORIZED_MESSAGE};
pub use event::{InvocationEvent, USER_ID_PARAM};
use futures::FutureExt;
pub use response::{ApiResponse, InvocationResponse};
use serde_json::Value;

use crate::{auth::CredentialValidator, registry::PermissionsRegistry};

pub struct PermissionsHandler {
    validator: Arc<CredentialValidator>,
    registry: Arc<PermissionsRegistry>,
}

impl PermissionsHandler {
    pub fn new(validator: Arc<CredentialValidator>, registry: Arc<PermissionsRegistry>) -> Self {
        Self {
            validator,
            registry,
        }
    }

    pub async fn handle(&self, event: &InvocationEvent) -> ApiResponse {
        let outcome = AssertUnwindSafe(self.process(event)).catch_unwind().await;

        let err = match outcome {
            Ok(Ok(response)) => return response,
            Ok(Err(err)) => err,
            Err(panic) => HandlerError::Internal(panic_message(panic.as_ref())),
        };

        match &err {
            HandlerError::Internal(message) => {
                tracing::error!(error = %message, "Permissions request failed")
            }
            other => tracing::debug!(status = %other.status(), error = %other, "Request rejected"),
        }
        ApiResponse::error(&err)
    }

    /// Entry point for raw JSON invocation events.
    pub async fn handle_json(&self, event: Value) -> ApiResponse {
        match InvocationEvent::from_json(event) {
            Ok(event) => self.handle(&event).await,
            Err(err) => {
                tracing::error!(error = %err, "Rejected malformed invocation event");
                ApiResponse::error(&err)
            }
        }
    }

    async fn process(&self, event: &InvocationEvent) -> Result<ApiResponse, HandlerError> {
        if !self.validator.validate(&event.headers).await {
            return Err(HandlerError::Unauthorized);
        }

        let user_id = event.user_id().ok_or_else(HandlerError::missing_user_id)?;
        let record = self.registry.lookup(user_id).await?;

        ApiResponse::ok(record.as_ref())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unexpected failure while handling request".to_string()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::{
        config::{AuthConfig, DEFAULT_SECRET_NAME},
        registry::{PermissionRecord, PermissionsSource, RegistryError, RegistryResult},
        secrets::MemorySecretManager,
    };

    const KEY: &str = "handler-test-key-0001";

    struct PanickingSource;

    #[async_trait]
    impl PermissionsSource for PanickingSource {
        async fn get_record(&self, _: &str) -> RegistryResult<Option<Arc<PermissionRecord>>> {
            panic!("source exploded")
        }
    }

    struct OfflineSource;

    #[async_trait]
    impl PermissionsSource for OfflineSource {
        async fn get_record(&self, _: &str) -> RegistryResult<Option<Arc<PermissionRecord>>> {
            Err(RegistryError::Source("connection reset".into()))
        }
    }

    fn handler_with(registry: PermissionsRegistry) -> PermissionsHandler {
        let secrets = MemorySecretManager::new()
            .with_secret(DEFAULT_SECRET_NAME, format!(r#"{{"apiKey":"{KEY}"}}"#));
        let config = AuthConfig {
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            ..Default::default()
        };
        let validator = CredentialValidator::new(&config, Some(Arc::new(secrets)));
        PermissionsHandler::new(Arc::new(validator), Arc::new(registry))
    }

    fn builtin_handler() -> PermissionsHandler {
        handler_with(PermissionsRegistry::from_config(&Default::default()).unwrap())
    }

    fn event(user_id: Option<&str>) -> Value {
        let mut event = json!({"headers": {"X-API-Key": KEY}});
        if let Some(user_id) = user_id {
            event["pathParameters"] = json!({"userId": user_id});
        }
        event
    }

    fn body(response: &ApiResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_known_user() {
        let response = builtin_handler()
            .handle_json(event(Some("Analyst@Denodo.com ")))
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(body(&response)["userId"], "analyst@denodo.com");
    }

    #[tokio::test]
    async fn test_unauthorized_before_user_id_check() {
        let response = builtin_handler().handle_json(json!({})).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(body(&response)["message"], UNAUTHORIZED_MESSAGE);
    }

    #[tokio::test]
    async fn test_missing_user_id() {
        let response = builtin_handler().handle_json(event(None)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["message"], MISSING_USER_ID_MESSAGE);
    }

    #[tokio::test]
    async fn test_malformed_event() {
        let response = builtin_handler()
            .handle_json(json!({"headers": "X-API-Key"}))
            .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response)["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_source_failure_is_internal_error() {
        let handler = handler_with(PermissionsRegistry::new(Arc::new(OfflineSource)));
        let response = handler.handle_json(event(Some("analyst@denodo.com"))).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body(&response)["message"]
                .as_str()
                .unwrap()
                .contains("connection reset")
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handler = handler_with(PermissionsRegistry::new(Arc::new(PanickingSource)));
        let response = handler.handle_json(event(Some("analyst@denodo.com"))).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response)["message"], "source exploded");
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(
            panic_message(&42_u8),
            "Unexpected failure while handling request"
        );
    }
}
