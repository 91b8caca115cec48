//! Permissions lookup service.
//!
//! Returns the data-source access profile of a user to a data-virtualization
//! gateway. Requests are authenticated with an API key checked against a
//! secret store, then resolved against a read-only permissions registry.

use std::sync::Arc;

use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod handler;
pub mod middleware;
#[cfg(feature = "server")]
pub mod observability;
pub mod registry;
pub mod routes;
pub mod secrets;

#[cfg(test)]
mod tests;

use crate::{
    auth::CredentialValidator,
    config::PermissionsApiConfig,
    handler::PermissionsHandler,
    registry::{PermissionsRegistry, RegistryError},
    secrets::{SecretError, SecretManager},
};

/// Long-lived state, built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PermissionsApiConfig>,
    pub secrets: Option<Arc<dyn SecretManager>>,
    pub registry: Arc<PermissionsRegistry>,
    pub handler: Arc<PermissionsHandler>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Secrets(#[from] SecretError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AppState {
    /// Connect the configured secret store and load the registry.
    pub async fn new(config: PermissionsApiConfig) -> Result<Self, StartupError> {
        let secrets = secrets::build_secret_manager(&config.secrets).await?;
        let registry = PermissionsRegistry::from_config(&config.registry)?;
        Ok(Self::from_parts(config, secrets, registry))
    }

    /// Assemble state from already-built components.
    pub fn from_parts(
        config: PermissionsApiConfig,
        secrets: Option<Arc<dyn SecretManager>>,
        registry: PermissionsRegistry,
    ) -> Self {
        let validator = Arc::new(CredentialValidator::new(&config.auth, secrets.clone()));
        let registry = Arc::new(registry);
        let handler = Arc::new(PermissionsHandler::new(validator, registry.clone()));

        Self {
            config: Arc::new(config),
            secrets,
            registry,
            handler,
        }
    }
}

pub fn build_app(config: &PermissionsApiConfig, state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::permissions_routes(config.server.route_prefix()))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
