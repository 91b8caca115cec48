pub mod api;
pub mod health;

use axum::{Router, routing::get};

use crate::AppState;

/// Permissions routes, nested under `prefix` (`""` for the root).
pub fn permissions_routes(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("{prefix}/users/{{userId}}/permissions"),
            get(api::get_user_permissions),
        )
        .route(
            &format!("{prefix}/users/permissions"),
            get(api::get_permissions_without_user),
        )
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
}
