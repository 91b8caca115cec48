//! Permissions lookup endpoints.

use std::collections::HashMap;

use axum::extract::{Path, State, rejection::PathRejection};
use http::HeaderMap;

use crate::{
    AppState,
    handler::{ApiResponse, HandlerError, InvocationEvent},
};

/// `GET {base}/users/{userId}/permissions`
#[tracing::instrument(name = "permissions.get", skip_all)]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
) -> ApiResponse {
    let path_parameters = match params {
        Ok(Path(params)) => params,
        Err(rejection) => {
            let err = HandlerError::Internal(format!("Malformed request path: {rejection}"));
            tracing::error!(error = %err, "Permissions request failed");
            return ApiResponse::error(&err);
        }
    };

    let event = InvocationEvent::new(headers, path_parameters);
    state.handler.handle(&event).await
}

/// `GET {base}/users/permissions`: the same pipeline without a `userId`, so
/// callers get the documented 401/400 bodies instead of a bare 404.
#[tracing::instrument(name = "permissions.get_without_user", skip_all)]
pub async fn get_permissions_without_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let event = InvocationEvent::new(headers, HashMap::new());
    state.handler.handle(&event).await
}
