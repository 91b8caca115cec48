//! Health check endpoints for Kubernetes probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::AppState;

/// Detailed health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub version: String,
    pub subsystems: SubsystemStatus,
}

#[derive(Debug, Serialize)]
pub struct SubsystemStatus {
    /// Absent when no secrets manager is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<ComponentStatus>,
    pub registry: ComponentStatus,
}

/// Status of a single component.
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Registry only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
}

enum Overall {
    Healthy,
    /// Secret store down, but the degraded auth fallback keeps serving.
    Degraded,
    Unhealthy,
}

/// Probe the secret store. `None` when none is configured.
async fn check_secrets(state: &AppState) -> Option<ComponentStatus> {
    let secrets = state.secrets.as_ref()?;

    let start = std::time::Instant::now();
    let result = secrets.health_check().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    Some(ComponentStatus {
        healthy: result.is_ok(),
        message: result
            .err()
            .map(|e| format!("Secrets manager unavailable: {e}")),
        latency_ms: Some(latency_ms),
        records: None,
    })
}

fn overall(state: &AppState, secrets: Option<&ComponentStatus>) -> Overall {
    let fallback = state.config.auth.fallback.enabled;
    match secrets {
        Some(status) if status.healthy => Overall::Healthy,
        // Without a reachable store every request is rejected unless the
        // fallback admits it.
        _ if fallback => Overall::Degraded,
        _ => Overall::Unhealthy,
    }
}

/// Full health check with subsystem status.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let secrets = check_secrets(&state).await;

    let (status, status_code) = match overall(&state, secrets.as_ref()) {
        Overall::Healthy => ("healthy", StatusCode::OK),
        Overall::Degraded => ("degraded", StatusCode::OK),
        Overall::Unhealthy => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE),
    };

    let health = HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subsystems: SubsystemStatus {
            secrets,
            registry: ComponentStatus {
                healthy: true,
                message: None,
                latency_ms: None,
                records: state.registry.record_count(),
            },
        },
    };

    (status_code, Json(health))
}

/// Kubernetes liveness probe. Always 200 while the process is serving.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Kubernetes readiness probe.
///
/// Not ready while requests cannot be authenticated: the secret store is
/// missing or unreachable and the degraded fallback is disabled.
#[tracing::instrument(name = "health.readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let secrets = check_secrets(&state).await;

    match overall(&state, secrets.as_ref()) {
        Overall::Healthy | Overall::Degraded => StatusCode::OK,
        Overall::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}
