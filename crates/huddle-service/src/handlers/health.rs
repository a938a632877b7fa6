//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the database and the identity
//!   provider configuration

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe. Returns 200 if ready, 503 if not.
///
/// Error messages are generic; causes are logged.
#[tracing::instrument(skip_all, name = "huddle.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match &state.pool {
        Some(pool) => {
            if let Err(e) = sqlx::query("SELECT 1").fetch_one(pool).await {
                tracing::warn!(target: "huddle.health", error = %e, "Readiness check failed: database error");
                return not_ready(Some("unhealthy"), None);
            }
            Some("healthy")
        }
        // In-memory stores have nothing to ping
        None => None,
    };

    if state.config.idp_jwks_url.trim().is_empty() {
        tracing::warn!(target: "huddle.health", "Readiness check failed: identity provider JWKS URL not configured");
        return not_ready(database, Some("unavailable"));
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            database,
            identity_provider: Some("available"),
            error: None,
        }),
    )
}

fn not_ready(
    database: Option<&'static str>,
    identity_provider: Option<&'static str>,
) -> (StatusCode, Json<ReadinessResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ReadinessResponse {
            status: "not_ready",
            database,
            identity_provider,
            error: Some("Service dependencies unavailable".to_string()),
        }),
    )
}
