//! HTTP routes for Huddle.
//!
//! Defines the Axum router and application state.

use crate::auth::IdentityVerifier;
use crate::config::Config;
use crate::handlers::{self, accounts, invites, meetings};
use crate::middleware::{http_metrics_middleware, require_account, require_identity, AuthState};
use crate::repositories::Stores;
use crate::services::Services;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Outer bound on any request; service deadlines are shorter.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub services: Services,

    /// Store ports, also used by the auth middleware to resolve accounts.
    pub stores: Stores,

    /// Database pool for readiness checks. `None` with in-memory stores.
    pub pool: Option<PgPool>,

    pub verifier: Arc<dyn IdentityVerifier>,
}

/// Build the application routes.
///
/// - `/health`, `/ready`, `/metrics` - public, unversioned
/// - `POST /api/v1/accounts` - valid token required
/// - every other `/api/v1` route - valid token and registered account
///   required
///
/// Layers: request timeout and TraceLayer, with the HTTP metrics middleware
/// outermost so framework-level rejections are counted too.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: state.verifier.clone(),
        accounts: state.stores.accounts.clone(),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let registration_routes = Router::new()
        .route("/api/v1/accounts", post(accounts::register_account))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_identity,
        ))
        .with_state(state.clone());

    let account_routes = Router::new()
        .route(
            "/api/v1/accounts/@me",
            get(accounts::get_me)
                .patch(accounts::update_me)
                .delete(accounts::delete_me),
        )
        .route("/api/v1/accounts/@me/meetings", get(accounts::list_my_meetings))
        .route(
            "/api/v1/accounts/@me/meetings/count",
            get(accounts::count_my_meetings),
        )
        .route("/api/v1/accounts/@me/invites", get(accounts::list_my_invites))
        .route(
            "/api/v1/accounts/@me/invites/count",
            get(accounts::count_my_invites),
        )
        .route("/api/v1/meetings", post(meetings::create_meeting))
        .route(
            "/api/v1/meetings/:id",
            get(meetings::get_meeting).delete(meetings::delete_meeting),
        )
        .route(
            "/api/v1/meetings/:id/invites",
            get(meetings::list_meeting_invites),
        )
        .route(
            "/api/v1/meetings/:id/invites/count",
            get(meetings::count_meeting_invites),
        )
        .route(
            "/api/v1/meetings/:id/organizers/:account_id",
            put(meetings::promote_organizer).delete(meetings::revoke_organizer),
        )
        .route("/api/v1/invites", post(invites::send_invite))
        .route(
            "/api/v1/invites/:id",
            get(invites::get_invite).delete(invites::delete_invite),
        )
        .route("/api/v1/invites/:id/accept", post(invites::accept_invite))
        .route_layer(middleware::from_fn_with_state(auth_state, require_account))
        .with_state(state);

    public_routes
        .merge(metrics_routes)
        .merge(registration_routes)
        .merge(account_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
