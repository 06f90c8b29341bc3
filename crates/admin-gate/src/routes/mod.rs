//! HTTP routes for the admin gate.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::gate::AuthorizationGate;
use crate::handlers;
use crate::middleware::{require_group, GroupGuard};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Gate shared by all protected route groups.
    pub gate: AuthorizationGate,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/health` - Liveness check (public)
/// - `/api/idp/whoami` - Requires the IdP admin group
/// - `/api/user/whoami` - Requires the user admin group
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .with_state(state.clone());

    let idp_routes = gated_routes(
        &state,
        "/api/idp/whoami",
        state.config.idp_admin_group.clone(),
    );
    let user_routes = gated_routes(
        &state,
        "/api/user/whoami",
        state.config.user_admin_group.clone(),
    );

    // Apply global middleware layers
    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(idp_routes)
        .merge(user_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// A route group whose callers must belong to `required_group`.
fn gated_routes(state: &Arc<AppState>, path: &str, required_group: String) -> Router {
    let guard = Arc::new(GroupGuard::new(state.gate.clone(), required_group));

    Router::new()
        .route(path, get(handlers::whoami).options(handlers::preflight))
        .route_layer(from_fn_with_state(guard, require_group))
        .with_state(state.clone())
}
