//! Group-gated authentication middleware.
//!
//! Runs the [`AuthorizationGate`] for a route group, injects the verified
//! claims into request extensions and lets preflight requests through.

use crate::auth::Claims;
use crate::errors::GateError;
use crate::gate::{Access, AuthorizationGate};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for one gated route group.
#[derive(Clone)]
pub struct GroupGuard {
    /// Shared gate.
    pub gate: AuthorizationGate,

    /// Group every caller of this route group must belong to.
    pub required_group: String,
}

impl GroupGuard {
    pub fn new(gate: AuthorizationGate, required_group: impl Into<String>) -> Self {
        Self {
            gate,
            required_group: required_group.into(),
        }
    }
}

/// Authorization middleware for a route group.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - `OPTIONS` continues to the next handler untouched
/// - 401 Unauthorized with WWW-Authenticate header if the token is missing or invalid
/// - 403 Forbidden if the caller lacks the required group
/// - Otherwise continues with claims in extensions
#[instrument(skip_all, name = "gate.middleware.auth", fields(group = %guard.required_group))]
pub async fn require_group(
    State(guard): State<Arc<GroupGuard>>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let (parts, body) = req.into_parts();

    let access = guard.gate.authorize(&parts, &guard.required_group).await?;

    let mut req = Request::from_parts(parts, body);
    if let Access::Granted(claims) = access {
        tracing::debug!(target: "gate.middleware.auth", "Request authorized");
        req.extensions_mut().insert(claims);
    }

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if the middleware was not applied or the request was a preflight.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}
