//! Authorization gate for the admin APIs.
//!
//! Every protected request passes through [`AuthorizationGate::authorize`],
//! which turns the request head into either an [`Access`] verdict or a
//! [`GateError`] rejection:
//!
//! ```text
//! OPTIONS                      -> Access::Preflight (no credential needed)
//! no / malformed bearer token  -> GateError::MissingCredential       (401)
//! token fails verification     -> GateError::InvalidCredential(..)   (401)
//! required group not in claims -> GateError::InsufficientPermissions (403)
//! otherwise                    -> Access::Granted(claims)
//! ```

use crate::auth::{Claims, TokenValidator};
use crate::errors::GateError;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap, Method};
use std::sync::Arc;
use tracing::instrument;

/// Outcome of a request that passed the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// CORS preflight. Passed through without authentication.
    Preflight,

    /// Caller is authenticated and holds the required group.
    Granted(Claims),
}

/// Authenticates bearer tokens and enforces group membership.
#[derive(Clone)]
pub struct AuthorizationGate {
    validator: Arc<dyn TokenValidator>,
    groups_claim: String,
}

impl AuthorizationGate {
    /// Create a gate reading group membership from `groups_claim`.
    pub fn new(validator: Arc<dyn TokenValidator>, groups_claim: impl Into<String>) -> Self {
        Self {
            validator,
            groups_claim: groups_claim.into(),
        }
    }

    /// Name of the claim holding group membership.
    pub fn groups_claim(&self) -> &str {
        &self.groups_claim
    }

    /// Decide whether the request may proceed.
    ///
    /// # Errors
    ///
    /// - `MissingCredential` - no `Authorization: Bearer <token>` header
    /// - `InvalidCredential` - the token failed verification
    /// - `InsufficientPermissions` - `required_group` is not among the caller's groups
    #[instrument(skip_all, fields(method = %request.method, path = %request.uri.path()))]
    pub async fn authorize(
        &self,
        request: &Parts,
        required_group: &str,
    ) -> Result<Access, GateError> {
        if request.method == Method::OPTIONS {
            tracing::debug!(target: "gate.gate", "Preflight request passed through");
            return Ok(Access::Preflight);
        }

        let token = extract_bearer(&request.headers).ok_or_else(|| {
            tracing::debug!(target: "gate.gate", "Missing or malformed Authorization header");
            GateError::MissingCredential
        })?;

        let claims = self.validator.validate(token).await.map_err(|e| {
            tracing::info!(target: "gate.gate", reason = e.code(), "Token rejected");
            GateError::InvalidCredential(e)
        })?;

        if !claims.in_group(&self.groups_claim, required_group) {
            tracing::info!(
                target: "gate.gate",
                required_group,
                "Caller lacks required group"
            );
            return Err(GateError::InsufficientPermissions {
                required: required_group.to_string(),
            });
        }

        Ok(Access::Granted(claims))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively and must be followed by exactly
/// one space and a non-empty token.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") || token.is_empty() || token.contains(' ') {
        return None;
    }

    Some(token)
}
