//! Caller identity handlers for the gated route groups.

use crate::errors::GateError;
use crate::middleware::ClaimsExt;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for the `whoami` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhoAmIResponse {
    /// Subject (Cognito user ID), if the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// App client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Groups listed in the configured groups claim.
    pub groups: Vec<String>,

    /// Token expiration timestamp, as issued.
    pub exp: serde_json::Number,
}

/// Handler for GET /api/{idp,user}/whoami
///
/// Returns a summary of the verified claims. Requires the group middleware.
///
/// ## Response
///
/// ```json
/// {
///   "sub": "2f1c...",
///   "client_id": "app-xyz",
///   "groups": ["IdpAdmins"],
///   "exp": 1234567890
/// }
/// ```
#[instrument(skip_all, name = "gate.handlers.whoami")]
pub async fn whoami(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<WhoAmIResponse>, GateError> {
    // Only reachable without claims if the route was mounted without the middleware
    let claims = req.claims().ok_or(GateError::MissingCredential)?;

    let groups = claims
        .groups(state.gate.groups_claim())
        .into_iter()
        .map(ToString::to_string)
        .collect();

    Ok(Json(WhoAmIResponse {
        sub: claims.sub.clone(),
        client_id: claims.client_id.clone(),
        groups,
        exp: claims.exp.clone(),
    }))
}

/// Handler for OPTIONS on gated routes.
///
/// CORS response headers are outside this service.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_whoami_response_serialization() {
        let response = WhoAmIResponse {
            sub: Some("user123".to_string()),
            client_id: Some("app-xyz".to_string()),
            groups: vec!["IdpAdmins".to_string(), "UserAdmins".to_string()],
            exp: serde_json::Number::from(1_234_567_890_i64),
        };

        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"sub\":\"user123\""));
        assert!(json.contains("\"client_id\":\"app-xyz\""));
        assert!(json.contains("\"groups\":[\"IdpAdmins\",\"UserAdmins\"]"));
        assert!(json.contains("\"exp\":1234567890"));
    }

    #[test]
    fn test_whoami_response_without_sub() {
        let response = WhoAmIResponse {
            sub: None,
            client_id: None,
            groups: Vec::new(),
            exp: serde_json::Number::from(1_i64),
        };

        let json = serde_json::to_string(&response).unwrap();

        assert!(!json.contains("sub"), "sub should be omitted when None");
        assert!(!json.contains("client_id"));
    }

    #[tokio::test]
    async fn test_preflight_is_no_content() {
        assert_eq!(preflight().await, StatusCode::NO_CONTENT);
    }
}
