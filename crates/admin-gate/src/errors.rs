//! Admin gate error types.
//!
//! Two layers:
//! - [`AuthError`] - key retrieval and token verification failures
//! - [`GateError`] - what the authorization gate hands back to its caller
//!
//! `GateError` maps to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are fixed strings so that fetch errors and
//! key material never leak. Actual errors are logged server-side where they
//! occur.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::JwtValidationError;
use serde::Serialize;
use thiserror::Error;

/// Token verification failure.
///
/// Variants carry no detail on purpose: their `Display` output is safe to
/// show to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Signing key endpoint is misconfigured")]
    InvalidEndpointConfiguration,

    #[error("Signing keys could not be retrieved")]
    KeyFetchFailed,

    #[error("The access token is malformed")]
    MalformedToken,

    #[error("The access token was signed with an unknown key")]
    UnknownSigningKey,

    #[error("The access token signature is invalid")]
    SignatureInvalid,

    #[error("The access token has expired")]
    TokenExpired,

    #[error("The access token was not issued for this application")]
    AudienceMismatch,
}

impl AuthError {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidEndpointConfiguration => "INVALID_ENDPOINT_CONFIGURATION",
            AuthError::KeyFetchFailed => "KEY_FETCH_FAILED",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::UnknownSigningKey => "UNKNOWN_SIGNING_KEY",
            AuthError::SignatureInvalid => "SIGNATURE_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::AudienceMismatch => "AUDIENCE_MISMATCH",
        }
    }
}

impl From<JwtValidationError> for AuthError {
    fn from(_: JwtValidationError) -> Self {
        AuthError::MalformedToken
    }
}

/// Authorization gate rejection.
///
/// Maps to HTTP status codes:
/// - MissingCredential, InvalidCredential: 401 Unauthorized
/// - InsufficientPermissions: 403 Forbidden
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Missing or malformed Authorization header")]
    MissingCredential,

    #[error("Invalid credential: {0}")]
    InvalidCredential(#[from] AuthError),

    #[error("Token is valid but missing required claim: {required}")]
    InsufficientPermissions { required: String },
}

impl GateError {
    /// Returns the HTTP status code for this rejection.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::MissingCredential | GateError::InvalidCredential(_) => 401,
            GateError::InsufficientPermissions { .. } => 403,
        }
    }

    /// Stable machine-readable code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::MissingCredential => "MISSING_CREDENTIAL",
            GateError::InvalidCredential(reason) => reason.code(),
            GateError::InsufficientPermissions { .. } => "INSUFFICIENT_PERMISSIONS",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GateError::MissingCredential => (StatusCode::UNAUTHORIZED, self.to_string()),
            GateError::InvalidCredential(reason) => (StatusCode::UNAUTHORIZED, reason.to_string()),
            GateError::InsufficientPermissions { .. } => (StatusCode::FORBIDDEN, self.to_string()),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"admin-api\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_jwt_validation_error_maps_to_malformed() {
        assert_eq!(
            AuthError::from(JwtValidationError::TokenTooLarge),
            AuthError::MalformedToken
        );
        assert_eq!(
            AuthError::from(JwtValidationError::MissingKid),
            AuthError::MalformedToken
        );
    }

    #[test]
    fn test_display_invalid_credential_uses_safe_reason() {
        let error = GateError::InvalidCredential(AuthError::TokenExpired);
        assert_eq!(
            format!("{}", error),
            "Invalid credential: The access token has expired"
        );
    }

    #[test]
    fn test_display_insufficient_permissions() {
        let error = GateError::InsufficientPermissions {
            required: "IdpAdmins".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Token is valid but missing required claim: IdpAdmins"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GateError::MissingCredential.status_code(), 401);
        for reason in [
            AuthError::InvalidEndpointConfiguration,
            AuthError::KeyFetchFailed,
            AuthError::MalformedToken,
            AuthError::UnknownSigningKey,
            AuthError::SignatureInvalid,
            AuthError::TokenExpired,
            AuthError::AudienceMismatch,
        ] {
            assert_eq!(GateError::InvalidCredential(reason).status_code(), 401);
        }
        assert_eq!(
            GateError::InsufficientPermissions {
                required: "UserAdmins".to_string()
            }
            .status_code(),
            403
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            AuthError::InvalidEndpointConfiguration.code(),
            AuthError::KeyFetchFailed.code(),
            AuthError::MalformedToken.code(),
            AuthError::UnknownSigningKey.code(),
            AuthError::SignatureInvalid.code(),
            AuthError::TokenExpired.code(),
            AuthError::AudienceMismatch.code(),
            GateError::MissingCredential.code(),
            GateError::InsufficientPermissions {
                required: String::new(),
            }
            .code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[tokio::test]
    async fn test_into_response_missing_credential() {
        let response = GateError::MissingCredential.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response.headers().get("WWW-Authenticate").unwrap();
        assert!(www_auth
            .to_str()
            .unwrap()
            .contains("Bearer realm=\"admin-api\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "MISSING_CREDENTIAL");
    }

    #[tokio::test]
    async fn test_into_response_key_fetch_failure_is_generic() {
        let response = GateError::InvalidCredential(AuthError::KeyFetchFailed).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "KEY_FETCH_FAILED");
        assert_eq!(
            body_json["error"]["message"],
            "Signing keys could not be retrieved"
        );
    }

    #[tokio::test]
    async fn test_into_response_insufficient_permissions() {
        let error = GateError::InsufficientPermissions {
            required: "IdpAdmins".to_string(),
        };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INSUFFICIENT_PERMISSIONS");
        assert_eq!(
            body_json["error"]["message"],
            "Token is valid but missing required claim: IdpAdmins"
        );
    }
}
