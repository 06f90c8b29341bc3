//! JWT primitives shared by the gate crates.
//!
//! This module provides the parts of token handling that do not need key
//! material:
//! - Size limit for DoS prevention
//! - Splitting a compact token into its three segments
//! - Header parsing (`kid`, `alg`) without signature verification
//! - base64url segment decoding
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing in this module establishes trust. Header values are only
//!   good for selecting a key; the payload must not be read before the
//!   signature has been verified by the caller.
//! - Error messages are generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_header, split_token};
//!
//! let parts = split_token(token)?;
//! let header = parse_header(&parts)?;
//! let key = key_set.find(&header.kid);
//! // verify parts.signing_input() against parts.signature with key ...
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. Cognito access tokens are typically 1-2KB even with
/// several group memberships, so 8KB leaves ample headroom.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while taking a compact JWT apart.
///
/// Note: Error messages are intentionally generic to prevent information
/// leakage. Detailed information is logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is malformed")]
    TokenTooLarge,

    /// Token format is invalid (segment count, base64, or JSON).
    #[error("The access token is malformed")]
    MalformedToken,

    /// Token header has no usable `kid`.
    #[error("The access token is malformed")]
    MissingKid,
}

// =============================================================================
// Token structure
// =============================================================================

/// The three base64url segments of a compact JWT, borrowed from the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts<'a> {
    /// Encoded header segment.
    pub header: &'a str,
    /// Encoded payload segment.
    pub payload: &'a str,
    /// Encoded signature segment.
    pub signature: &'a str,
}

impl<'a> TokenParts<'a> {
    /// The exact bytes the signature was computed over: `header "." payload`.
    ///
    /// Sliced from the original token rather than re-encoded, so any
    /// non-canonical encoding the issuer chose is preserved.
    #[must_use]
    pub fn signing_input(&self, token: &'a str) -> &'a str {
        let end = self.header.len() + 1 + self.payload.len();
        token.get(..end).unwrap_or_default()
    }
}

/// Fields of the JOSE header this workspace cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key ID used to select the verification key.
    pub kid: String,
    /// Algorithm name as written by the issuer (e.g. `RS256`).
    pub alg: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    alg: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWT into header, payload and signature segments.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - not exactly three non-empty header/payload segments
pub fn split_token(token: &str) -> Result<TokenParts<'_>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    if header.is_empty() || payload.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty segment");
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(TokenParts {
        header,
        payload,
        signature,
    })
}

/// Parse the header segment and extract `kid` and `alg`.
///
/// This does NOT validate the signature. The returned values are only
/// suitable for looking up a key in a trusted key set.
///
/// # Errors
///
/// - `MalformedToken` - header is not base64url JSON, or `alg` is missing
/// - `MissingKid` - `kid` is absent, not a string, or empty
pub fn parse_header(parts: &TokenParts<'_>) -> Result<TokenHeader, JwtValidationError> {
    let raw: RawHeader = decode_segment(parts.header)?;

    // Extract kid as string, rejecting empty values for defense-in-depth
    let kid = raw
        .kid
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    let alg = raw.alg.filter(|s| !s.is_empty()).ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: header has no alg");
        JwtValidationError::MalformedToken
    })?;

    Ok(TokenHeader { kid, alg })
}

/// Decode a base64url (no padding) segment and deserialize it as JSON.
///
/// # Errors
///
/// Returns `MalformedToken` if the segment is not base64url or the decoded
/// bytes do not deserialize into `T`.
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })
}

// =============================================================================
// Tests
// =============================================================================
