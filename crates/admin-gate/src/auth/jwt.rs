//! Token verification.
//!
//! [`verify`] is a pure function over a token, a key set, the expected
//! audience and the current time. [`JwtValidator`] drives it against the
//! shared [`KeyCache`], supplying the clock and refreshing the keys once when
//! a token names a key the cache does not know yet.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The signature is verified with the algorithm of the selected key; a
//!   header `alg` that disagrees is rejected, so `none` or HMAC downgrades are
//!   impossible
//! - The payload is only decoded after the signature verified
//! - Expiration is strict: a token is expired at `exp == now`

use crate::auth::claims::Claims;
use crate::auth::jwks::{KeyCache, KeySet};
use crate::errors::AuthError;
use async_trait::async_trait;
use common::jwt::{decode_segment, parse_header, split_token};
use jsonwebtoken::{crypto, Algorithm};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// Verify `token` against `keys` and return its claims.
///
/// `now` is Unix epoch seconds.
///
/// # Errors
///
/// - `MalformedToken` - not a compact JWT, bad header, or payload without a numeric `exp`
/// - `UnknownSigningKey` - no key in `keys` has the token's `kid`
/// - `SignatureInvalid` - header `alg` differs from the key's, or the signature does not verify
/// - `TokenExpired` - `exp <= now`
/// - `AudienceMismatch` - audience is absent or differs from `expected_audience`
pub fn verify(
    token: &str,
    keys: &KeySet,
    expected_audience: &str,
    now: i64,
) -> Result<Claims, AuthError> {
    // 1. Header (includes size check)
    let parts = split_token(token)?;
    let header = parse_header(&parts)?;

    // 2. Key lookup
    let key = keys.find(&header.kid).ok_or_else(|| {
        tracing::debug!(target: "gate.auth.jwt", kid = %header.kid, "No signing key for kid");
        AuthError::UnknownSigningKey
    })?;

    // 3. Signature, with the key's algorithm only
    match Algorithm::from_str(&header.alg) {
        Ok(alg) if alg == key.algorithm() => {}
        _ => {
            tracing::debug!(
                target: "gate.auth.jwt",
                header_alg = %header.alg,
                key_alg = ?key.algorithm(),
                "Token algorithm does not match signing key"
            );
            return Err(AuthError::SignatureInvalid);
        }
    }

    let signature_ok = crypto::verify(
        parts.signature,
        parts.signing_input(token).as_bytes(),
        key.decoding_key(),
        key.algorithm(),
    )
    .unwrap_or_else(|e| {
        tracing::debug!(target: "gate.auth.jwt", error = %e, "Signature could not be checked");
        false
    });

    if !signature_ok {
        tracing::debug!(target: "gate.auth.jwt", kid = %header.kid, "Token signature mismatch");
        return Err(AuthError::SignatureInvalid);
    }

    // 4. Claims
    let claims: Claims = decode_segment(parts.payload)?;

    // 5. Expiration
    if claims.is_expired_at(now) {
        tracing::debug!(target: "gate.auth.jwt", exp = %claims.exp, now, "Token expired");
        return Err(AuthError::TokenExpired);
    }

    // 6. Audience
    if claims.audience() != Some(expected_audience) {
        tracing::debug!(target: "gate.auth.jwt", "Token audience mismatch");
        return Err(AuthError::AudienceMismatch);
    }

    Ok(claims)
}

/// Turns a bearer token into verified claims.
///
/// The gate depends on this trait rather than on [`JwtValidator`] so it can
/// be exercised without a key source.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Validates tokens against the cached key set for one app client.
pub struct JwtValidator {
    key_cache: Arc<KeyCache>,
    expected_audience: String,
}

impl JwtValidator {
    /// Create a validator accepting tokens issued to `expected_audience`.
    pub fn new(key_cache: Arc<KeyCache>, expected_audience: impl Into<String>) -> Self {
        Self {
            key_cache,
            expected_audience: expected_audience.into(),
        }
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    /// Validate a JWT and return the claims.
    ///
    /// A token signed with a key missing from the cached set triggers exactly
    /// one refresh and a second verification attempt.
    #[instrument(skip_all)]
    async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let keys = self.key_cache.get_keys().await?;

        let claims = match verify(token, &keys, &self.expected_audience, now) {
            Err(AuthError::UnknownSigningKey) => {
                tracing::info!(target: "gate.auth.jwt", "Unknown signing key, refreshing JWKS");
                let refreshed = self.key_cache.refresh_after_miss(&keys).await?;
                verify(token, &refreshed, &self.expected_audience, now)?
            }
            result => result?,
        };

        tracing::debug!(target: "gate.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}
