//! Signing key cache backed by a remote JWKS endpoint.
//!
//! Fetches public keys from the Cognito JWKS proxy (exposed through API
//! Gateway) and keeps them for the lifetime of the process.
//!
//! # Security
//!
//! - The endpoint URL must match a strict allow-pattern (HTTPS, API Gateway
//!   host, `cognito/.well-known/jwks.json` path) to rule out SSRF through a
//!   misconfigured URL
//! - Keys never expire on a timer. The cache is refreshed only when a token
//!   names a `kid` the current set does not contain, which picks up key
//!   rotation without polling
//! - A published key set is never mutated; a refresh swaps in a new
//!   `Arc<KeySet>`. Callers that queue behind an in-flight fetch share its
//!   outcome, including failure, so an outage costs one fetch timeout
//! - Fetches have a bounded timeout

use crate::errors::AuthError;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Host fragment every accepted endpoint must contain.
const API_GATEWAY_HOST_MARKER: &str = "execute-api";

/// Domain suffix every accepted endpoint host must end with.
const API_GATEWAY_DOMAIN_SUFFIX: &str = ".amazonaws.com";

/// Path suffix every accepted endpoint must end with.
const JWKS_PATH_SUFFIX: &str = "cognito/.well-known/jwks.json";

// =============================================================================
// Endpoint
// =============================================================================

/// A JWKS endpoint URL that passed the allow-pattern check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwksEndpoint(Url);

impl JwksEndpoint {
    /// Validate `url` against the endpoint allow-pattern.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEndpointConfiguration` unless the URL is
    /// HTTPS, its host contains `execute-api` and ends with
    /// `.amazonaws.com`, and its path ends with
    /// `cognito/.well-known/jwks.json`.
    pub fn parse(url: &str) -> Result<Self, AuthError> {
        let parsed = Url::parse(url).map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "JWKS endpoint is not a valid URL");
            AuthError::InvalidEndpointConfiguration
        })?;

        let host = parsed.host_str().unwrap_or_default();
        let allowed = parsed.scheme() == "https"
            && parsed.username().is_empty()
            && parsed.password().is_none()
            && host.contains(API_GATEWAY_HOST_MARKER)
            && host.ends_with(API_GATEWAY_DOMAIN_SUFFIX)
            && parsed.path().ends_with(JWKS_PATH_SUFFIX);

        if !allowed {
            tracing::error!(
                target: "gate.auth.jwks",
                url = %parsed,
                "JWKS endpoint does not match the allowed pattern"
            );
            return Err(AuthError::InvalidEndpointConfiguration);
        }

        Ok(Self(parsed))
    }

    /// Wrap a URL without the allow-pattern check.
    ///
    /// Only available to tests, which point the cache at a local mock server.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEndpointConfiguration` if `url` does not parse.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_unchecked(url: &str) -> Result<Self, AuthError> {
        Url::parse(url)
            .map(Self)
            .map_err(|_| AuthError::InvalidEndpointConfiguration)
    }

    /// The endpoint URL.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for JwksEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

// =============================================================================
// Wire format
// =============================================================================

/// JSON Web Key as published by the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for Cognito, "OKP" or "EC" otherwise).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Algorithm (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for OKP/EC keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key or EC x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document.
///
/// Entries stay raw JSON until [`KeySet::from_jwks`] decodes them one at a
/// time, so a single malformed entry cannot reject the whole document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<serde_json::Value>,
}

// =============================================================================
// Keys
// =============================================================================

/// Why a published JWK could not be turned into a [`SigningKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnusableKey {
    #[error("key use '{0}' is not 'sig'")]
    NotForSigning(String),

    #[error("unsupported key type '{0}'")]
    UnsupportedKeyType(String),

    #[error("algorithm '{alg}' does not fit key type '{kty}'")]
    UnsupportedAlgorithm { kty: String, alg: String },

    #[error("missing key parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("key material does not decode")]
    InvalidMaterial,
}

/// A public key ready for signature verification.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    decoding_key: DecodingKey,
}

/// Key material is deliberately left out of Debug output.
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a key from already-decoded material.
    pub fn new(kid: impl Into<String>, algorithm: Algorithm, decoding_key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            decoding_key,
        }
    }

    /// Key ID.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm this key verifies.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Decoding key for `jsonwebtoken`.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl TryFrom<&Jwk> for SigningKey {
    type Error = UnusableKey;

    fn try_from(jwk: &Jwk) -> Result<Self, Self::Error> {
        if let Some(key_use) = &jwk.key_use {
            if key_use != "sig" {
                return Err(UnusableKey::NotForSigning(key_use.clone()));
            }
        }

        let unsupported_alg = |alg: &str| UnusableKey::UnsupportedAlgorithm {
            kty: jwk.kty.clone(),
            alg: alg.to_string(),
        };

        let (algorithm, decoding_key) = match jwk.kty.as_str() {
            "RSA" => {
                let algorithm = match jwk.alg.as_deref() {
                    None | Some("RS256") => Algorithm::RS256,
                    Some("RS384") => Algorithm::RS384,
                    Some("RS512") => Algorithm::RS512,
                    Some("PS256") => Algorithm::PS256,
                    Some("PS384") => Algorithm::PS384,
                    Some("PS512") => Algorithm::PS512,
                    Some(other) => return Err(unsupported_alg(other)),
                };
                let n = jwk.n.as_deref().ok_or(UnusableKey::MissingParameter("n"))?;
                let e = jwk.e.as_deref().ok_or(UnusableKey::MissingParameter("e"))?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|_| UnusableKey::InvalidMaterial)?;
                (algorithm, key)
            }
            "OKP" => {
                if let Some(alg) = jwk.alg.as_deref() {
                    if alg != "EdDSA" {
                        return Err(unsupported_alg(alg));
                    }
                }
                match jwk.crv.as_deref() {
                    Some("Ed25519") => {}
                    Some(other) => return Err(unsupported_alg(other)),
                    None => return Err(UnusableKey::MissingParameter("crv")),
                }
                let x = jwk.x.as_deref().ok_or(UnusableKey::MissingParameter("x"))?;
                let key =
                    DecodingKey::from_ed_components(x).map_err(|_| UnusableKey::InvalidMaterial)?;
                (Algorithm::EdDSA, key)
            }
            "EC" => {
                let algorithm = match (jwk.crv.as_deref(), jwk.alg.as_deref()) {
                    (Some("P-256"), None | Some("ES256")) => Algorithm::ES256,
                    (Some("P-384"), None | Some("ES384")) => Algorithm::ES384,
                    (None, _) => return Err(UnusableKey::MissingParameter("crv")),
                    (Some(crv), alg) => return Err(unsupported_alg(alg.unwrap_or(crv))),
                };
                let x = jwk.x.as_deref().ok_or(UnusableKey::MissingParameter("x"))?;
                let y = jwk.y.as_deref().ok_or(UnusableKey::MissingParameter("y"))?;
                let key = DecodingKey::from_ec_components(x, y)
                    .map_err(|_| UnusableKey::InvalidMaterial)?;
                (algorithm, key)
            }
            other => return Err(UnusableKey::UnsupportedKeyType(other.to_string())),
        };

        Ok(SigningKey::new(jwk.kid.clone(), algorithm, decoding_key))
    }
}

/// An immutable, ordered set of signing keys with unique key IDs.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    /// Build a key set, keeping the first key for any repeated `kid`.
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        let mut seen = HashSet::new();
        let keys = keys
            .into_iter()
            .filter(|key| {
                let first = seen.insert(key.kid.clone());
                if !first {
                    tracing::warn!(target: "gate.auth.jwks", kid = %key.kid, "Dropping duplicate key ID");
                }
                first
            })
            .collect();
        Self { keys }
    }

    /// Convert a JWKS document, skipping keys that cannot be used.
    pub fn from_jwks(jwks: &JwksResponse) -> Self {
        Self::new(jwks.keys.iter().filter_map(|entry| {
            let jwk = Jwk::deserialize(entry)
                .map_err(|e| {
                    let kid = entry.get("kid").and_then(serde_json::Value::as_str);
                    tracing::warn!(target: "gate.auth.jwks", kid = ?kid, error = %e, "Skipping malformed JWK");
                })
                .ok()?;

            SigningKey::try_from(&jwk)
                .map_err(|e| {
                    tracing::warn!(target: "gate.auth.jwks", kid = %jwk.kid, reason = %e, "Skipping unusable JWK");
                })
                .ok()
        }))
    }

    /// Find the key with exactly this `kid`.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    /// Key IDs in publication order.
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| key.kid.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// =============================================================================
// Fetching
// =============================================================================

/// Source of key sets.
///
/// The production implementation is [`HttpKeyFetcher`]; tests substitute
/// counting or scripted fetchers.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Retrieve the current key set from its source.
    async fn fetch(&self) -> Result<KeySet, AuthError>;
}

/// Fetches the key set over HTTPS.
pub struct HttpKeyFetcher {
    endpoint: JwksEndpoint,
    http_client: reqwest::Client,
}

impl HttpKeyFetcher {
    /// Create a fetcher for `endpoint` with a bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetchFailed` if the HTTP client cannot be built.
    pub fn new(endpoint: JwksEndpoint, timeout: Duration) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to build HTTP client");
                AuthError::KeyFetchFailed
            })?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &JwksEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    #[instrument(skip_all, fields(url = %self.endpoint))]
    async fn fetch(&self) -> Result<KeySet, AuthError> {
        tracing::debug!(target: "gate.auth.jwks", "Fetching JWKS");

        let response = self
            .http_client
            .get(self.endpoint.as_str())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gate.auth.jwks", error = %e, timeout = e.is_timeout(), "Failed to fetch JWKS");
                AuthError::KeyFetchFailed
            })?;

        if response.status() != StatusCode::OK {
            tracing::error!(
                target: "gate.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeyFetchFailed);
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to read JWKS response");
            AuthError::KeyFetchFailed
        })?;

        let jwks: JwksResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeyFetchFailed
        })?;

        let key_set = KeySet::from_jwks(&jwks);
        if key_set.is_empty() {
            tracing::warn!(
                target: "gate.auth.jwks",
                published = jwks.keys.len(),
                "JWKS contains no usable signing keys"
            );
        }

        Ok(key_set)
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Process-wide cache of the current key set.
///
/// Readers get an `Arc<KeySet>` snapshot; the cached reference is only ever
/// replaced whole. Fetches are serialized by `last_fetch`, which also holds
/// the outcome of the most recent fetch. A task that queued behind a fetch
/// takes that fetch's outcome, success or failure, instead of fetching again.
pub struct KeyCache {
    fetcher: Arc<dyn KeyFetcher>,
    current: RwLock<Option<Arc<KeySet>>>,
    last_fetch: Mutex<Option<Result<Arc<KeySet>, AuthError>>>,
    /// Completed fetches. Only written while `last_fetch` is held.
    fetch_generation: AtomicU64,
}

impl KeyCache {
    /// Create an empty cache. Nothing is fetched until first use.
    pub fn new(fetcher: Arc<dyn KeyFetcher>) -> Self {
        Self {
            fetcher,
            current: RwLock::new(None),
            last_fetch: Mutex::new(None),
            fetch_generation: AtomicU64::new(0),
        }
    }

    /// Return the cached key set, fetching it first if the cache is empty.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetchFailed` if the initial fetch fails.
    #[instrument(skip_all)]
    pub async fn get_keys(&self) -> Result<Arc<KeySet>, AuthError> {
        if let Some(keys) = self.snapshot().await {
            tracing::debug!(target: "gate.auth.jwks", "JWKS cache hit");
            return Ok(keys);
        }

        let seen = self.fetch_generation.load(Ordering::Acquire);
        let mut last_fetch = self.last_fetch.lock().await;

        // A fetch completed while we waited; share its outcome
        if let Some(outcome) = self.completed_since(seen, &last_fetch) {
            return outcome;
        }

        self.fetch_and_store(&mut last_fetch).await
    }

    /// Unconditionally re-fetch, replace the cached set and return it.
    ///
    /// On failure the previous set stays in place.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetchFailed` if the fetch fails.
    #[instrument(skip_all)]
    pub async fn invalidate_and_refresh(&self) -> Result<Arc<KeySet>, AuthError> {
        let mut last_fetch = self.last_fetch.lock().await;
        self.fetch_and_store(&mut last_fetch).await
    }

    /// Refresh after a key lookup missed in `stale`.
    ///
    /// If another task already replaced `stale`, or finished a fetch while
    /// this one waited, that result is returned without fetching again. A
    /// failed fetch is shared the same way, so an outage costs waiters one
    /// fetch timeout, not one each.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetchFailed` if the fetch this call waited on,
    /// or its own fetch, failed.
    #[instrument(skip_all)]
    pub async fn refresh_after_miss(&self, stale: &Arc<KeySet>) -> Result<Arc<KeySet>, AuthError> {
        let seen = self.fetch_generation.load(Ordering::Acquire);
        let mut last_fetch = self.last_fetch.lock().await;

        if let Some(outcome) = self.completed_since(seen, &last_fetch) {
            tracing::debug!(target: "gate.auth.jwks", "JWKS already refreshed by a concurrent request");
            return outcome;
        }

        if let Some(current) = self.snapshot().await {
            if !Arc::ptr_eq(&current, stale) {
                tracing::debug!(target: "gate.auth.jwks", "JWKS already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        self.fetch_and_store(&mut last_fetch).await
    }

    async fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.current.read().await.clone()
    }

    /// Outcome of a fetch that completed after generation `seen` was observed.
    fn completed_since(
        &self,
        seen: u64,
        last_fetch: &Option<Result<Arc<KeySet>, AuthError>>,
    ) -> Option<Result<Arc<KeySet>, AuthError>> {
        if self.fetch_generation.load(Ordering::Acquire) == seen {
            return None;
        }
        last_fetch.clone()
    }

    async fn fetch_and_store(
        &self,
        last_fetch: &mut Option<Result<Arc<KeySet>, AuthError>>,
    ) -> Result<Arc<KeySet>, AuthError> {
        let outcome = self.fetcher.fetch().await.map(Arc::new);

        match &outcome {
            Ok(keys) => {
                tracing::info!(
                    target: "gate.auth.jwks",
                    key_count = keys.len(),
                    "JWKS cache refreshed"
                );
                *self.current.write().await = Some(Arc::clone(keys));
            }
            Err(e) => {
                tracing::warn!(target: "gate.auth.jwks", reason = e.code(), "JWKS refresh failed, keeping previous keys");
            }
        }

        *last_fetch = Some(outcome.clone());
        self.fetch_generation.fetch_add(1, Ordering::Release);
        outcome
    }
}
