//! Mock JWKS endpoint
//!
//! Serves a key set at the Cognito proxy path from a local wiremock server
//! and records how often it was fetched.

use crate::crypto_fixtures::TestKeypair;
use admin_gate::auth::JwksEndpoint;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/cognito/.well-known/jwks.json";

/// Local stand-in for the JWKS proxy.
///
/// # Example
/// ```rust,ignore
/// let old_key = TestKeypair::new(1, "K1");
/// let new_key = TestKeypair::new(2, "K2");
/// let jwks = MockJwksServer::start(&[&old_key]).await;
///
/// // Rotate: subsequent fetches see only K2
/// jwks.publish(&[&new_key]).await;
/// ```
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        let mock = Self {
            server: MockServer::start().await,
        };
        mock.publish(keys).await;
        mock
    }

    /// Replace the published key set.
    ///
    /// Also resets the fetch count.
    pub async fn publish(&self, keys: &[&TestKeypair]) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Replace the response with an arbitrary one (errors, bad bodies).
    ///
    /// Also resets the fetch count.
    pub async fn respond_with(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Full URL of the key set.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// The key set URL as an endpoint. Bypasses the allow-pattern, which a
    /// loopback http URL can never satisfy.
    pub fn endpoint(&self) -> JwksEndpoint {
        JwksEndpoint::new_unchecked(&self.url()).expect("Mock server URL should parse")
    }

    /// Number of key set requests since the last `publish`/`respond_with`.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// JWKS document containing `keys`.
pub fn jwks_document(keys: &[&TestKeypair]) -> Value {
    json!({
        "keys": keys.iter().map(|key| key.jwk_json()).collect::<Vec<_>>()
    })
}
