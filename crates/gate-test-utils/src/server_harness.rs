//! Test server harness for E2E testing
//!
//! Provides `TestGateServer` for spawning real admin gate instances in tests.

use crate::jwks_server::MockJwksServer;
use admin_gate::auth::{HttpKeyFetcher, JwtValidator, KeyCache};
use admin_gate::config::Config;
use admin_gate::gate::AuthorizationGate;
use admin_gate::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Placeholder satisfying the endpoint allow-pattern during config loading.
/// The harness swaps in the mock server's endpoint afterwards.
const PLACEHOLDER_ENDPOINT: &str =
    "https://test.execute-api.us-east-1.amazonaws.com/cognito/.well-known/jwks.json";

/// Test harness for spawning the admin gate in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let jwks = MockJwksServer::start(&[]).await;
///     let server = TestGateServer::spawn(&jwks, "app-xyz").await?;
///
///     let response = reqwest::get(format!("{}/v1/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    config: Config,
    key_cache: Arc<KeyCache>,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn a gate validating against `jwks` for app client `client_id`.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    ///
    /// # Returns
    /// * `Ok(TestGateServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If server spawn fails
    pub async fn spawn(jwks: &MockJwksServer, client_id: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(jwks, client_id, HashMap::new()).await
    }

    /// Like [`spawn`](Self::spawn), with extra environment variables.
    pub async fn spawn_with_vars(
        jwks: &MockJwksServer,
        client_id: &str,
        extra_vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        // Build configuration for test environment
        let mut vars = HashMap::from([
            (
                "JWKS_PROXY_ENDPOINT".to_string(),
                PLACEHOLDER_ENDPOINT.to_string(),
            ),
            (
                "COGNITO_USER_POOL_CLIENT_ID".to_string(),
                client_id.to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        vars.extend(extra_vars);

        let mut config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        config.jwks_endpoint = jwks.endpoint();

        let fetcher = HttpKeyFetcher::new(config.jwks_endpoint.clone(), config.jwks_fetch_timeout)
            .map_err(|e| anyhow::anyhow!("Failed to create JWKS fetcher: {}", e))?;
        let key_cache = Arc::new(KeyCache::new(Arc::new(fetcher)));
        let validator = Arc::new(JwtValidator::new(
            Arc::clone(&key_cache),
            config.client_id.clone(),
        ));
        let gate = AuthorizationGate::new(validator, config.groups_claim.clone());

        let state = Arc::new(AppState {
            config: config.clone(),
            gate,
        });

        // Build routes using admin-gate's real route builder
        let app = routes::build_routes(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            key_cache,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The key cache the server validates against.
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.key_cache
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so it stops when the test completes
        self._handle.abort();
    }
}
