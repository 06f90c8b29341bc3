//! Admin API Token Gate
//!
//! Entry point for the service that authenticates and authorizes callers
//! of the identity-provider and user administration APIs.

use admin_gate::auth::{HttpKeyFetcher, JwtValidator, KeyCache};
use admin_gate::config::Config;
use admin_gate::gate::AuthorizationGate;
use admin_gate::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admin_gate=info,gate=info,common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Admin API Token Gate");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        jwks_endpoint = %config.jwks_endpoint,
        bind_address = %config.bind_address,
        groups_claim = %config.groups_claim,
        "Configuration loaded successfully"
    );

    // Keys are fetched lazily on the first protected request
    let fetcher = HttpKeyFetcher::new(config.jwks_endpoint.clone(), config.jwks_fetch_timeout)
        .map_err(|e| {
            error!("Failed to create JWKS fetcher: {}", e);
            e
        })?;
    let key_cache = Arc::new(KeyCache::new(Arc::new(fetcher)));
    let validator = Arc::new(JwtValidator::new(key_cache, config.client_id.clone()));
    let gate = AuthorizationGate::new(validator, config.groups_claim.clone());

    // Parse bind address before moving config
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState { config, gate });
    let app = routes::build_routes(state);

    info!("Admin API Token Gate listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Admin API Token Gate shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
