//! # Gate Test Utilities
//!
//! Shared test utilities for the admin gate.
//!
//! This crate provides:
//! - Deterministic Ed25519 fixtures (`TestKeypair`) that sign real tokens
//! - Claim builders (`TestClaimsBuilder`)
//! - A mock JWKS endpoint (`MockJwksServer`) backed by wiremock
//! - Server test harness (`TestGateServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let keypair = TestKeypair::new(1, "K1");
//!     let jwks = MockJwksServer::start(&[&keypair]).await;
//!     let server = TestGateServer::spawn(&jwks, "app-xyz").await?;
//!
//!     let token = keypair.sign_token(
//!         &TestClaimsBuilder::new()
//!             .client_id("app-xyz")
//!             .with_group("IdpAdmins")
//!             .build(),
//!     );
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/idp/whoami", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use server_harness::*;
pub use token_builders::*;
