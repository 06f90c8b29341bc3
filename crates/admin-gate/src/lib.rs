//! Admin API Token Gate Library
//!
//! Authentication and authorization in front of the administrative HTTP
//! APIs (identity-provider management under `/api/idp`, user management
//! under `/api/user`):
//!
//! - Fetching and caching the Cognito signing keys (JWKS)
//! - Verifying bearer token signatures, expiration and audience
//! - Enforcing group membership per route group
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> gate.rs -> auth/jwt.rs -> auth/jwks.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key cache, token verifier and claims
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `gate` - Authorization gate consumed by request handlers
//! - `handlers` - HTTP request handlers
//! - `middleware` - Group-gated axum middleware
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod routes;
