//! Token verification for the admin APIs.
//!
//! # Components
//!
//! - `jwks` - JWKS endpoint policy, key fetching and the process-wide key cache
//! - `jwt` - Signature, expiration and audience verification
//! - `claims` - Claims of a verified token

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use jwks::{HttpKeyFetcher, JwksEndpoint, KeyCache, KeyFetcher, KeySet, SigningKey};
pub use jwt::{verify, JwtValidator, TokenValidator};
