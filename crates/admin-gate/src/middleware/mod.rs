//! Middleware for the admin gate.
//!
//! # Components
//!
//! - `auth` - Group-gated authentication for protected route groups

pub mod auth;

pub use auth::{require_group, ClaimsExt, GroupGuard};
