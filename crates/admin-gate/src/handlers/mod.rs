//! HTTP request handlers for the admin gate.

pub mod health;
pub mod whoami;

pub use health::health_check;
pub use whoami::{preflight, whoami};
