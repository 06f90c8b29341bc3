//! Common utilities shared across the admin gate crates.

#![warn(clippy::pedantic)]

/// Module for JWT primitives (size limit, segment parsing, header extraction)
pub mod jwt;
