//! Admin gate configuration.
//!
//! Configuration is loaded once from environment variables at startup. A
//! missing or invalid value stops the process; nothing is re-read per
//! request. The app client ID is redacted in Debug output.

use crate::auth::claims::DEFAULT_GROUPS_CLAIM;
use crate::auth::jwks::{JwksEndpoint, DEFAULT_FETCH_TIMEOUT_SECONDS};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default group required by the identity-provider admin API.
pub const DEFAULT_IDP_ADMIN_GROUP: &str = "IdpAdmins";

/// Default group required by the user admin API.
pub const DEFAULT_USER_ADMIN_GROUP: &str = "UserAdmins";

/// Upper bound for `JWKS_FETCH_TIMEOUT_SECONDS`.
pub const MAX_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Admin gate configuration.
#[derive(Clone)]
pub struct Config {
    /// JWKS proxy endpoint, already checked against the allow-pattern.
    pub jwks_endpoint: JwksEndpoint,

    /// Cognito app client ID every token must be issued to.
    pub client_id: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Claim carrying group membership (default: "cognito:groups").
    pub groups_claim: String,

    /// Group required for `/api/idp` (default: "IdpAdmins").
    pub idp_admin_group: String,

    /// Group required for `/api/user` (default: "UserAdmins").
    pub user_admin_group: String,

    /// Timeout for one JWKS fetch (default: 10s).
    pub jwks_fetch_timeout: Duration,
}

/// Custom Debug implementation that redacts the client ID.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwks_endpoint", &self.jwks_endpoint.as_str())
            .field("client_id", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("groups_claim", &self.groups_claim)
            .field("idp_admin_group", &self.idp_admin_group)
            .field("user_admin_group", &self.user_admin_group)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS endpoint configuration: {0}")]
    InvalidJwksEndpoint(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Environment variable must not be empty: {0}")]
    EmptyValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let endpoint_url = required(vars, "JWKS_PROXY_ENDPOINT")?;
        let jwks_endpoint = JwksEndpoint::parse(endpoint_url).map_err(|_| {
            ConfigError::InvalidJwksEndpoint(format!(
                "JWKS_PROXY_ENDPOINT must be an https API Gateway URL ending in \
                 cognito/.well-known/jwks.json, got '{}'",
                endpoint_url
            ))
        })?;

        let client_id = required(vars, "COGNITO_USER_POOL_CLIENT_ID")?.to_string();

        let bind_address = optional(vars, "BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?;
        let groups_claim = optional(vars, "GROUPS_CLAIM", DEFAULT_GROUPS_CLAIM)?;
        let idp_admin_group = optional(vars, "IDP_ADMIN_GROUP", DEFAULT_IDP_ADMIN_GROUP)?;
        let user_admin_group = optional(vars, "USER_ADMIN_GROUP", DEFAULT_USER_ADMIN_GROUP)?;

        // Parse JWKS fetch timeout with validation
        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidFetchTimeout(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_FETCH_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                        MAX_FETCH_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_FETCH_TIMEOUT_SECONDS
            };

        Ok(Config {
            jwks_endpoint,
            client_id,
            bind_address,
            groups_claim,
            idp_admin_group,
            user_admin_group,
            jwks_fetch_timeout: Duration::from_secs(jwks_fetch_timeout_seconds),
        })
    }
}

fn required<'a>(vars: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ConfigError> {
    let value = vars
        .get(name)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;

    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(name.to_string()));
    }

    Ok(value)
}

fn optional(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(name.to_string())),
        Some(value) => Ok(value.clone()),
        None => Ok(default.to_string()),
    }
}
