//! Builder patterns for test data construction
//!
//! Provides a fluent API for Cognito-shaped access token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new()
///     .client_id("app-xyz")
///     .with_group("IdpAdmins")
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestClaimsBuilder {
    sub: Option<String>,
    client_id: Option<String>,
    groups: Vec<String>,
    exp: i64,
    extra: Map<String, Value>,
}

impl TestClaimsBuilder {
    /// Create a new claims builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Some("test-subject".to_string()),
            client_id: Some("test-client".to_string()),
            groups: Vec::new(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Set the app client ID
    pub fn client_id(mut self, client_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self
    }

    /// Remove the app client ID (ID-token shape)
    pub fn without_client_id(mut self) -> Self {
        self.client_id = None;
        self
    }

    /// Add a group to `cognito:groups`
    pub fn with_group(mut self, group: &str) -> Self {
        self.groups.push(group.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set the expiration timestamp directly
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = timestamp;
        self
    }

    /// Add any other claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("exp".to_string(), json!(self.exp));
        claims
            .entry("token_use")
            .or_insert_with(|| json!("access"));
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        if let Some(client_id) = self.client_id {
            claims.insert("client_id".to_string(), json!(client_id));
        }
        if !self.groups.is_empty() {
            claims.insert("cognito:groups".to_string(), json!(self.groups));
        }
        Value::Object(claims)
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_cognito_claims() {
        let claims = TestClaimsBuilder::new()
            .for_user("alice")
            .client_id("app-xyz")
            .with_group("IdpAdmins")
            .with_group("UserAdmins")
            .build();

        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["client_id"], "app-xyz");
        assert_eq!(claims["cognito:groups"], json!(["IdpAdmins", "UserAdmins"]));
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_builder_default() {
        let claims = TestClaimsBuilder::default().build();
        assert_eq!(claims["sub"], "test-subject");
        assert!(claims.get("cognito:groups").is_none());
    }

    #[test]
    fn test_builder_expired() {
        let claims = TestClaimsBuilder::new().expires_in(-60).build();
        assert!(claims["exp"].as_i64().unwrap() < Utc::now().timestamp());
    }

    #[test]
    fn test_builder_without_client_id_and_extra_claim() {
        let claims = TestClaimsBuilder::new()
            .without_client_id()
            .with_claim("aud", json!("app-xyz"))
            .build();

        assert!(claims.get("client_id").is_none());
        assert_eq!(claims["aud"], "app-xyz");
    }
}
