//! JWT claims structure.
//!
//! Holds the payload of a token whose signature has been verified. Well-known
//! claims get typed fields; everything else is kept verbatim so the claims
//! serialize back to the payload they were decoded from. The `sub` field is
//! redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Claim that carries Cognito group membership.
pub const DEFAULT_GROUPS_CLAIM: &str = "cognito:groups";

/// Claims of a verified token.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user identifier) - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds). Any JSON number; issuers
    /// may write fractional seconds.
    pub exp: Number,

    /// App client the token was issued to (Cognito access tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// All remaining claims, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Custom Debug implementation that redacts the `sub` field and only lists
/// the names of the remaining claims.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("client_id", &self.client_id)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Claims {
    /// The audience identifier to compare against the configured client ID.
    ///
    /// Access tokens carry `client_id`; ID tokens carry a string `aud`.
    pub fn audience(&self) -> Option<&str> {
        self.client_id
            .as_deref()
            .or_else(|| self.extra.get("aud").and_then(Value::as_str))
    }

    /// Whether the token is expired at `now` (Unix epoch seconds).
    ///
    /// Strict: a token whose `exp` equals `now` is expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.exp.as_i64() {
            Some(exp) => exp <= now,
            // Fractional or beyond i64
            None => match self.exp.as_f64() {
                Some(exp) => exp <= now as f64,
                None => true,
            },
        }
    }

    /// Group names listed under `claim`.
    ///
    /// Accepts a JSON array of strings or a single string. Non-string array
    /// entries are ignored.
    pub fn groups(&self, claim: &str) -> Vec<&str> {
        match self.extra.get(claim) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(single)) => vec![single.as_str()],
            _ => Vec::new(),
        }
    }

    /// Whether `group` is listed under `claim`. Exact, case-sensitive match.
    pub fn in_group(&self, claim: &str, group: &str) -> bool {
        self.groups(claim).contains(&group)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn access_token_claims() -> Claims {
        serde_json::from_value(json!({
            "sub": "secret-user-id",
            "exp": 1_700_003_600,
            "client_id": "app-xyz",
            "token_use": "access",
            "cognito:groups": ["IdpAdmins", "Viewers"]
        }))
        .unwrap()
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let debug_str = format!("{:?}", access_token_claims());

        assert!(
            !debug_str.contains("secret-user-id"),
            "Debug output should not contain actual sub value"
        );
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_claims_serialize_back_to_payload() {
        let payload = json!({
            "sub": "u-1",
            "exp": 42,
            "client_id": "app-xyz",
            "scope": "aws.cognito.signin.user.admin",
            "cognito:groups": ["UserAdmins"]
        });

        let claims: Claims = serde_json::from_value(payload.clone()).unwrap();

        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    }

    #[test]
    fn test_claims_require_exp() {
        let result: Result<Claims, _> = serde_json::from_value(json!({"client_id": "app"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_claims_reject_non_numeric_exp() {
        for exp in [json!("soon"), json!(null), json!([1])] {
            let result: Result<Claims, _> = serde_json::from_value(json!({"exp": exp}));
            assert!(result.is_err(), "exp {exp} should be rejected");
        }
    }

    #[test]
    fn test_claims_accept_fractional_exp() {
        let payload = json!({"exp": 1_700_000_000.5, "client_id": "app-xyz"});
        let claims: Claims = serde_json::from_value(payload.clone()).unwrap();

        assert!(!claims.is_expired_at(1_700_000_000));
        assert!(claims.is_expired_at(1_700_000_001));
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    }

    #[test]
    fn test_is_expired_at_is_strict() {
        let claims: Claims = serde_json::from_value(json!({"exp": 100})).unwrap();
        assert!(!claims.is_expired_at(99));
        assert!(claims.is_expired_at(100));
        assert!(claims.is_expired_at(101));
    }

    #[test]
    fn test_groups_from_array() {
        let claims = access_token_claims();
        assert_eq!(
            claims.groups(DEFAULT_GROUPS_CLAIM),
            vec!["IdpAdmins", "Viewers"]
        );
        assert!(claims.in_group(DEFAULT_GROUPS_CLAIM, "IdpAdmins"));
        assert!(!claims.in_group(DEFAULT_GROUPS_CLAIM, "idpadmins"));
        assert!(!claims.in_group(DEFAULT_GROUPS_CLAIM, "IdpAdmin"));
    }

    #[test]
    fn test_groups_from_single_string() {
        let claims: Claims = serde_json::from_value(json!({
            "exp": 1,
            "groups": "UserAdmins"
        }))
        .unwrap();
        assert_eq!(claims.groups("groups"), vec!["UserAdmins"]);
    }

    #[test]
    fn test_groups_missing_claim() {
        let claims: Claims = serde_json::from_value(json!({"exp": 1})).unwrap();
        assert!(claims.groups(DEFAULT_GROUPS_CLAIM).is_empty());
        assert!(!claims.in_group(DEFAULT_GROUPS_CLAIM, "IdpAdmins"));
    }

    #[test]
    fn test_groups_ignores_non_string_entries() {
        let claims: Claims = serde_json::from_value(json!({
            "exp": 1,
            "cognito:groups": ["IdpAdmins", 7, null]
        }))
        .unwrap();
        assert_eq!(claims.groups(DEFAULT_GROUPS_CLAIM), vec!["IdpAdmins"]);
    }

    #[test]
    fn test_audience_prefers_client_id() {
        let claims: Claims = serde_json::from_value(json!({
            "exp": 1,
            "client_id": "from-access-token",
            "aud": "from-id-token"
        }))
        .unwrap();
        assert_eq!(claims.audience(), Some("from-access-token"));
    }

    #[test]
    fn test_audience_falls_back_to_aud() {
        let claims: Claims = serde_json::from_value(json!({
            "exp": 1,
            "aud": "from-id-token"
        }))
        .unwrap();
        assert_eq!(claims.audience(), Some("from-id-token"));
    }

    #[test]
    fn test_audience_absent() {
        let claims: Claims = serde_json::from_value(json!({"exp": 1})).unwrap();
        assert_eq!(claims.audience(), None);
    }
}
