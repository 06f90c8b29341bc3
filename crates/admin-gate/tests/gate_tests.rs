//! Admin route integration tests.
//!
//! Spawns the real router behind `TestGateServer` and drives it over HTTP.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use gate_test_utils::{MockJwksServer, TestClaimsBuilder, TestGateServer, TestKeypair};
use reqwest::{Method, StatusCode};
use std::collections::HashMap;

const CLIENT_ID: &str = "app-xyz";

struct Fixture {
    keypair: TestKeypair,
    jwks: MockJwksServer,
    server: TestGateServer,
    client: reqwest::Client,
}

impl Fixture {
    async fn start() -> Result<Self> {
        let keypair = TestKeypair::new(1, "K1");
        let jwks = MockJwksServer::start(&[&keypair]).await;
        let server = TestGateServer::spawn(&jwks, CLIENT_ID).await?;
        Ok(Self {
            keypair,
            jwks,
            server,
            client: reqwest::Client::new(),
        })
    }

    fn token_with_groups(&self, groups: &[&str]) -> String {
        let claims = groups
            .iter()
            .fold(
                TestClaimsBuilder::new()
                    .for_user("admin-1")
                    .client_id(CLIENT_ID),
                |builder, group| builder.with_group(group),
            )
            .build();
        self.keypair.sign_token(&claims)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.server.url(), path))
    }
}

#[tokio::test]
async fn test_missing_token_is_401_with_challenge() -> Result<()> {
    let fixture = Fixture::start().await?;

    let response = fixture.request(Method::GET, "/api/idp/whoami").send().await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()?
        .to_string();
    assert!(challenge.starts_with("Bearer"));

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "MISSING_CREDENTIAL");

    // No token, no key fetch
    assert_eq!(fixture.jwks.fetch_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_forged_token_is_401() -> Result<()> {
    let fixture = Fixture::start().await?;
    let attacker = TestKeypair::new(42, "K1");
    let forged = attacker.sign_token(
        &TestClaimsBuilder::new()
            .client_id(CLIENT_ID)
            .with_group("IdpAdmins")
            .build(),
    );

    let response = fixture
        .request(Method::GET, "/api/idp/whoami")
        .bearer_auth(forged)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "SIGNATURE_INVALID");
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_401() -> Result<()> {
    let fixture = Fixture::start().await?;
    let token = fixture.keypair.sign_token(
        &TestClaimsBuilder::new()
            .client_id(CLIENT_ID)
            .with_group("IdpAdmins")
            .expires_in(-1)
            .build(),
    );

    let response = fixture
        .request(Method::GET, "/api/idp/whoami")
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "TOKEN_EXPIRED");
    Ok(())
}

#[tokio::test]
async fn test_missing_group_is_403() -> Result<()> {
    let fixture = Fixture::start().await?;
    let token = fixture.token_with_groups(&["UserAdmins"]);

    let response = fixture
        .request(Method::GET, "/api/idp/whoami")
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get("www-authenticate").is_none());
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");
    Ok(())
}

#[tokio::test]
async fn test_idp_admin_sees_own_claims() -> Result<()> {
    let fixture = Fixture::start().await?;
    let token = fixture.token_with_groups(&["IdpAdmins"]);

    let response = fixture
        .request(Method::GET, "/api/idp/whoami")
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["sub"], "admin-1");
    assert_eq!(body["client_id"], CLIENT_ID);
    assert_eq!(body["groups"], serde_json::json!(["IdpAdmins"]));
    assert!(body["exp"].as_i64().is_some());
    Ok(())
}

#[tokio::test]
async fn test_route_groups_require_their_own_group() -> Result<()> {
    let fixture = Fixture::start().await?;
    let user_admin = fixture.token_with_groups(&["UserAdmins"]);

    let user_route = fixture
        .request(Method::GET, "/api/user/whoami")
        .bearer_auth(&user_admin)
        .send()
        .await?;
    let idp_route = fixture
        .request(Method::GET, "/api/idp/whoami")
        .bearer_auth(&user_admin)
        .send()
        .await?;

    assert_eq!(user_route.status(), StatusCode::OK);
    assert_eq!(idp_route.status(), StatusCode::FORBIDDEN);
    // One key fetch serves every request
    assert_eq!(fixture.jwks.fetch_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_preflight_needs_no_token() -> Result<()> {
    let fixture = Fixture::start().await?;

    for path in ["/api/idp/whoami", "/api/user/whoami"] {
        let response = fixture.request(Method::OPTIONS, path).send().await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT, "{path}");
    }

    assert_eq!(fixture.jwks.fetch_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_unsupported_method_is_405() -> Result<()> {
    let fixture = Fixture::start().await?;
    let token = fixture.token_with_groups(&["IdpAdmins"]);

    let response = fixture
        .request(Method::DELETE, "/api/idp/whoami")
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn test_key_outage_is_401() -> Result<()> {
    let fixture = Fixture::start().await?;
    fixture
        .jwks
        .respond_with(wiremock::ResponseTemplate::new(502))
        .await;
    let token = fixture.token_with_groups(&["IdpAdmins"]);

    let response = fixture
        .request(Method::GET, "/api/idp/whoami")
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "KEY_FETCH_FAILED");
    Ok(())
}

#[tokio::test]
async fn test_custom_groups_configuration() -> Result<()> {
    let keypair = TestKeypair::new(1, "K1");
    let jwks = MockJwksServer::start(&[&keypair]).await;
    let server = TestGateServer::spawn_with_vars(
        &jwks,
        CLIENT_ID,
        HashMap::from([
            ("GROUPS_CLAIM".to_string(), "groups".to_string()),
            ("IDP_ADMIN_GROUP".to_string(), "IdpOperators".to_string()),
        ]),
    )
    .await?;
    let token = keypair.sign_token(
        &TestClaimsBuilder::new()
            .client_id(CLIENT_ID)
            .with_claim("groups", serde_json::json!(["IdpOperators"]))
            .build(),
    );

    let response = reqwest::Client::new()
        .get(format!("{}/api/idp/whoami", server.url()))
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["groups"], serde_json::json!(["IdpOperators"]));
    Ok(())
}
