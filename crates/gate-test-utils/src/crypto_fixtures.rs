//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs that sign real JWTs and publish
//! matching JWKs. The same seed always produces the same keypair.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::Value;

/// Ed25519 test keypair identified by a key ID.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::new(1, "K1");
/// let token = keypair.sign_token(&TestClaimsBuilder::new().build());
/// let jwks = serde_json::json!({ "keys": [keypair.jwk_json()] });
/// ```
pub struct TestKeypair {
    kid: String,
    seed: [u8; 32],
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Create a deterministic keypair from `seed`.
    pub fn new(seed: u8, kid: &str) -> Self {
        // Create deterministic seed
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            seed: seed_bytes,
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// Same key material published under a different key ID.
    pub fn with_kid(&self, kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            seed: self.seed,
            public_key_bytes: self.public_key_bytes.clone(),
            private_key_pkcs8: self.private_key_pkcs8.clone(),
        }
    }

    /// Key ID placed in token headers and the published JWK.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign `claims` as an EdDSA JWT with this keypair's `kid`.
    pub fn sign_token(&self, claims: &Value) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());

        encode(&header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// Sign an arbitrary header and payload with this keypair.
    ///
    /// Unlike [`sign_token`](Self::sign_token) the header is taken verbatim,
    /// so tests can claim a different `alg` or omit `kid` while still
    /// carrying a genuine Ed25519 signature.
    pub fn sign_raw(&self, header: &Value, claims: &Value) -> String {
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );

        let key_pair =
            Ed25519KeyPair::from_seed_unchecked(&self.seed).expect("Failed to create test keypair");
        let signature = key_pair.sign(signing_input.as_bytes());

        format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.as_ref())
        )
    }

    /// The public key as an `OKP` JWK.
    pub fn jwk_json(&self) -> Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// Build PKCS#8 v1 document from Ed25519 seed.
///
/// Ring doesn't expose a method to get PKCS#8 from `Ed25519KeyPair`, so the
/// DER is assembled by hand.
pub fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE, OID 1.3.101.112 (Ed25519)
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING wrapping an OCTET STRING with the seed
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}
