//! Shared test initialization and a synthetic authenticator.
//!
//! Tests run against the in-memory cache store and a shared-cache SQLite
//! memory database. The synthetic authenticator holds a real P-256 keypair
//! and produces byte-correct attestation objects and signed assertions, so
//! ceremony tests exercise the same parsing and verification paths as a
//! browser would.

use std::sync::Once;

use chrono::Utc;
use ciborium::value::{Integer, Value as CborValue};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};

use crate::passkey::{AuthenticatorResponse, PasskeyStore, RegisterCredential, StoredCredential};
use crate::userdb::{User, UserStore};
use crate::utils::{base64url_encode, gen_random_bytes};

/// Centralized test initialization for all tests across the crate.
///
/// Environment variables are set once; store initialization is idempotent
/// (`CREATE TABLE IF NOT EXISTS`) and safe to repeat per test.
pub(crate) async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        dotenvy::from_filename(".env_test").ok();

        // Defaults for anything .env_test did not provide; env var
        // manipulation affects process-global state
        let defaults = [
            ("ORIGIN", "http://localhost:3000"),
            ("CACHE_STORE_TYPE", "memory"),
            ("DATA_STORE_TYPE", "sqlite"),
            (
                "DATA_STORE_URL",
                "sqlite:file:fedlogin_test?mode=memory&cache=shared",
            ),
        ];
        for (key, value) in defaults {
            if std::env::var(key).is_err() {
                unsafe {
                    std::env::set_var(key, value);
                }
            }
        }
    });

    if let Err(e) = UserStore::init().await {
        eprintln!("Warning: Failed to initialize UserStore: {e}");
    }
    if let Err(e) = PasskeyStore::init().await {
        eprintln!("Warning: Failed to initialize PasskeyStore: {e}");
    }
}

fn test_origin() -> String {
    std::env::var("ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn test_rp_id() -> String {
    test_origin()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(':')
        .next()
        .unwrap_or("localhost")
        .to_string()
}

/// Insert a user record, ignoring conflicts with earlier tests
pub(crate) async fn insert_test_user(user_id: &str, username: &str, display_name: &str) {
    let user = User::new(
        user_id.to_string(),
        username.to_string(),
        display_name.to_string(),
        None,
    );
    let _ = UserStore::upsert_user(user).await;
}

/// Insert a user together with a placeholder credential
pub(crate) async fn insert_test_user_and_credential(
    credential_id: &str,
    user_id: &str,
    username: &str,
    user_handle: &str,
    counter: u32,
) {
    insert_test_user(user_id, username, username).await;

    let now = Utc::now();
    let _ = PasskeyStore::store_credential(StoredCredential {
        credential_id: credential_id.to_string(),
        user_id: user_id.to_string(),
        user_handle: user_handle.to_string(),
        username: username.to_string(),
        public_key: base64url_encode(b"placeholder"),
        counter,
        flagged: false,
        created_at: now,
        updated_at: now,
    })
    .await;
}

/// A software authenticator with a real P-256 key.
///
/// Produces registration attestation objects ("none" format) and signed
/// assertions that verify against the key it registered.
pub(crate) struct TestAuthenticator {
    key_pair: EcdsaKeyPair,
    credential_id: Vec<u8>,
}

impl TestAuthenticator {
    pub(crate) fn new() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .expect("failed to generate test keypair");
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .expect("failed to load test keypair");

        Self {
            key_pair,
            credential_id: gen_random_bytes(32).expect("failed to generate credential id"),
        }
    }

    pub(crate) fn credential_id_b64(&self) -> String {
        base64url_encode(&self.credential_id)
    }

    /// COSE_Key map for this authenticator's public key (EC2 / ES256)
    fn cose_public_key(&self) -> Vec<u8> {
        let public = self.key_pair.public_key().as_ref();
        // Uncompressed point: 0x04 || x || y
        let (x, y) = (&public[1..33], &public[33..65]);

        let map = CborValue::Map(vec![
            (
                CborValue::Integer(Integer::from(1)),
                CborValue::Integer(Integer::from(2)), // kty: EC2
            ),
            (
                CborValue::Integer(Integer::from(3)),
                CborValue::Integer(Integer::from(-7)), // alg: ES256
            ),
            (
                CborValue::Integer(Integer::from(-1)),
                CborValue::Integer(Integer::from(1)), // crv: P-256
            ),
            (
                CborValue::Integer(Integer::from(-2)),
                CborValue::Bytes(x.to_vec()),
            ),
            (
                CborValue::Integer(Integer::from(-3)),
                CborValue::Bytes(y.to_vec()),
            ),
        ]);

        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&map, &mut bytes).expect("failed to encode COSE key");
        bytes
    }

    fn client_data(type_: &str, challenge: &str, origin: &str) -> String {
        let json = serde_json::json!({
            "type": type_,
            "challenge": challenge,
            "origin": origin,
        });
        base64url_encode(json.to_string().as_bytes())
    }

    fn rp_id_hash() -> Vec<u8> {
        ring::digest::digest(&ring::digest::SHA256, test_rp_id().as_bytes())
            .as_ref()
            .to_vec()
    }

    /// Authenticator data for registration: UP and AT flags set, counter 0,
    /// followed by attested credential data
    fn registration_auth_data(&self) -> Vec<u8> {
        let mut data = Self::rp_id_hash();
        data.push(0x41); // UP | AT
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 16]); // AAGUID
        data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
        data.extend_from_slice(&self.credential_id);
        data.extend_from_slice(&self.cose_public_key());
        data
    }

    fn assertion_auth_data(counter: u32) -> Vec<u8> {
        let mut data = Self::rp_id_hash();
        data.push(0x01); // UP
        data.extend_from_slice(&counter.to_be_bytes());
        data
    }

    pub(crate) fn registration_response(&self, challenge: &str) -> RegisterCredential {
        self.registration_response_with(challenge, "webauthn.create", &test_origin())
    }

    pub(crate) fn registration_response_with_origin(
        &self,
        challenge: &str,
        origin: &str,
    ) -> RegisterCredential {
        self.registration_response_with(challenge, "webauthn.create", origin)
    }

    pub(crate) fn registration_response_with_type(
        &self,
        challenge: &str,
        type_: &str,
    ) -> RegisterCredential {
        self.registration_response_with(challenge, type_, &test_origin())
    }

    fn registration_response_with(
        &self,
        challenge: &str,
        type_: &str,
        origin: &str,
    ) -> RegisterCredential {
        let attestation = CborValue::Map(vec![
            (
                CborValue::Text("fmt".to_string()),
                CborValue::Text("none".to_string()),
            ),
            (
                CborValue::Text("attStmt".to_string()),
                CborValue::Map(vec![]),
            ),
            (
                CborValue::Text("authData".to_string()),
                CborValue::Bytes(self.registration_auth_data()),
            ),
        ]);
        let mut attestation_bytes = Vec::new();
        ciborium::ser::into_writer(&attestation, &mut attestation_bytes)
            .expect("failed to encode attestation object");

        serde_json::from_value(serde_json::json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": Self::client_data(type_, challenge, origin),
                "attestationObject": base64url_encode(&attestation_bytes),
            },
        }))
        .expect("failed to build RegisterCredential")
    }

    /// A correctly signed assertion for the given challenge and counter
    pub(crate) fn assertion_response(&self, challenge: &str, counter: u32) -> AuthenticatorResponse {
        let client_data = Self::client_data("webauthn.get", challenge, &test_origin());
        let auth_data = Self::assertion_auth_data(counter);

        let client_data_raw = crate::utils::base64url_decode(&client_data).unwrap();
        let client_data_hash = ring::digest::digest(&ring::digest::SHA256, &client_data_raw);

        let mut signed_data = auth_data.clone();
        signed_data.extend_from_slice(client_data_hash.as_ref());

        let rng = SystemRandom::new();
        let signature = self
            .key_pair
            .sign(&rng, &signed_data)
            .expect("failed to sign assertion");

        serde_json::from_value(serde_json::json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data,
                "authenticatorData": base64url_encode(&auth_data),
                "signature": base64url_encode(signature.as_ref()),
                "userHandle": null,
            },
        }))
        .expect("failed to build AuthenticatorResponse")
    }
}
