//! A software authenticator that plays the browser's part of a ceremony.
//!
//! It holds a real P-256 keypair, answers registration options with a
//! byte-correct "none"-format attestation object and answers authentication
//! options with a correctly signed assertion. Responses are produced as the
//! JSON the wire endpoints would receive and deserialized into the crate's
//! public request types.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ciborium::value::{Integer, Value as CborValue};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};
use serde::Serialize;

use fedlogin::{AuthenticatorResponse, RegisterCredential};

use super::test_setup::{test_origin, test_rp_id};

pub fn b64url(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Read the issued challenge out of a serialized options structure, the way
/// the browser-side driver does.
pub fn challenge_of<T: Serialize>(options: &T) -> String {
    serde_json::to_value(options).expect("options must serialize")["challenge"]
        .as_str()
        .expect("options carry a challenge")
        .to_string()
}

pub struct SoftwareAuthenticator {
    key_pair: EcdsaKeyPair,
    credential_id: Vec<u8>,
    origin: String,
}

impl SoftwareAuthenticator {
    pub fn new() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .expect("failed to generate test keypair");
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .expect("failed to load test keypair");

        let mut credential_id = vec![0u8; 32];
        rng.fill(&mut credential_id)
            .expect("failed to generate credential id");

        Self {
            key_pair,
            credential_id,
            origin: test_origin(),
        }
    }

    pub fn credential_id_b64(&self) -> String {
        b64url(&self.credential_id)
    }

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

    fn client_data(&self, type_: &str, challenge: &str) -> String {
        let json = serde_json::json!({
            "type": type_,
            "challenge": challenge,
            "origin": self.origin,
        });
        b64url(json.to_string().as_bytes())
    }

    fn rp_id_hash() -> Vec<u8> {
        ring::digest::digest(&ring::digest::SHA256, test_rp_id().as_bytes())
            .as_ref()
            .to_vec()
    }

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

    /// The JSON a browser would POST to the finish-registration endpoint.
    pub fn attestation_json(&self, challenge: &str) -> serde_json::Value {
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

        serde_json::json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": self.client_data("webauthn.create", challenge),
                "attestationObject": b64url(&attestation_bytes),
            },
        })
    }

    pub fn register_credential(&self, challenge: &str) -> RegisterCredential {
        serde_json::from_value(self.attestation_json(challenge))
            .expect("failed to build RegisterCredential")
    }

    /// The JSON a browser would POST to the finish-authentication endpoint:
    /// a correctly signed assertion for the given challenge and counter.
    pub fn assertion_json(&self, challenge: &str, counter: u32) -> serde_json::Value {
        let client_data = self.client_data("webauthn.get", challenge);

        let mut auth_data = Self::rp_id_hash();
        auth_data.push(0x01); // UP
        auth_data.extend_from_slice(&counter.to_be_bytes());

        let client_data_raw = URL_SAFE_NO_PAD
            .decode(&client_data)
            .expect("client data roundtrip");
        let client_data_hash = ring::digest::digest(&ring::digest::SHA256, &client_data_raw);

        let mut signed_data = auth_data.clone();
        signed_data.extend_from_slice(client_data_hash.as_ref());

        let rng = SystemRandom::new();
        let signature = self
            .key_pair
            .sign(&rng, &signed_data)
            .expect("failed to sign assertion");

        serde_json::json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data,
                "authenticatorData": b64url(&auth_data),
                "signature": b64url(signature.as_ref()),
                "userHandle": null,
            },
        })
    }

    pub fn assertion(&self, challenge: &str, counter: u32) -> AuthenticatorResponse {
        serde_json::from_value(self.assertion_json(challenge, counter))
            .expect("failed to build AuthenticatorResponse")
    }
}
