use chrono::{DateTime, Utc};
use ciborium::value::Value as CborValue;
use ring::digest;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::passkey::config::{ORIGIN, PASSKEY_RP_ID, PASSKEY_USER_VERIFICATION};
use crate::passkey::errors::PasskeyError;
use crate::storage::CacheData;
use crate::utils::base64url_decode;

/// User entity presented to the authenticator during registration.
///
/// The `id` field carries the user handle: an opaque identifier that is
/// stable per user and distinct from the human-readable username.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct PublicKeyCredentialUserEntity {
    #[serde(rename = "id")]
    pub user_handle: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Serialize, Debug)]
pub(super) struct RelyingParty {
    pub(super) name: String,
    pub(super) id: String,
}

#[derive(Serialize, Debug)]
pub(super) struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub(super) type_: String,
    pub(super) alg: i32,
}

/// Credential reference used in exclusion and allow lists, id base64url-encoded
#[derive(Serialize, Debug)]
pub(super) struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub(super) type_: String,
    pub(super) id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticatorSelection {
    pub(super) resident_key: String,
    pub(super) user_verification: String,
}

/// Options for initiating a WebAuthn registration ceremony.
///
/// Follows the WebAuthn specification format for
/// `navigator.credentials.create()` options. Binary fields (challenge, user
/// handle, excluded credential ids) are base64url-encoded for transport.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub(crate) challenge: String,
    pub(super) rp: RelyingParty,
    pub(super) user: PublicKeyCredentialUserEntity,
    pub(super) pub_key_cred_params: Vec<PubKeyCredParam>,
    pub(super) exclude_credentials: Vec<CredentialDescriptor>,
    pub(super) authenticator_selection: AuthenticatorSelection,
    pub(super) timeout: u32,
    pub(super) attestation: String,
}

/// Options for initiating a WebAuthn authentication ceremony.
///
/// Follows the WebAuthn specification format for
/// `navigator.credentials.get()` options.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub(crate) challenge: String,
    pub(super) timeout: u32,
    pub(super) rp_id: String,
    pub(super) allow_credentials: Vec<CredentialDescriptor>,
    pub(super) user_verification: String,
}

/// Credential creation response received from the browser after
/// `navigator.credentials.create()`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredential {
    pub(super) id: String,
    #[allow(unused)]
    pub(super) raw_id: String,
    #[serde(rename = "type")]
    #[allow(unused)]
    pub(super) type_: String,
    pub(super) response: AuthenticatorAttestationResponse,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub(super) client_data_json: String,
    pub(super) attestation_object: String,
}

/// Assertion response received from the browser after
/// `navigator.credentials.get()`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorResponse {
    pub(super) id: String,
    #[allow(unused)]
    pub(super) raw_id: String,
    #[serde(rename = "type")]
    #[allow(unused)]
    pub(super) type_: String,
    pub(super) response: AuthenticatorAssertionResponse,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub(super) client_data_json: String,
    pub(super) authenticator_data: String,
    pub(super) signature: String,
    pub(super) user_handle: Option<String>,
}

/// Client data payload decoded from `clientDataJSON`
#[derive(Debug)]
pub(super) struct ParsedClientData {
    pub(super) challenge: String,
    pub(super) origin: String,
    pub(super) type_: String,
    pub(super) raw_data: Vec<u8>,
}

impl ParsedClientData {
    pub(super) fn from_base64(client_data_json: &str) -> Result<Self, PasskeyError> {
        let raw_data = base64url_decode(client_data_json)
            .map_err(|e| PasskeyError::Validation(format!("Failed to decode client data: {e}")))?;

        let data_str = String::from_utf8(raw_data.clone())
            .map_err(|e| PasskeyError::Validation(format!("Client data is not valid UTF-8: {e}")))?;

        let data: serde_json::Value = serde_json::from_str(&data_str)
            .map_err(|e| PasskeyError::Validation(format!("Invalid client data JSON: {e}")))?;

        let challenge = data["challenge"]
            .as_str()
            .ok_or_else(|| PasskeyError::Validation("Missing challenge".into()))?
            .to_string();

        Ok(Self {
            challenge,
            origin: data["origin"]
                .as_str()
                .ok_or_else(|| PasskeyError::Validation("Missing origin".into()))?
                .to_string(),
            type_: data["type"]
                .as_str()
                .ok_or_else(|| PasskeyError::Validation("Missing type".into()))?
                .to_string(),
            raw_data,
        })
    }

    /// Verify ceremony type, challenge and origin against expectations.
    ///
    /// The challenge comparison is byte-exact and constant-time.
    pub(super) fn verify(
        &self,
        stored_challenge: &str,
        expected_type: &str,
    ) -> Result<(), PasskeyError> {
        if self.type_ != expected_type {
            tracing::warn!(
                "Ceremony type mismatch: expected {}, got {}",
                expected_type,
                self.type_
            );
            return Err(PasskeyError::CeremonyTypeMismatch(format!(
                "expected '{}', got '{}'",
                expected_type, self.type_
            )));
        }

        let challenge_ok: bool = self
            .challenge
            .as_bytes()
            .ct_eq(stored_challenge.as_bytes())
            .into();
        if !challenge_ok {
            tracing::warn!("Challenge in client data does not match the issued challenge");
            return Err(PasskeyError::ChallengeMismatch);
        }

        if self.origin != *ORIGIN {
            tracing::warn!("Origin mismatch: expected {}, got {}", *ORIGIN, self.origin);
            return Err(PasskeyError::OriginMismatch(format!(
                "expected '{}', got '{}'",
                *ORIGIN, self.origin
            )));
        }

        Ok(())
    }
}

/// Flags for AuthenticatorData as defined in WebAuthn spec Level 2
pub(super) mod auth_data_flags {
    /// User Present (UP) - Bit 0
    pub(crate) const UP: u8 = 1 << 0;
    /// User Verified (UV) - Bit 2
    pub(crate) const UV: u8 = 1 << 2;
    /// Attested Credential Data Present - Bit 6
    pub(crate) const AT: u8 = 1 << 6;
}

/// AuthenticatorData structure as defined in WebAuthn spec Level 2
/// https://www.w3.org/TR/webauthn-2/#sctn-authenticator-data
#[derive(Debug)]
pub(super) struct AuthenticatorData {
    /// SHA-256 hash of the RP ID (32 bytes)
    pub(super) rp_id_hash: Vec<u8>,

    /// Flags (1 byte)
    pub(super) flags: u8,

    /// Signature counter (4 bytes), 32-bit unsigned big-endian integer
    pub(super) counter: u32,

    /// Raw authenticator data, part of the signed message
    pub(super) raw_data: Vec<u8>,
}

impl AuthenticatorData {
    /// Parse raw authenticator data
    /// Format (minimum 37 bytes):
    /// - RP ID Hash (32 bytes)
    /// - Flags (1 byte)
    /// - Counter (4 bytes)
    /// - Optional: Attested Credential Data
    /// - Optional: Extensions
    pub(super) fn parse(data: Vec<u8>) -> Result<Self, PasskeyError> {
        if data.len() < 37 {
            return Err(PasskeyError::Attestation(
                "Authenticator data too short".into(),
            ));
        }

        Ok(Self {
            rp_id_hash: data[..32].to_vec(),
            flags: data[32],
            counter: u32::from_be_bytes([data[33], data[34], data[35], data[36]]),
            raw_data: data,
        })
    }

    pub(super) fn from_base64(auth_data: &str) -> Result<Self, PasskeyError> {
        let data = base64url_decode(auth_data).map_err(|e| {
            PasskeyError::Validation(format!("Failed to decode authenticator data: {e}"))
        })?;
        Self::parse(data)
    }

    /// Check if user was present during the ceremony
    pub(super) fn is_user_present(&self) -> bool {
        (self.flags & auth_data_flags::UP) != 0
    }

    /// Check if user was verified by the authenticator
    pub(super) fn is_user_verified(&self) -> bool {
        (self.flags & auth_data_flags::UV) != 0
    }

    /// Check if attested credential data is present
    pub(super) fn has_attested_credential_data(&self) -> bool {
        (self.flags & auth_data_flags::AT) != 0
    }

    /// Verify the RP-id hash and flag bits
    pub(super) fn verify(&self) -> Result<(), PasskeyError> {
        // Verify rpIdHash matches SHA-256 hash of rpId
        let expected_hash = digest::digest(&digest::SHA256, PASSKEY_RP_ID.as_bytes());
        if self.rp_id_hash != expected_hash.as_ref() {
            tracing::warn!("RP ID hash in authenticator data does not match configured RP ID");
            return Err(PasskeyError::Attestation("Invalid RP ID hash".into()));
        }

        if !self.is_user_present() {
            return Err(PasskeyError::Attestation("User not present".into()));
        }

        if *PASSKEY_USER_VERIFICATION == "required" && !self.is_user_verified() {
            return Err(PasskeyError::Attestation(format!(
                "User verification required but flag not set. Flags: {:02x}",
                self.flags
            )));
        }

        Ok(())
    }
}

/// Parsed attestation object from a registration response
#[derive(Debug)]
pub(super) struct AttestationObject {
    pub(super) fmt: String,
    pub(super) auth_data: Vec<u8>,
}

/// Parse the CBOR attestation object produced by the authenticator.
///
/// Only self-consistency is checked here; attestation trust chains
/// ("packed", "tpm", certificate validation) are not evaluated, matching a
/// "none"-attestation trust model.
pub(super) fn parse_attestation_object(
    attestation_base64: &str,
) -> Result<AttestationObject, PasskeyError> {
    let attestation_bytes = base64url_decode(attestation_base64).map_err(|e| {
        PasskeyError::Validation(format!("Failed to decode attestation object: {e}"))
    })?;

    let attestation_cbor: CborValue = ciborium::de::from_reader(&attestation_bytes[..])
        .map_err(|e| PasskeyError::Attestation(format!("Invalid attestation CBOR: {e}")))?;

    let CborValue::Map(map) = attestation_cbor else {
        return Err(PasskeyError::Attestation(
            "Attestation object is not a CBOR map".into(),
        ));
    };

    let mut fmt = None;
    let mut auth_data = None;

    for (key, value) in map {
        if let CborValue::Text(k) = key {
            match k.as_str() {
                "fmt" => {
                    if let CborValue::Text(f) = value {
                        fmt = Some(f);
                    }
                }
                "authData" => {
                    if let CborValue::Bytes(data) = value {
                        auth_data = Some(data);
                    }
                }
                _ => {}
            }
        }
    }

    match (fmt, auth_data) {
        (Some(fmt), Some(auth_data)) => Ok(AttestationObject { fmt, auth_data }),
        _ => Err(PasskeyError::Attestation(
            "Missing required attestation data".into(),
        )),
    }
}

/// Attested credential data extracted from registration authenticator data
#[derive(Debug)]
pub(super) struct AttestedCredentialData {
    pub(super) credential_id: Vec<u8>,
    /// COSE_Key structure, re-serialized to exactly one CBOR value
    pub(super) public_key: Vec<u8>,
}

impl AttestedCredentialData {
    /// Parse the attested credential data section of authenticator data:
    /// AAGUID (16) | credential id length (2, big-endian) | credential id | COSE key
    pub(super) fn parse(auth_data: &AuthenticatorData) -> Result<Self, PasskeyError> {
        if !auth_data.has_attested_credential_data() {
            return Err(PasskeyError::Attestation(
                "No attested credential data present".into(),
            ));
        }

        let data = &auth_data.raw_data;
        let mut pos = 37; // RP ID hash (32) + flags (1) + counter (4)

        if data.len() < pos + 18 {
            return Err(PasskeyError::Attestation(
                "Authenticator data too short for attested credential data".into(),
            ));
        }

        pos += 16; // AAGUID

        let cred_id_len = ((data[pos] as usize) << 8) | (data[pos + 1] as usize);
        pos += 2;

        if cred_id_len == 0 || cred_id_len > 1023 {
            return Err(PasskeyError::Attestation(
                "Invalid credential ID length".into(),
            ));
        }

        if data.len() < pos + cred_id_len {
            return Err(PasskeyError::Attestation(
                "Authenticator data too short for credential ID".into(),
            ));
        }

        let credential_id = data[pos..pos + cred_id_len].to_vec();
        pos += cred_id_len;

        // The COSE key may be followed by an extensions map; reading one CBOR
        // value and re-serializing it isolates exactly the key bytes.
        let key_value: CborValue = ciborium::de::from_reader(&data[pos..])
            .map_err(|e| PasskeyError::Attestation(format!("Invalid public key CBOR: {e}")))?;

        let mut public_key = Vec::new();
        ciborium::ser::into_writer(&key_value, &mut public_key)
            .map_err(|e| PasskeyError::Attestation(format!("Failed to encode public key: {e}")))?;

        Ok(Self {
            credential_id,
            public_key,
        })
    }
}

/// Which ceremony a pending challenge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChallengeKind {
    Registration,
    Authentication,
}

impl ChallengeKind {
    pub(super) fn cache_prefix(self) -> &'static str {
        match self {
            Self::Registration => "reg_challenge",
            Self::Authentication => "auth_challenge",
        }
    }
}

/// Short-lived per-username challenge state for an in-flight ceremony.
///
/// Cached under `(kind, username)`; issuing a new challenge overwrites any
/// prior one, so at most one is live per username and kind.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub(super) struct PendingChallenge {
    pub(super) username: String,
    pub(super) user_handle: String,
    pub(super) challenge: String,
    /// Unix timestamp (seconds) when the challenge was issued
    pub(super) created_at: u64,
    pub(super) ttl: u64,
}

impl PendingChallenge {
    pub(super) fn is_expired(&self, now: u64) -> bool {
        now > self.created_at + self.ttl
    }
}

impl From<PendingChallenge> for CacheData {
    fn from(data: PendingChallenge) -> Self {
        Self {
            value: serde_json::to_string(&data).expect("Failed to serialize PendingChallenge"),
        }
    }
}

impl TryFrom<CacheData> for PendingChallenge {
    type Error = PasskeyError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| PasskeyError::Storage(e.to_string()))
    }
}

/// Stored credential information for a registered passkey.
///
/// Contains everything needed to verify subsequent authentications with the
/// same credential: the COSE public key, the credential id and the sign
/// counter.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct StoredCredential {
    /// Credential ID, base64url-encoded
    pub credential_id: String,
    /// Owning user's database id
    pub user_id: String,
    /// WebAuthn user handle the credential was registered under
    pub user_handle: String,
    /// Username the credential was registered under
    pub username: String,
    /// COSE-encoded public key, base64url-encoded
    pub public_key: String,
    /// Sign counter; non-decreasing across successful authentications
    pub counter: u32,
    /// Set when a counter regression suggested the credential was cloned
    pub flagged: bool,
    /// When the credential was created
    pub created_at: DateTime<Utc>,
    /// When the credential was last updated
    pub updated_at: DateTime<Utc>,
}

/// Search field options for credential lookup
#[derive(Debug)]
pub(crate) enum CredentialSearchField {
    /// Search by credential ID
    CredentialId(String),
    /// Search by owning user's database id
    #[allow(dead_code)]
    UserId(String),
    /// Search by username
    Username(String),
}
