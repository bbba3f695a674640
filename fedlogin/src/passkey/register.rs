//! Registration ceremony: option building and response verification.

use std::time::SystemTime;

use super::challenge::{consume_challenge, get_challenge, put_challenge};
use super::cose::{COSE_ALG_ES256, COSE_ALG_RS256, CosePublicKey};
use super::storage::PasskeyStore;
use super::types::{
    AttestedCredentialData, AuthenticatorData, AuthenticatorSelection, ChallengeKind,
    CredentialDescriptor, CredentialSearchField, ParsedClientData, PendingChallenge,
    PubKeyCredParam, PublicKeyCredentialUserEntity, RegisterCredential, RegistrationOptions,
    RelyingParty, parse_attestation_object,
};

use crate::passkey::config::{
    PASSKEY_CHALLENGE_TIMEOUT, PASSKEY_RP_ID, PASSKEY_RP_NAME, PASSKEY_TIMEOUT,
    PASSKEY_USER_VERIFICATION,
};
use crate::passkey::errors::PasskeyError;
use crate::utils::{base64url_encode, gen_random_string};

/// Outcome of a verified registration response, ready to be persisted by
/// the caller.
#[derive(Debug)]
pub(crate) struct RegisteredPasskey {
    pub(crate) credential_id: String,
    pub(crate) public_key: String,
    pub(crate) counter: u32,
    pub(crate) user_handle: String,
}

/// Build registration options for `username` and store the pending
/// challenge, replacing any prior pending registration for this username.
///
/// The user handle is stable per user: it is reused from any credential the
/// user already registered, and generated fresh otherwise.
pub(crate) async fn start_registration(
    username: &str,
) -> Result<RegistrationOptions, PasskeyError> {
    if username.is_empty() {
        return Err(PasskeyError::Validation("Username is required".into()));
    }

    let existing_credentials =
        PasskeyStore::get_credentials_by(CredentialSearchField::Username(username.to_string()))
            .await?;

    let user_handle = match existing_credentials.first() {
        Some(credential) => credential.user_handle.clone(),
        None => gen_random_string(32)?,
    };

    // Prevent the same authenticator from registering twice for this user
    let exclude_credentials = existing_credentials
        .iter()
        .map(|credential| CredentialDescriptor {
            type_: "public-key".to_string(),
            id: credential.credential_id.clone(),
        })
        .collect();

    let challenge = gen_random_string(32)?;

    let pending = PendingChallenge {
        username: username.to_string(),
        user_handle: user_handle.clone(),
        challenge: challenge.clone(),
        created_at: SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        ttl: *PASSKEY_CHALLENGE_TIMEOUT as u64,
    };
    put_challenge(ChallengeKind::Registration, username, pending).await?;

    let options = RegistrationOptions {
        challenge,
        rp: RelyingParty {
            name: PASSKEY_RP_NAME.to_string(),
            id: PASSKEY_RP_ID.to_string(),
        },
        user: PublicKeyCredentialUserEntity {
            user_handle,
            name: username.to_string(),
            display_name: username.to_string(),
        },
        pub_key_cred_params: vec![
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: COSE_ALG_ES256 as i32,
            },
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: COSE_ALG_RS256 as i32,
            },
        ],
        exclude_credentials,
        authenticator_selection: AuthenticatorSelection {
            resident_key: "preferred".to_string(),
            user_verification: PASSKEY_USER_VERIFICATION.to_string(),
        },
        timeout: (*PASSKEY_TIMEOUT) * 1000, // Convert seconds to milliseconds
        attestation: "none".to_string(),
    };

    tracing::debug!("Registration options: {:?}", options);

    Ok(options)
}

/// Verify a registration response against the pending challenge.
///
/// All checks run against the stored challenge before it is consumed; a
/// verification failure leaves the challenge pending so nothing is
/// persisted and no state is lost. Consumption happens atomically once
/// verification has passed, so of two racing finish calls exactly one
/// returns the verified credential material.
pub(crate) async fn finish_registration(
    username: &str,
    reg_data: &RegisterCredential,
) -> Result<RegisteredPasskey, PasskeyError> {
    if username.is_empty() {
        return Err(PasskeyError::Validation("Username is required".into()));
    }

    let pending = get_challenge(ChallengeKind::Registration, username).await?;

    let client_data = ParsedClientData::from_base64(&reg_data.response.client_data_json)?;
    client_data.verify(&pending.challenge, "webauthn.create")?;

    let attestation = parse_attestation_object(&reg_data.response.attestation_object)?;
    tracing::debug!("Attestation format: {}", attestation.fmt);

    let auth_data = AuthenticatorData::parse(attestation.auth_data)?;
    auth_data.verify()?;

    let attested = AttestedCredentialData::parse(&auth_data)?;
    let credential_id = base64url_encode(&attested.credential_id);

    if credential_id != reg_data.id {
        tracing::warn!(
            "Credential id in response does not match attested credential data: {} != {}",
            reg_data.id,
            credential_id
        );
        return Err(PasskeyError::Attestation("Credential id mismatch".into()));
    }

    // Parse now so a malformed key is rejected before anything is stored
    CosePublicKey::parse(&attested.public_key)?;

    let pending = consume_challenge(ChallengeKind::Registration, username).await?;

    tracing::info!("Verified registration of credential {}", credential_id);

    Ok(RegisteredPasskey {
        credential_id,
        public_key: base64url_encode(&attested.public_key),
        counter: auth_data.counter,
        user_handle: pending.user_handle,
    })
}
