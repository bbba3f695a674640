//! Authentication ceremony: option building, assertion verification and
//! sign-counter policy.

use std::time::SystemTime;

use ring::digest;

use super::challenge::{consume_challenge, get_challenge, put_challenge};
use super::cose::CosePublicKey;
use super::storage::PasskeyStore;
use super::types::{
    AuthenticationOptions, AuthenticatorData, AuthenticatorResponse, ChallengeKind,
    CredentialDescriptor, CredentialSearchField, ParsedClientData, PendingChallenge,
    StoredCredential,
};

use crate::passkey::config::{
    PASSKEY_CHALLENGE_TIMEOUT, PASSKEY_RP_ID, PASSKEY_TIMEOUT, PASSKEY_USER_VERIFICATION,
};
use crate::passkey::errors::PasskeyError;
use crate::utils::{base64url_decode, gen_random_string};

/// Build authentication options for `username` and store the pending
/// challenge, replacing any prior pending authentication for this username.
///
/// The username must resolve to at least one registered credential. This
/// deliberately distinguishes unknown users from verification failures; see
/// DESIGN.md for the enumeration trade-off.
pub(crate) async fn start_authentication(
    username: &str,
) -> Result<AuthenticationOptions, PasskeyError> {
    if username.is_empty() {
        return Err(PasskeyError::Validation("Username is required".into()));
    }

    let credentials =
        PasskeyStore::get_credentials_by(CredentialSearchField::Username(username.to_string()))
            .await?;

    if credentials.is_empty() {
        tracing::debug!("No credentials registered for username {}", username);
        return Err(PasskeyError::UnknownUser);
    }

    let allow_credentials = credentials
        .iter()
        .map(|credential| CredentialDescriptor {
            type_: "public-key".to_string(),
            id: credential.credential_id.clone(),
        })
        .collect();

    let challenge = gen_random_string(32)?;

    let pending = PendingChallenge {
        username: username.to_string(),
        user_handle: credentials[0].user_handle.clone(),
        challenge: challenge.clone(),
        created_at: SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        ttl: *PASSKEY_CHALLENGE_TIMEOUT as u64,
    };
    put_challenge(ChallengeKind::Authentication, username, pending).await?;

    let options = AuthenticationOptions {
        challenge,
        timeout: (*PASSKEY_TIMEOUT) * 1000, // Convert seconds to milliseconds
        rp_id: PASSKEY_RP_ID.to_string(),
        allow_credentials,
        user_verification: PASSKEY_USER_VERIFICATION.to_string(),
    };

    tracing::debug!("Authentication options: {:?}", options);

    Ok(options)
}

/// Verify an assertion against the pending challenge and the stored
/// credential, enforce the sign-counter policy, and consume the challenge.
///
/// Returns the stored credential (after its counter update) so the caller
/// can establish a session for the owning user.
pub(crate) async fn finish_authentication(
    username: &str,
    auth_response: &AuthenticatorResponse,
) -> Result<StoredCredential, PasskeyError> {
    if username.is_empty() {
        return Err(PasskeyError::Validation("Username is required".into()));
    }

    let pending = get_challenge(ChallengeKind::Authentication, username).await?;

    let client_data = ParsedClientData::from_base64(&auth_response.response.client_data_json)?;
    client_data.verify(&pending.challenge, "webauthn.get")?;

    let auth_data = AuthenticatorData::from_base64(&auth_response.response.authenticator_data)?;
    auth_data.verify()?;

    let stored_credential = PasskeyStore::get_credential(&auth_response.id)
        .await?
        .filter(|credential| credential.username == username)
        .ok_or_else(|| {
            tracing::warn!(
                "Credential {} is not registered to username {}",
                auth_response.id,
                username
            );
            PasskeyError::UnknownCredential
        })?;

    // Discoverable credentials return the user handle; when present it must
    // match the one the credential was registered under
    if let Some(handle) = &auth_response.response.user_handle
        && handle != &stored_credential.user_handle
    {
        tracing::warn!("User handle in assertion does not match stored credential");
        return Err(PasskeyError::UnknownCredential);
    }

    verify_signature(auth_response, &client_data, &auth_data, &stored_credential)?;

    check_counter(&auth_data, &stored_credential).await?;

    // Consume only after every verification has passed; the loser of a race
    // between two finish calls fails here with NoPendingChallenge
    consume_challenge(ChallengeKind::Authentication, username).await?;

    update_counter(&auth_data, stored_credential).await
}

/// Verify the assertion signature over `authenticatorData || SHA-256(clientDataJSON)`
/// using the credential's stored public key.
fn verify_signature(
    auth_response: &AuthenticatorResponse,
    client_data: &ParsedClientData,
    auth_data: &AuthenticatorData,
    stored_credential: &StoredCredential,
) -> Result<(), PasskeyError> {
    let public_key = base64url_decode(&stored_credential.public_key)
        .map_err(|e| PasskeyError::Storage(format!("Invalid stored public key: {e}")))?;
    let cose_key = CosePublicKey::parse(&public_key)?;

    let signature = base64url_decode(&auth_response.response.signature)
        .map_err(|e| PasskeyError::Validation(format!("Invalid signature encoding: {e}")))?;

    let client_data_hash = digest::digest(&digest::SHA256, &client_data.raw_data);
    let mut signed_data =
        Vec::with_capacity(auth_data.raw_data.len() + client_data_hash.as_ref().len());
    signed_data.extend_from_slice(&auth_data.raw_data);
    signed_data.extend_from_slice(client_data_hash.as_ref());

    cose_key
        .verify_signature(&signed_data, &signature)
        .inspect_err(|_| {
            tracing::warn!(
                "Signature verification failed for credential {}",
                stored_credential.credential_id
            );
        })
}

/// Reject assertions whose sign counter did not advance.
///
/// A counter of zero means the authenticator does not support counters and
/// the check is skipped. A nonzero counter that is not strictly greater
/// than the stored value indicates a possible cloned authenticator: the
/// credential is flagged for manual review and authentication fails.
async fn check_counter(
    auth_data: &AuthenticatorData,
    stored_credential: &StoredCredential,
) -> Result<(), PasskeyError> {
    let presented = auth_data.counter;
    let stored = stored_credential.counter;

    if presented == 0 {
        tracing::debug!("Authenticator does not support counters");
        return Ok(());
    }

    if presented <= stored {
        tracing::warn!(
            "Counter regression for credential {}: stored {}, presented {}",
            stored_credential.credential_id,
            stored,
            presented
        );
        PasskeyStore::flag_credential(&stored_credential.credential_id).await?;
        return Err(PasskeyError::CloneDetected(format!(
            "stored counter {stored}, presented {presented}"
        )));
    }

    Ok(())
}

/// Apply the counter update with a compare-and-set so a concurrent
/// authentication cannot slip past a stale counter check.
async fn update_counter(
    auth_data: &AuthenticatorData,
    mut stored_credential: StoredCredential,
) -> Result<StoredCredential, PasskeyError> {
    let presented = auth_data.counter;

    if presented == 0 {
        return Ok(stored_credential);
    }

    let applied = PasskeyStore::update_credential_counter(
        &stored_credential.credential_id,
        presented,
        stored_credential.counter,
    )
    .await?;

    if !applied {
        tracing::warn!(
            "Concurrent counter update detected for credential {}",
            stored_credential.credential_id
        );
        PasskeyStore::flag_credential(&stored_credential.credential_id).await?;
        return Err(PasskeyError::CloneDetected(
            "counter changed during verification".to_string(),
        ));
    }

    stored_credential.counter = presented;
    Ok(stored_credential)
}
