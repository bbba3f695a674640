//! Pending-challenge lifecycle: Empty -> Pending -> Consumed | Expired.
//!
//! Challenges live in the generic cache keyed by `(kind, username)`. Expiry
//! is enforced at read time rather than by a sweeper; consumption is an
//! atomic take so that two racing finish calls can never both observe the
//! same pending challenge.

use std::time::SystemTime;

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{ChallengeKind, PendingChallenge};
use crate::storage::GENERIC_CACHE_STORE;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Store a pending challenge, overwriting any prior one for the same
/// username and kind (last write wins).
pub(super) async fn put_challenge(
    kind: ChallengeKind,
    username: &str,
    challenge: PendingChallenge,
) -> Result<(), PasskeyError> {
    let ttl = challenge.ttl as usize;
    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(kind.cache_prefix(), username, challenge.into(), ttl)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    tracing::debug!("Stored pending {:?} challenge for {}", kind, username);
    Ok(())
}

/// Read the pending challenge without consuming it.
///
/// Fails with `NoPendingChallenge` when no challenge was issued or the
/// stored one has expired; an expired entry is reclaimed on the spot.
pub(super) async fn get_challenge(
    kind: ChallengeKind,
    username: &str,
) -> Result<PendingChallenge, PasskeyError> {
    let cached = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(kind.cache_prefix(), username)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?
        .ok_or_else(|| PasskeyError::NoPendingChallenge("challenge not found".to_string()))?;

    let challenge: PendingChallenge = cached.try_into()?;

    if challenge.is_expired(now_secs()) {
        tracing::warn!(
            "Pending {:?} challenge for {} expired after {} seconds",
            kind,
            username,
            challenge.ttl
        );
        GENERIC_CACHE_STORE
            .lock()
            .await
            .remove(kind.cache_prefix(), username)
            .await
            .map_err(|e| PasskeyError::Storage(e.to_string()))?;
        return Err(PasskeyError::NoPendingChallenge(
            "challenge expired".to_string(),
        ));
    }

    Ok(challenge)
}

/// Atomically consume the pending challenge.
///
/// Exactly one of any set of concurrent callers gets the challenge; the
/// rest fail with `NoPendingChallenge`.
pub(super) async fn consume_challenge(
    kind: ChallengeKind,
    username: &str,
) -> Result<PendingChallenge, PasskeyError> {
    let cached = GENERIC_CACHE_STORE
        .lock()
        .await
        .take(kind.cache_prefix(), username)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?
        .ok_or_else(|| PasskeyError::NoPendingChallenge("challenge already consumed".to_string()))?;

    let challenge: PendingChallenge = cached.try_into()?;

    if challenge.is_expired(now_secs()) {
        return Err(PasskeyError::NoPendingChallenge(
            "challenge expired".to_string(),
        ));
    }

    tracing::debug!("Consumed pending {:?} challenge for {}", kind, username);
    Ok(challenge)
}
