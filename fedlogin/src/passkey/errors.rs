use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur during WebAuthn/Passkey ceremony operations.
///
/// Verification failures are deliberately distinguishable so callers can log
/// the precise cause while presenting a generic message to the client.
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// Malformed input: missing username, undecodable payload fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// No live pending challenge for this username and ceremony kind
    /// (never issued, expired, or already consumed)
    #[error("No pending challenge: {0}")]
    NoPendingChallenge(String),

    /// The challenge embedded in the client data does not match the issued one
    #[error("Challenge mismatch")]
    ChallengeMismatch,

    /// The origin declared in the client data is not the configured relying-party origin
    #[error("Origin mismatch: {0}")]
    OriginMismatch(String),

    /// The ceremony type in the client data is not the expected one
    #[error("Ceremony type mismatch: {0}")]
    CeremonyTypeMismatch(String),

    /// Attestation object or authenticator data failed to parse or is
    /// inconsistent with the relying party (bad CBOR, short data, RP-id
    /// hash mismatch, missing attested credential data)
    #[error("Attestation error: {0}")]
    Attestation(String),

    /// Cryptographic assertion signature verification failed
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Sign counter did not advance: the credential may have been cloned
    #[error("Possible credential cloning detected: {0}")]
    CloneDetected(String),

    /// Username does not resolve to a user with registered credentials
    #[error("Unknown user")]
    UnknownUser,

    /// The presented credential id is not registered to this user
    #[error("Unknown credential")]
    UnknownCredential,

    /// A credential with this id is already registered
    #[error("Credential already registered")]
    DuplicateCredential,

    /// Error accessing or modifying stored credential data
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
