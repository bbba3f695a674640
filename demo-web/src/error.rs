//! Mapping from coordination errors to HTTP responses.
//!
//! Verification failures carry a generic user-facing message; the precise
//! cause is logged where the error originates and never leaks to clients.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use fedlogin::{CoordinationError, PasskeyError};

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

pub(crate) type ErrorResponse = (StatusCode, Json<ErrorBody>);

pub(crate) fn error_response(err: CoordinationError) -> ErrorResponse {
    let (status, message) = match &err {
        CoordinationError::Passkey(passkey_err) => match passkey_err {
            PasskeyError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PasskeyError::UnknownUser => (StatusCode::NOT_FOUND, "Unknown user".to_string()),
            PasskeyError::NoPendingChallenge(_) => (
                StatusCode::BAD_REQUEST,
                "Ceremony expired or already completed, please retry".to_string(),
            ),
            PasskeyError::UnknownCredential
            | PasskeyError::SignatureInvalid
            | PasskeyError::CloneDetected(_) => {
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
            }
            PasskeyError::ChallengeMismatch
            | PasskeyError::OriginMismatch(_)
            | PasskeyError::CeremonyTypeMismatch(_)
            | PasskeyError::Attestation(_)
            | PasskeyError::DuplicateCredential => {
                (StatusCode::BAD_REQUEST, "Verification failed".to_string())
            }
            PasskeyError::Storage(_) | PasskeyError::Utils(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            ),
        },
        CoordinationError::Idp(_) => (
            StatusCode::BAD_REQUEST,
            "External login failed".to_string(),
        ),
        CoordinationError::Session(_) => {
            (StatusCode::UNAUTHORIZED, "Not authenticated".to_string())
        }
        CoordinationError::Coordination(_)
        | CoordinationError::User(_)
        | CoordinationError::Utils(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        ),
    };

    (status, Json(ErrorBody { error: message }))
}
