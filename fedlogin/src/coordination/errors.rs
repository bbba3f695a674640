use thiserror::Error;

use crate::idp::IdpError;
use crate::passkey::PasskeyError;
use crate::session::SessionError;
use crate::userdb::UserError;
use crate::utils::UtilError;

/// Errors that can occur during authentication coordination
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// General coordination error
    #[error("Coordination error: {0}")]
    Coordination(String),

    /// Error from Passkey ceremony operations
    #[error("Passkey error: {0}")]
    Passkey(PasskeyError),

    /// Error from external identity provider operations
    #[error("Identity provider error: {0}")]
    Idp(IdpError),

    /// Error from the user database operations
    #[error("User error: {0}")]
    User(UserError),

    /// Error from session operations
    #[error("Session error: {0}")]
    Session(SessionError),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    Utils(UtilError),
}

// From implementations that log the underlying cause at conversion time so
// handlers can return a generic message without losing detail

impl From<PasskeyError> for CoordinationError {
    fn from(err: PasskeyError) -> Self {
        tracing::warn!("Passkey error: {}", err);
        Self::Passkey(err)
    }
}

impl From<IdpError> for CoordinationError {
    fn from(err: IdpError) -> Self {
        tracing::warn!("Identity provider error: {}", err);
        Self::Idp(err)
    }
}

impl From<UserError> for CoordinationError {
    fn from(err: UserError) -> Self {
        tracing::error!("User error: {}", err);
        Self::User(err)
    }
}

impl From<SessionError> for CoordinationError {
    fn from(err: SessionError) -> Self {
        tracing::error!("Session error: {}", err);
        Self::Session(err)
    }
}

impl From<UtilError> for CoordinationError {
    fn from(err: UtilError) -> Self {
        tracing::error!("Utils error: {}", err);
        Self::Utils(err)
    }
}
