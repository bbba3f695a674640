use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No valid session exists for the request
    #[error("Session not found or expired")]
    NotAuthenticated,

    /// Error accessing session storage
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed request headers
    #[error("Header error: {0}")]
    Header(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
