use thiserror::Error;

/// Errors that can occur during user record operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Error accessing or modifying stored user data
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error when a requested user is not found
    #[error("User not found")]
    NotFound,
}
