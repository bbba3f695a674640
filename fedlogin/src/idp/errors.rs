use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur while delegating to an external identity provider.
#[derive(Debug, Error)]
pub enum IdpError {
    /// Unknown or unconfigured provider
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// State parameter or CSRF cookie did not survive the round trip
    #[error("State verification failed: {0}")]
    State(String),

    /// Authorization-code exchange with the provider failed
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Fetching or parsing the provider's user profile failed
    #[error("Userinfo fetch failed: {0}")]
    UserInfo(String),

    /// Error accessing state storage
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),

    /// Error from the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
