//! fedlogin - Federated login core for the demo web application
//!
//! This crate provides the WebAuthn ceremony engine, the external identity
//! provider capability, and the user/session plumbing shared by the web
//! layer.

mod coordination;
mod idp;
mod passkey;
mod session;
mod storage;
mod userdb;
mod utils;

#[cfg(test)]
mod test_utils;

// Re-export the coordination entry points used by request handlers
pub use coordination::{
    CoordinationError, handle_finish_authentication_core, handle_finish_registration_core,
    handle_idp_callback_core, handle_start_authentication_core, handle_start_registration_core,
};

pub use idp::{AuthorizationArtifacts, IdpError, Profile, Provider, authorization_request};

pub use passkey::{
    AuthenticationOptions, AuthenticatorResponse, PasskeyError, RegisterCredential,
    RegistrationOptions, StoredCredential,
};

pub use session::{
    SESSION_COOKIE_NAME, SessionError, SessionUser, get_session_id_from_headers,
    get_user_from_session, prepare_logout_response,
};

pub use userdb::{User, UserError};

/// Initialize the underlying stores
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    userdb::init().await?;
    passkey::init().await?;
    Ok(())
}
