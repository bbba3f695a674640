//! WebAuthn ceremony engine: registration and authentication option
//! building, response verification, challenge lifecycle and credential
//! storage.

mod auth;
mod challenge;
pub(crate) mod config;
mod cose;
mod errors;
mod register;
mod storage;
mod types;

pub use errors::PasskeyError;
pub use types::{
    AuthenticationOptions, AuthenticatorResponse, RegisterCredential, RegistrationOptions,
    StoredCredential,
};

pub(crate) use auth::{finish_authentication, start_authentication};
pub(crate) use register::{RegisteredPasskey, finish_registration, start_registration};
pub(crate) use storage::PasskeyStore;
pub(crate) use types::CredentialSearchField;

pub(crate) async fn init() -> Result<(), PasskeyError> {
    PasskeyStore::init().await
}
