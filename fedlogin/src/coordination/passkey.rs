use chrono::Utc;
use http::header::HeaderMap;

use super::errors::CoordinationError;
use super::user::find_or_create_user;
use crate::passkey::{
    self, AuthenticationOptions, AuthenticatorResponse, PasskeyStore, RegisterCredential,
    RegistrationOptions, StoredCredential,
};
use crate::session::create_session;
use crate::userdb::{User, UserStore};

/// Begin a registration ceremony: issue options and a pending challenge.
pub async fn handle_start_registration_core(
    username: &str,
) -> Result<RegistrationOptions, CoordinationError> {
    Ok(passkey::start_registration(username).await?)
}

/// Finish a registration ceremony.
///
/// The ceremony engine performs every verification step and consumes the
/// challenge; only then is the user provisioned and the credential
/// persisted, so no partial credential survives a failed ceremony.
pub async fn handle_finish_registration_core(
    username: &str,
    reg_data: &RegisterCredential,
) -> Result<(), CoordinationError> {
    let registered = passkey::finish_registration(username, reg_data).await?;

    let user = find_or_create_user(username, username, None).await?;

    let now = Utc::now();
    PasskeyStore::store_credential(StoredCredential {
        credential_id: registered.credential_id,
        user_id: user.id,
        user_handle: registered.user_handle,
        username: username.to_string(),
        public_key: registered.public_key,
        counter: registered.counter,
        flagged: false,
        created_at: now,
        updated_at: now,
    })
    .await?;

    Ok(())
}

/// Begin an authentication ceremony for a user with registered credentials.
pub async fn handle_start_authentication_core(
    username: &str,
) -> Result<AuthenticationOptions, CoordinationError> {
    Ok(passkey::start_authentication(username).await?)
}

/// Finish an authentication ceremony and establish a session for the
/// credential's owner.
pub async fn handle_finish_authentication_core(
    username: &str,
    auth_response: &AuthenticatorResponse,
) -> Result<(User, HeaderMap), CoordinationError> {
    let credential = passkey::finish_authentication(username, auth_response).await?;

    let user = UserStore::get_user(&credential.user_id)
        .await?
        .ok_or_else(|| {
            CoordinationError::Coordination(format!(
                "Credential {} references missing user {}",
                credential.credential_id, credential.user_id
            ))
        })?;

    let headers = create_session(&user.id, "passkey").await?;

    Ok((user, headers))
}
