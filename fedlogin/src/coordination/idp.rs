use headers::Cookie;
use http::header::HeaderMap;

use super::errors::CoordinationError;
use super::user::find_or_create_user;
use crate::idp::{self, AuthorizationArtifacts, Provider};
use crate::session::create_session;
use crate::userdb::User;

/// Complete an external-IdP login: exchange the authorization artifacts for
/// a profile, provision the user on first login and establish a session.
pub async fn handle_idp_callback_core(
    provider: Provider,
    artifacts: &AuthorizationArtifacts,
    cookies: &Cookie,
) -> Result<(User, HeaderMap), CoordinationError> {
    let profile = idp::exchange_for_profile(provider, artifacts, cookies).await?;

    // Usernames of IdP-created users are namespaced by provider so they can
    // never collide with passkey-registered usernames
    let username = format!("{}_{}", profile.provider, profile.provider_user_id);

    let user = find_or_create_user(&username, &profile.display_name, Some(&profile.provider))
        .await?;

    let headers = create_session(&user.id, &profile.provider).await?;

    Ok((user, headers))
}
