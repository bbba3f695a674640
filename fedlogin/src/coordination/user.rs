use crate::coordination::errors::CoordinationError;
use crate::userdb::{User, UserStore};

/// Look up a user by username, provisioning the record if it does not
/// exist yet.
pub(super) async fn find_or_create_user(
    username: &str,
    display_name: &str,
    provider: Option<&str>,
) -> Result<User, CoordinationError> {
    if let Some(user) = UserStore::get_user_by_username(username).await? {
        return Ok(user);
    }

    let user = User::new(
        uuid::Uuid::new_v4().to_string(),
        username.to_string(),
        display_name.to_string(),
        provider.map(|p| p.to_string()),
    );

    tracing::info!("Creating user {} for username {}", user.id, username);
    Ok(UserStore::upsert_user(user).await?)
}
