use chrono::{Duration, Utc};
use headers::Cookie;
use http::header::{COOKIE, HeaderMap};

use crate::session::config::{SESSION_COOKIE_MAX_AGE, SESSION_COOKIE_NAME};
use crate::session::errors::SessionError;
use crate::session::types::{SessionUser, StoredSession};
use crate::storage::GENERIC_CACHE_STORE;
use crate::userdb::UserStore;
use crate::utils::{gen_random_string, header_set_cookie};

const SESSION_CACHE_PREFIX: &str = "session";

/// Establish a session for a verified user and return the headers that set
/// the session cookie.
pub(crate) async fn create_session(
    user_id: &str,
    provider: &str,
) -> Result<HeaderMap, SessionError> {
    let session_id = gen_random_string(32)?;
    let max_age = *SESSION_COOKIE_MAX_AGE;
    let expires_at = Utc::now() + Duration::seconds(max_age as i64);

    let stored_session = StoredSession {
        user_id: user_id.to_string(),
        provider: provider.to_string(),
        expires_at,
        ttl: max_age,
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            SESSION_CACHE_PREFIX,
            &session_id,
            stored_session.into(),
            max_age as usize,
        )
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?;

    let mut headers = HeaderMap::new();
    header_set_cookie(
        &mut headers,
        SESSION_COOKIE_NAME.as_str(),
        &session_id,
        max_age as i64,
    )?;

    tracing::debug!("Established session for user {} via {}", user_id, provider);
    Ok(headers)
}

/// Retrieve the user bound to a session id, enforcing expiry at read time.
pub async fn get_user_from_session(session_id: &str) -> Result<SessionUser, SessionError> {
    let cached_session = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(SESSION_CACHE_PREFIX, session_id)
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?
        .ok_or(SessionError::NotAuthenticated)?;

    let stored_session: StoredSession = cached_session.try_into()?;

    if stored_session.expires_at < Utc::now() {
        tracing::debug!("Session expired at {}", stored_session.expires_at);
        GENERIC_CACHE_STORE
            .lock()
            .await
            .remove(SESSION_CACHE_PREFIX, session_id)
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        return Err(SessionError::NotAuthenticated);
    }

    let user = UserStore::get_user(&stored_session.user_id)
        .await
        .map_err(|_| SessionError::NotAuthenticated)?
        .ok_or(SessionError::NotAuthenticated)?;

    Ok(SessionUser::from_db_user(user, stored_session.provider))
}

/// Remove the session and expire the session cookie.
pub async fn prepare_logout_response(cookies: Cookie) -> Result<HeaderMap, SessionError> {
    let mut headers = HeaderMap::new();
    header_set_cookie(&mut headers, SESSION_COOKIE_NAME.as_str(), "", -86400)?;

    if let Some(session_id) = cookies.get(SESSION_COOKIE_NAME.as_str()) {
        GENERIC_CACHE_STORE
            .lock()
            .await
            .remove(SESSION_CACHE_PREFIX, session_id)
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?;
    }

    Ok(headers)
}

/// Extract the session id from a request's Cookie header, if present.
pub fn get_session_id_from_headers(headers: &HeaderMap) -> Result<Option<&str>, SessionError> {
    let Some(cookie_header) = headers.get(COOKIE) else {
        return Ok(None);
    };

    let cookie_str = cookie_header.to_str().map_err(|e| {
        tracing::debug!("Invalid cookie header: {}", e);
        SessionError::Header("Invalid cookie header".to_string())
    })?;

    let cookie_name = SESSION_COOKIE_NAME.as_str();

    let session_id = cookie_str.split(';').map(|s| s.trim()).find_map(|s| {
        let mut parts = s.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(k), Some(v)) if k == cookie_name => Some(v),
            _ => None,
        }
    });

    Ok(session_id)
}
