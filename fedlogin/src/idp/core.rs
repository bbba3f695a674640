use chrono::{Duration, Utc};
use headers::Cookie;
use http::header::HeaderMap;
use url::Url;

use super::config::{IDP_CSRF_COOKIE_NAME, IDP_ORIGIN, IDP_STATE_MAX_AGE};
use super::errors::IdpError;
use super::types::{AuthorizationArtifacts, Profile, Provider, StoredStateToken, TokenResponse};
use crate::storage::GENERIC_CACHE_STORE;
use crate::utils::{gen_random_string, header_set_cookie};

const STATE_CACHE_PREFIX: &str = "idp_state";

fn redirect_uri(provider: Provider) -> String {
    format!("{}/auth/{}/callback", IDP_ORIGIN.as_str(), provider.as_str())
}

/// Build the provider's authorization redirect URL.
///
/// A fresh state token is cached server-side and mirrored into a CSRF
/// cookie; the callback must present both.
pub async fn authorization_request(provider: Provider) -> Result<(String, HeaderMap), IdpError> {
    let state = gen_random_string(32)?;
    let max_age = *IDP_STATE_MAX_AGE;

    let stored = StoredStateToken {
        provider: provider.as_str().to_string(),
        expires_at: Utc::now() + Duration::seconds(max_age as i64),
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(STATE_CACHE_PREFIX, &state, stored.into(), max_age as usize)
        .await
        .map_err(|e| IdpError::Storage(e.to_string()))?;

    let mut auth_url = Url::parse(&provider.auth_url())
        .map_err(|e| IdpError::TokenExchange(format!("Invalid authorization URL: {e}")))?;
    auth_url
        .query_pairs_mut()
        .append_pair("client_id", provider.client_id())
        .append_pair("redirect_uri", &redirect_uri(provider))
        .append_pair("response_type", "code")
        .append_pair("scope", provider.scope())
        .append_pair("state", &state);

    let mut headers = HeaderMap::new();
    header_set_cookie(
        &mut headers,
        IDP_CSRF_COOKIE_NAME.as_str(),
        &state,
        max_age as i64,
    )?;

    tracing::debug!("Authorization redirect for {}: {}", provider.as_str(), auth_url);

    Ok((auth_url.into(), headers))
}

/// Exchange authorization artifacts for a verified profile.
///
/// Verifies the state round trip, trades the code for an access token and
/// fetches the provider's userinfo document.
pub async fn exchange_for_profile(
    provider: Provider,
    artifacts: &AuthorizationArtifacts,
    cookies: &Cookie,
) -> Result<Profile, IdpError> {
    verify_state(provider, &artifacts.state, cookies).await?;

    let access_token = exchange_code(provider, &artifacts.code).await?;
    let userinfo = fetch_userinfo(provider, &access_token).await?;

    let profile = provider.profile_from_userinfo(&userinfo)?;
    tracing::info!(
        "Exchanged authorization code with {} for subject {}",
        profile.provider,
        profile.provider_user_id
    );

    Ok(profile)
}

/// Consume the cached state token and require the CSRF cookie to match the
/// state parameter.
async fn verify_state(
    provider: Provider,
    state: &str,
    cookies: &Cookie,
) -> Result<(), IdpError> {
    let cached = GENERIC_CACHE_STORE
        .lock()
        .await
        .take(STATE_CACHE_PREFIX, state)
        .await
        .map_err(|e| IdpError::Storage(e.to_string()))?
        .ok_or_else(|| IdpError::State("unknown or already used state".to_string()))?;

    let stored: StoredStateToken = cached.try_into()?;

    if stored.expires_at < Utc::now() {
        return Err(IdpError::State("state token expired".to_string()));
    }

    if stored.provider != provider.as_str() {
        return Err(IdpError::State(format!(
            "state was issued for provider {}",
            stored.provider
        )));
    }

    let cookie_state = cookies
        .get(IDP_CSRF_COOKIE_NAME.as_str())
        .ok_or_else(|| IdpError::State("missing CSRF cookie".to_string()))?;
    if cookie_state != state {
        return Err(IdpError::State("CSRF cookie does not match state".to_string()));
    }

    Ok(())
}

async fn exchange_code(provider: Provider, code: &str) -> Result<String, IdpError> {
    let response = reqwest::Client::new()
        .post(provider.token_url())
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", provider.client_id()),
            ("client_secret", provider.client_secret()),
            ("redirect_uri", &redirect_uri(provider)),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            "Token endpoint of {} returned {}: {}",
            provider.as_str(),
            status,
            body
        );
        return Err(IdpError::TokenExchange(format!(
            "token endpoint returned {status}"
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| IdpError::TokenExchange(format!("invalid token response: {e}")))?;

    Ok(token.access_token)
}

async fn fetch_userinfo(
    provider: Provider,
    access_token: &str,
) -> Result<serde_json::Value, IdpError> {
    let response = reqwest::Client::new()
        .get(provider.userinfo_url())
        .bearer_auth(access_token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(IdpError::UserInfo(format!(
            "userinfo endpoint returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| IdpError::UserInfo(format!("invalid userinfo response: {e}")))
}
