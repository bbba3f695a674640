use std::str::FromStr;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect};
use headers::{Cookie, HeaderMapExt};

use fedlogin::{AuthorizationArtifacts, Provider, authorization_request, handle_idp_callback_core};

/// Redirect the browser to the provider's authorization endpoint.
pub(crate) async fn login(Path(provider): Path<String>) -> impl IntoResponse {
    let Ok(provider) = Provider::from_str(&provider) else {
        return (StatusCode::NOT_FOUND, "Unknown provider").into_response();
    };

    match authorization_request(provider).await {
        Ok((url, headers)) => (headers, Redirect::to(&url)).into_response(),
        Err(e) => {
            tracing::error!("Failed to build authorization request: {}", e);
            Redirect::to("/auth-failure").into_response()
        }
    }
}

/// Provider callback: exchange the code for a profile and establish a
/// session. Any failure redirects to the failure page, mirroring the
/// generic-message policy of the JSON endpoints.
pub(crate) async fn callback(
    Path(provider): Path<String>,
    Query(artifacts): Query<AuthorizationArtifacts>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Ok(provider) = Provider::from_str(&provider) else {
        return (StatusCode::NOT_FOUND, "Unknown provider").into_response();
    };

    let Some(cookies) = headers.typed_get::<Cookie>() else {
        tracing::warn!("Callback without cookies for {}", provider.as_str());
        return Redirect::to("/auth-failure").into_response();
    };

    match handle_idp_callback_core(provider, &artifacts, &cookies).await {
        Ok((user, session_headers)) => {
            tracing::info!("User {} logged in via {}", user.id, provider.as_str());
            (session_headers, Redirect::to("/")).into_response()
        }
        Err(e) => {
            tracing::warn!("IdP callback failed: {}", e);
            Redirect::to("/auth-failure").into_response()
        }
    }
}
