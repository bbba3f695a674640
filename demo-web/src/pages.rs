use askama::Template;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect};
use headers::{Cookie, HeaderMapExt};

use fedlogin::{SessionUser, get_session_id_from_headers, get_user_from_session,
    prepare_logout_response};

#[derive(Template)]
#[template(path = "index.j2")]
struct IndexTemplate {
    logged_in: bool,
    display_name: String,
    provider: String,
}

async fn current_user(headers: &HeaderMap) -> Option<SessionUser> {
    let session_id = get_session_id_from_headers(headers).ok().flatten()?;
    get_user_from_session(session_id).await.ok()
}

/// Status page: who is logged in, and with which provider
pub(crate) async fn index(headers: HeaderMap) -> impl IntoResponse {
    let user = current_user(&headers).await;

    let template = match user {
        Some(user) => IndexTemplate {
            logged_in: true,
            display_name: user.display_name,
            provider: user.provider,
        },
        None => IndexTemplate {
            logged_in: false,
            display_name: String::new(),
            provider: String::new(),
        },
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render status page: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) async fn logout(headers: HeaderMap) -> impl IntoResponse {
    let Some(cookies) = headers.typed_get::<Cookie>() else {
        return Redirect::to("/").into_response();
    };

    match prepare_logout_response(cookies).await {
        Ok(response_headers) => (response_headers, Redirect::to("/")).into_response(),
        Err(e) => {
            tracing::error!("Logout failed: {}", e);
            Redirect::to("/").into_response()
        }
    }
}

pub(crate) async fn auth_failure() -> Html<&'static str> {
    Html(
        r#"<h2>Authentication Failed</h2>
<p>We were unable to log you in. Please try again or contact support.</p>
<a href="/">Back to Home</a>"#,
    )
}
