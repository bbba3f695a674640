use axum::Json;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::response::Response;
use serde::Deserialize;

use fedlogin::{
    AuthenticationOptions, AuthenticatorResponse, RegisterCredential, RegistrationOptions,
    handle_finish_authentication_core, handle_finish_registration_core,
    handle_start_authentication_core, handle_start_registration_core,
};

use crate::error::{ErrorResponse, error_response};

#[derive(Deserialize)]
pub(crate) struct CeremonyStartRequest {
    username: String,
}

#[derive(Deserialize)]
pub(crate) struct RegistrationFinishRequest {
    username: String,
    credential: RegisterCredential,
}

#[derive(Deserialize)]
pub(crate) struct AuthenticationFinishRequest {
    username: String,
    credential: AuthenticatorResponse,
}

pub(crate) async fn register_options(
    Json(request): Json<CeremonyStartRequest>,
) -> Result<Json<RegistrationOptions>, ErrorResponse> {
    let options = handle_start_registration_core(&request.username)
        .await
        .map_err(error_response)?;

    Ok(Json(options))
}

pub(crate) async fn register_finish(
    Json(request): Json<RegistrationFinishRequest>,
) -> Result<StatusCode, ErrorResponse> {
    handle_finish_registration_core(&request.username, &request.credential)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::OK)
}

pub(crate) async fn login_options(
    Json(request): Json<CeremonyStartRequest>,
) -> Result<Json<AuthenticationOptions>, ErrorResponse> {
    let options = handle_start_authentication_core(&request.username)
        .await
        .map_err(error_response)?;

    Ok(Json(options))
}

pub(crate) async fn login_finish(
    Json(request): Json<AuthenticationFinishRequest>,
) -> Result<(HeaderMap, StatusCode), ErrorResponse> {
    let (user, headers) =
        handle_finish_authentication_core(&request.username, &request.credential)
            .await
            .map_err(error_response)?;

    tracing::info!("User {} logged in via passkey", user.id);
    Ok((headers, StatusCode::OK))
}

pub(crate) async fn serve_webauthn_js() -> Response {
    let js_content = include_str!("../static/webauthn.js");
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/javascript")
        .body(js_content.to_string().into())
        .unwrap_or_default()
}
