use axum::Router;
use axum::routing::{get, post};

mod error;
mod oauth2;
mod pages;
mod passkey;
mod server;

fn app() -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/logout", get(pages::logout))
        .route("/auth-failure", get(pages::auth_failure))
        .route("/auth/{provider}", get(oauth2::login))
        .route("/auth/{provider}/callback", get(oauth2::callback))
        .route("/webauthn/register-options", post(passkey::register_options))
        .route("/webauthn/register", post(passkey::register_finish))
        .route("/webauthn/login-options", post(passkey::login_options))
        .route("/webauthn/login", post(passkey::login_finish))
        .route("/webauthn.js", get(passkey::serve_webauthn_js))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    server::init_tracing("demo_web");

    fedlogin::init().await.expect("Failed to initialize stores");

    let port: u16 = std::env::var("PORT")
        .map(|v| v.parse().unwrap_or(5000))
        .unwrap_or(5000);

    server::serve_http(port, app()).await;
}
