use std::{env, sync::LazyLock};

pub(super) static IDP_ORIGIN: LazyLock<String> =
    LazyLock::new(|| env::var("ORIGIN").expect("ORIGIN must be set"));

pub(super) static GOOGLE_CLIENT_ID: LazyLock<String> =
    LazyLock::new(|| env::var("GOOGLE_CLIENT_ID").unwrap_or_default());

pub(super) static GOOGLE_CLIENT_SECRET: LazyLock<String> =
    LazyLock::new(|| env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default());

pub(super) static FACEBOOK_CLIENT_ID: LazyLock<String> =
    LazyLock::new(|| env::var("FACEBOOK_CLIENT_ID").unwrap_or_default());

pub(super) static FACEBOOK_CLIENT_SECRET: LazyLock<String> =
    LazyLock::new(|| env::var("FACEBOOK_CLIENT_SECRET").unwrap_or_default());

pub(super) static OKTA_CLIENT_ID: LazyLock<String> =
    LazyLock::new(|| env::var("OKTA_CLIENT_ID").unwrap_or_default());

pub(super) static OKTA_CLIENT_SECRET: LazyLock<String> =
    LazyLock::new(|| env::var("OKTA_CLIENT_SECRET").unwrap_or_default());

/// Okta OAuth2 issuer, e.g. `https://dev-xxxx.okta.com/oauth2/default`
pub(super) static OKTA_ISSUER: LazyLock<String> =
    LazyLock::new(|| env::var("OKTA_ISSUER").unwrap_or_default());

pub(crate) static IDP_CSRF_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("IDP_CSRF_COOKIE_NAME").unwrap_or_else(|_| "idp_csrf".to_string())
});

/// Lifetime of the state token between redirect and callback, in seconds
pub(super) static IDP_STATE_MAX_AGE: LazyLock<u64> = LazyLock::new(|| {
    env::var("IDP_STATE_MAX_AGE")
        .map(|v| v.parse::<u64>().unwrap_or(600))
        .unwrap_or(600)
});
