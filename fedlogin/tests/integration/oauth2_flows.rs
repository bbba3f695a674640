//! Authorization-redirect construction for the external identity
//! providers. The code-for-token exchange itself needs a live provider and
//! is covered against the state machinery in the crate's unit tests.

use std::collections::HashMap;
use std::str::FromStr;

use serial_test::serial;
use url::Url;

use fedlogin::{IdpError, Provider, authorization_request};

use crate::common::init_test_environment;

#[tokio::test]
#[serial]
async fn test_google_authorization_redirect() {
    init_test_environment().await;

    let (redirect, headers) = authorization_request(Provider::Google).await.unwrap();
    let url = Url::parse(&redirect).unwrap();
    assert_eq!(url.host_str(), Some("accounts.google.com"));

    let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
    assert!(
        pairs
            .get("redirect_uri")
            .unwrap()
            .ends_with("/auth/google/callback")
    );

    // The state parameter is mirrored into the CSRF cookie
    let cookie = headers
        .get(http::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    let state = pairs.get("state").unwrap();
    assert!(cookie.contains(state.as_str()));
}

#[tokio::test]
#[serial]
async fn test_each_provider_has_distinct_endpoints() {
    init_test_environment().await;

    let (google, _) = authorization_request(Provider::Google).await.unwrap();
    let (facebook, _) = authorization_request(Provider::Facebook).await.unwrap();

    assert_ne!(
        Url::parse(&google).unwrap().host_str(),
        Url::parse(&facebook).unwrap().host_str()
    );
}

#[test]
fn test_unknown_provider_is_rejected() {
    let result = Provider::from_str("github");
    assert!(matches!(result, Err(IdpError::UnknownProvider(_))));
}
