//! Session lifecycle around a passkey login: cookie issuance, lookup and
//! logout, driven through the same public surface the web handlers use.

use headers::HeaderMapExt;
use http::header::{COOKIE, HeaderMap, SET_COOKIE};
use serial_test::serial;

use fedlogin::{
    SESSION_COOKIE_NAME, handle_finish_authentication_core, handle_finish_registration_core,
    handle_start_authentication_core, handle_start_registration_core,
    get_session_id_from_headers, get_user_from_session, prepare_logout_response,
};

use crate::common::{SoftwareAuthenticator, challenge_of, init_test_environment};

fn session_id_from(headers: &HeaderMap) -> String {
    let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    let (name_value, _) = cookie.split_once(';').unwrap();
    let (name, value) = name_value.split_once('=').unwrap();
    assert_eq!(name, SESSION_COOKIE_NAME.as_str());
    value.to_string()
}

async fn login(username: &str) -> HeaderMap {
    let options = handle_start_registration_core(username).await.unwrap();
    let authenticator = SoftwareAuthenticator::new();
    let response = authenticator.register_credential(&challenge_of(&options));
    handle_finish_registration_core(username, &response)
        .await
        .unwrap();

    let options = handle_start_authentication_core(username).await.unwrap();
    let assertion = authenticator.assertion(&challenge_of(&options), 1);
    let (_, headers) = handle_finish_authentication_core(username, &assertion)
        .await
        .unwrap();
    headers
}

#[tokio::test]
#[serial]
async fn test_passkey_login_establishes_readable_session() {
    init_test_environment().await;

    let headers = login("sess_ivy").await;
    let session_id = session_id_from(&headers);

    let user = get_user_from_session(&session_id).await.unwrap();
    assert_eq!(user.username, "sess_ivy");
    assert_eq!(user.provider, "passkey");
}

#[tokio::test]
#[serial]
async fn test_session_id_roundtrips_through_request_headers() {
    init_test_environment().await;

    let headers = login("sess_judy").await;
    let session_id = session_id_from(&headers);

    // Replay the cookie as a request would
    let mut request_headers = HeaderMap::new();
    request_headers.insert(
        COOKIE,
        format!("{}={}", SESSION_COOKIE_NAME.as_str(), session_id)
            .parse()
            .unwrap(),
    );

    let extracted = get_session_id_from_headers(&request_headers).unwrap();
    assert_eq!(extracted, Some(session_id.as_str()));
}

#[tokio::test]
#[serial]
async fn test_logout_invalidates_the_session() {
    init_test_environment().await;

    let headers = login("sess_kate").await;
    let session_id = session_id_from(&headers);
    assert!(get_user_from_session(&session_id).await.is_ok());

    let mut request_headers = HeaderMap::new();
    request_headers.insert(
        COOKIE,
        format!("{}={}", SESSION_COOKIE_NAME.as_str(), session_id)
            .parse()
            .unwrap(),
    );
    let cookies = request_headers.typed_get::<headers::Cookie>().unwrap();

    let logout_headers = prepare_logout_response(cookies).await.unwrap();

    // The logout response expires the cookie and the session is gone
    let cookie = logout_headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=-86400"));
    assert!(get_user_from_session(&session_id).await.is_err());
}
