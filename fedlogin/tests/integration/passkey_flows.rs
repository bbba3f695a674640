//! End-to-end passkey ceremonies driven through the public coordination
//! API, exercising the challenge lifecycle, the verification steps and the
//! sign-counter policy exactly as the web endpoints would.

use serial_test::serial;

use fedlogin::{
    CoordinationError, PasskeyError, handle_finish_authentication_core,
    handle_finish_registration_core, handle_start_authentication_core,
    handle_start_registration_core,
};

use crate::common::{SoftwareAuthenticator, challenge_of, init_test_environment};

/// Run a full registration ceremony for `username`, returning the
/// authenticator that now owns a credential for it.
async fn register(username: &str) -> SoftwareAuthenticator {
    let options = handle_start_registration_core(username).await.unwrap();
    let authenticator = SoftwareAuthenticator::new();
    let response = authenticator.register_credential(&challenge_of(&options));
    handle_finish_registration_core(username, &response)
        .await
        .unwrap();
    authenticator
}

#[tokio::test]
#[serial]
async fn test_register_then_authenticate_succeeds_exactly_once() {
    init_test_environment().await;

    let authenticator = register("it_alice").await;

    let options = handle_start_authentication_core("it_alice").await.unwrap();
    let assertion = authenticator.assertion(&challenge_of(&options), 1);

    let (user, headers) = handle_finish_authentication_core("it_alice", &assertion)
        .await
        .unwrap();
    assert_eq!(user.username, "it_alice");
    assert!(headers.contains_key(http::header::SET_COOKIE));

    // The consumed challenge cannot be replayed
    let result = handle_finish_authentication_core("it_alice", &assertion).await;
    assert!(matches!(
        result,
        Err(CoordinationError::Passkey(PasskeyError::NoPendingChallenge(_)))
    ));
}

#[tokio::test]
#[serial]
async fn test_challenge_mismatch_leaves_no_credential_behind() {
    init_test_environment().await;

    let _options = handle_start_registration_core("it_bob").await.unwrap();
    let authenticator = SoftwareAuthenticator::new();
    // Embedded challenge c2 differs from the issued c1
    let response = authenticator.register_credential("c2-never-issued");

    let result = handle_finish_registration_core("it_bob", &response).await;
    assert!(matches!(
        result,
        Err(CoordinationError::Passkey(PasskeyError::ChallengeMismatch))
    ));

    // Nothing was persisted: the username still has no credentials
    let result = handle_start_authentication_core("it_bob").await;
    assert!(matches!(
        result,
        Err(CoordinationError::Passkey(PasskeyError::UnknownUser))
    ));
}

#[tokio::test]
#[serial]
async fn test_finish_without_begin_fails() {
    init_test_environment().await;

    let authenticator = SoftwareAuthenticator::new();
    let response = authenticator.register_credential("orphan-challenge");

    let result = handle_finish_registration_core("it_carol", &response).await;
    assert!(matches!(
        result,
        Err(CoordinationError::Passkey(PasskeyError::NoPendingChallenge(_)))
    ));
}

#[tokio::test]
#[serial]
async fn test_reissued_challenge_invalidates_the_prior_one() {
    init_test_environment().await;

    let first = handle_start_registration_core("it_dave").await.unwrap();
    let second = handle_start_registration_core("it_dave").await.unwrap();

    let authenticator = SoftwareAuthenticator::new();

    // Answering the superseded challenge fails
    let stale = authenticator.register_credential(&challenge_of(&first));
    let result = handle_finish_registration_core("it_dave", &stale).await;
    assert!(matches!(
        result,
        Err(CoordinationError::Passkey(PasskeyError::ChallengeMismatch))
    ));

    // Answering the live challenge succeeds
    let fresh = authenticator.register_credential(&challenge_of(&second));
    handle_finish_registration_core("it_dave", &fresh)
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn test_counter_regression_fails_despite_valid_signature() {
    init_test_environment().await;

    let authenticator = register("it_erin").await;

    let options = handle_start_authentication_core("it_erin").await.unwrap();
    let assertion = authenticator.assertion(&challenge_of(&options), 7);
    handle_finish_authentication_core("it_erin", &assertion)
        .await
        .unwrap();

    // Same counter again: the signature checks out but the counter did not
    // advance, so the credential is treated as possibly cloned
    let options = handle_start_authentication_core("it_erin").await.unwrap();
    let assertion = authenticator.assertion(&challenge_of(&options), 7);
    let result = handle_finish_authentication_core("it_erin", &assertion).await;
    assert!(matches!(
        result,
        Err(CoordinationError::Passkey(PasskeyError::CloneDetected(_)))
    ));
}

#[tokio::test]
#[serial]
async fn test_concurrent_finishers_exactly_one_wins() {
    init_test_environment().await;

    let authenticator = register("it_frank").await;

    let options = handle_start_authentication_core("it_frank").await.unwrap();
    let assertion_json = authenticator.assertion_json(&challenge_of(&options), 1);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let value = assertion_json.clone();
        handles.push(tokio::spawn(async move {
            let assertion = serde_json::from_value(value).unwrap();
            handle_finish_authentication_core("it_frank", &assertion).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(CoordinationError::Passkey(PasskeyError::NoPendingChallenge(_))) => {}
            Err(other) => panic!("Race loser failed unexpectedly: {other}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
#[serial]
async fn test_two_credentials_either_one_authenticates() {
    init_test_environment().await;

    let first = register("it_grace").await;
    let second = register("it_grace").await;

    // Both credentials appear in the allow-list
    let options = handle_start_authentication_core("it_grace").await.unwrap();
    let allow = serde_json::to_value(&options).unwrap()["allowCredentials"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(allow, 2);

    let assertion = first.assertion(&challenge_of(&options), 1);
    let (user_a, _) = handle_finish_authentication_core("it_grace", &assertion)
        .await
        .unwrap();

    let options = handle_start_authentication_core("it_grace").await.unwrap();
    let assertion = second.assertion(&challenge_of(&options), 1);
    let (user_b, _) = handle_finish_authentication_core("it_grace", &assertion)
        .await
        .unwrap();

    // Both map to the same user record
    assert_eq!(user_a.id, user_b.id);
}

#[tokio::test]
#[serial]
async fn test_registration_options_shape() {
    init_test_environment().await;

    let options = handle_start_registration_core("it_henry").await.unwrap();
    let json = serde_json::to_value(&options).unwrap();

    // ES256 and RS256 are offered, attestation is not requested
    let algs: Vec<i64> = json["pubKeyCredParams"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["alg"].as_i64().unwrap())
        .collect();
    assert!(algs.contains(&-7));
    assert!(algs.contains(&-257));
    assert_eq!(json["attestation"], "none");

    // The challenge decodes to at least 16 random bytes
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    let challenge = URL_SAFE_NO_PAD
        .decode(json["challenge"].as_str().unwrap())
        .unwrap();
    assert!(challenge.len() >= 16);

    // The user handle is opaque and distinct from the username
    assert_ne!(json["user"]["id"], "it_henry");
    assert_eq!(json["user"]["name"], "it_henry");
}
