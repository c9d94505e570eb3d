//! Session lifecycle: login, token restoration, invalidation, logout.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use secrecy::SecretString;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use copperleaf_client::AuthStatus;
use copperleaf_client::events::{NoticeLevel, Surface};
use copperleaf_core::Email;
use copperleaf_integration_tests::{
    TestHarness, cart_json, error_body, identity_json, ok_envelope, product_json,
};

#[tokio::test]
async fn test_bootstrap_without_token_stays_anonymous() {
    let harness = TestHarness::start().await;

    assert_eq!(harness.context.session().status(), AuthStatus::Anonymous);
    let status = harness.context.session().bootstrap().await;

    assert_eq!(status, AuthStatus::Anonymous);
    let requests = harness.server.received_requests().await.unwrap();
    assert!(requests.is_empty(), "no request may leave for an empty session");
    assert!(harness.notifier.notices().is_empty());
}

#[tokio::test]
async fn test_login_authenticates_and_cascades_once() {
    let harness = TestHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!({
            "token": "tok-1",
            "user": identity_json("u-1", "Ada", "ada@example.com")
        }))))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_envelope(cart_json("p-1", "Mug", 10.0, 2))),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/wishlist"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(serde_json::json!([product_json("p-2", "Lamp", 40.0)]))),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let email = Email::parse("ada@example.com").unwrap();
    let identity = harness
        .context
        .session()
        .login(&email, "hunter2")
        .await
        .expect("login succeeds");

    assert_eq!(identity.name, "Ada");
    assert_eq!(harness.context.session().status(), AuthStatus::Authenticated);
    assert_eq!(harness.context.cart().snapshot().collection.total_items, 2);
    assert_eq!(harness.context.wishlist().snapshot().collection.len(), 1);
    assert!(
        harness.gateway().read_token().is_some(),
        "token must persist for the next start"
    );
}

#[tokio::test]
async fn test_register_authenticates_and_cascades() {
    let harness = TestHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(ok_envelope(serde_json::json!({
            "token": "tok-2",
            "user": identity_json("u-2", "Grace", "grace@example.com")
        }))))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!({}))))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/wishlist"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!([]))))
        .expect(1)
        .mount(&harness.server)
        .await;

    let email = Email::parse("grace@example.com").unwrap();
    let identity = harness
        .context
        .session()
        .register("Grace", &email, "hunter2")
        .await
        .expect("registration succeeds");

    assert_eq!(identity.name, "Grace");
    assert_eq!(harness.context.session().status(), AuthStatus::Authenticated);
    assert!(
        harness.gateway().read_token().is_some(),
        "token must persist for the next start"
    );
}

#[tokio::test]
async fn test_failed_registration_collapses_to_anonymous() {
    let harness = TestHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_body("User already exists")))
        .mount(&harness.server)
        .await;

    let email = Email::parse("grace@example.com").unwrap();
    let err = harness
        .context
        .session()
        .register("Grace", &email, "hunter2")
        .await
        .expect_err("registration must fail");

    assert_eq!(err.to_string(), "User already exists");
    assert_eq!(harness.context.session().status(), AuthStatus::Anonymous);
    assert!(harness.gateway().read_token().is_none());
    // Validation feedback belongs to the form, not the notifier.
    assert!(harness.notifier.notices().is_empty());
}

#[tokio::test]
async fn test_failed_login_collapses_to_anonymous() {
    let harness = TestHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_body("Invalid credentials")))
        .mount(&harness.server)
        .await;

    let email = Email::parse("ada@example.com").unwrap();
    let err = harness
        .context
        .session()
        .login(&email, "wrong")
        .await
        .expect_err("login must fail");

    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(harness.context.session().status(), AuthStatus::Anonymous);
    assert!(harness.gateway().read_token().is_none());
    // Validation feedback belongs to the form, not the notifier.
    assert!(harness.notifier.notices().is_empty());
}

#[tokio::test]
async fn test_bootstrap_validates_restored_token() {
    let harness = TestHarness::start_with(|gateway| {
        gateway.save_session_token(Some(&SecretString::from("tok-9")));
    })
    .await;

    assert_eq!(
        harness.context.session().status(),
        AuthStatus::Authenticating,
        "a restored token starts the session authenticating"
    );

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer tok-9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(identity_json("u-1", "Ada", "ada@example.com"))),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_envelope(cart_json("p-1", "Mug", 10.0, 1))),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/wishlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!([]))))
        .expect(1)
        .mount(&harness.server)
        .await;

    let status = harness.context.session().bootstrap().await;

    assert_eq!(status, AuthStatus::Authenticated);
    assert_eq!(
        harness.context.session().identity().unwrap().name,
        "Ada"
    );
    assert_eq!(harness.context.cart().snapshot().collection.total_items, 1);
}

#[tokio::test]
async fn test_bootstrap_discards_rejected_token() {
    let harness = TestHarness::start_with(|gateway| {
        gateway.save_session_token(Some(&SecretString::from("stale")));
    })
    .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body("jwt expired")))
        .expect(1)
        .mount(&harness.server)
        .await;
    // The cascade must not fire for a rejected token.
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!({}))))
        .expect(0)
        .mount(&harness.server)
        .await;

    let status = harness.context.session().bootstrap().await;

    assert_eq!(status, AuthStatus::Anonymous);
    assert!(harness.gateway().read_token().is_none());
    assert!(harness.context.cart().snapshot().collection.items.is_empty());

    // The 401 surfaces exactly one expiry notice and a login redirect.
    let notices = harness.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].message, "Session expired. Please login again.");
    assert_eq!(harness.notifier.navigations(), vec![Surface::Login]);
}

#[tokio::test]
async fn test_logout_clears_session_and_stores() {
    let harness = TestHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!({
            "token": "tok-1",
            "user": identity_json("u-1", "Ada", "ada@example.com")
        }))))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_envelope(cart_json("p-1", "Mug", 10.0, 3))),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/wishlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!([]))))
        .mount(&harness.server)
        .await;

    let email = Email::parse("ada@example.com").unwrap();
    harness
        .context
        .session()
        .login(&email, "hunter2")
        .await
        .expect("login succeeds");
    assert_eq!(harness.context.cart().snapshot().collection.total_items, 3);

    harness.context.session().logout();

    assert_eq!(harness.context.session().status(), AuthStatus::Anonymous);
    assert!(harness.context.session().identity().is_none());
    assert!(harness.context.cart().snapshot().collection.items.is_empty());
    assert!(harness.context.wishlist().snapshot().collection.is_empty());
    assert!(harness.gateway().read_token().is_none());
}
