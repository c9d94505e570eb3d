//! Whitelisted state surviving simulated process restarts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use copperleaf_client::AuthStatus;
use copperleaf_core::{ColorScheme, ProductSummary, ThemePreference};
use copperleaf_integration_tests::{
    TestHarness, cart_json, identity_json, ok_envelope, product_json,
};

fn summary(id: &str, name: &str, price: f64) -> ProductSummary {
    serde_json::from_value(product_json(id, name, price)).unwrap()
}

#[tokio::test]
async fn test_whitelisted_partitions_survive_restart() {
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
            ResponseTemplate::new(200).set_body_json(ok_envelope(cart_json("p-1", "Mug", 10.0, 2))),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/wishlist"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(serde_json::json!([product_json("p-2", "Lamp", 40.0)]))),
        )
        .mount(&harness.server)
        .await;

    let email = copperleaf_core::Email::parse("ada@example.com").unwrap();
    harness
        .context
        .session()
        .login(&email, "hunter2")
        .await
        .expect("login succeeds");
    harness.context.theme().set_preference(ThemePreference::Dark);

    let harness = harness.restart();

    // The token came back, so the session resumes pending validation.
    assert_eq!(
        harness.context.session().status(),
        AuthStatus::Authenticating
    );
    let cart = harness.context.cart().snapshot().collection;
    assert_eq!(cart.total_items, 2);
    assert_eq!(harness.context.wishlist().snapshot().collection.len(), 1);
    assert_eq!(
        harness.context.theme().state().preference,
        ThemePreference::Dark
    );
    assert_eq!(harness.context.theme().effective(), ColorScheme::Dark);
}

#[tokio::test]
async fn test_logout_leaves_nothing_behind() {
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
            ResponseTemplate::new(200).set_body_json(ok_envelope(cart_json("p-1", "Mug", 10.0, 2))),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/wishlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!([]))))
        .mount(&harness.server)
        .await;

    let email = copperleaf_core::Email::parse("ada@example.com").unwrap();
    harness
        .context
        .session()
        .login(&email, "hunter2")
        .await
        .expect("login succeeds");
    harness.context.session().logout();

    let harness = harness.restart();

    assert_eq!(harness.context.session().status(), AuthStatus::Anonymous);
    assert!(harness.context.cart().snapshot().collection.items.is_empty());
    assert!(harness.context.wishlist().snapshot().collection.is_empty());
}

#[tokio::test]
async fn test_local_only_mutations_persist_without_a_session() {
    let harness = TestHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/cart/add"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_envelope(cart_json("p-3", "Bowl", 8.0, 4))),
        )
        .mount(&harness.server)
        .await;

    harness
        .context
        .cart()
        .add(summary("p-3", "Bowl", 8.0), 4)
        .await
        .expect("add succeeds");

    let harness = harness.restart();

    let cart = harness.context.cart().snapshot().collection;
    assert_eq!(cart.total_items, 4);
    assert_eq!(cart.items[0].product.name, "Bowl");
}
