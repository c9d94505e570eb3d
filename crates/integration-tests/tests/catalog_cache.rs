//! Catalog pass-through and its response cache.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use copperleaf_core::ProductId;
use copperleaf_integration_tests::{TestHarness, ok_envelope, product_json};

use copperleaf_client::catalog::ProductFilters;

fn page_json(products: Vec<serde_json::Value>) -> serde_json::Value {
    let total = products.len();
    serde_json::json!({
        "products": products,
        "pagination": {
            "current": 1,
            "pages": 1,
            "total": total,
            "hasNext": false,
            "hasPrev": false
        },
        "filters": { "categories": ["kitchen"], "brands": [] }
    })
}

#[tokio::test]
async fn test_browse_pages_are_served_from_cache() {
    let harness = TestHarness::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(page_json(vec![product_json("p-1", "Mug", 10.0)]))),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let filters = ProductFilters::default();
    let first = harness
        .context
        .catalog()
        .list_products(&filters)
        .await
        .expect("first fetch");
    let second = harness
        .context
        .catalog()
        .list_products(&filters)
        .await
        .expect("cached fetch");

    assert_eq!(first, second);
    assert_eq!(first.products.len(), 1);
    assert_eq!(first.filters.categories, vec!["kitchen".to_string()]);
}

#[tokio::test]
async fn test_search_results_bypass_the_cache() {
    let harness = TestHarness::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("search", "mug"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(page_json(vec![product_json("p-1", "Mug", 10.0)]))),
        )
        .expect(2)
        .mount(&harness.server)
        .await;

    let filters = ProductFilters::search("mug");
    harness
        .context
        .catalog()
        .list_products(&filters)
        .await
        .expect("first search");
    harness
        .context
        .catalog()
        .list_products(&filters)
        .await
        .expect("second search hits the service again");
}

#[tokio::test]
async fn test_product_detail_is_cached_until_reviewed() {
    let harness = TestHarness::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::json!({
            "product": product_json("p-1", "Mug", 10.0),
            "relatedProducts": [product_json("p-2", "Lamp", 40.0)]
        }))))
        .expect(2)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/products/p-1/reviews"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_envelope(serde_json::Value::Null)),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let id = ProductId::new("p-1");
    let catalog = harness.context.catalog();

    let detail = catalog.get_product(&id).await.expect("first fetch");
    assert_eq!(detail.related_products.len(), 1);
    catalog.get_product(&id).await.expect("cached fetch");

    // Submitting a review drops the cached detail.
    catalog
        .add_review(&id, 5, "sturdy handle")
        .await
        .expect("review accepted");
    catalog.get_product(&id).await.expect("refetched detail");
}
