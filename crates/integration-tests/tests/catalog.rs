//! Categories and products over HTTP.

#![allow(clippy::unwrap_used)]

use larder_integration_tests::{TestApp, expect_error, expect_json, id};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_products_filtered_by_category() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;

    let dairy = app.create(&token, "/categories", json!({"name": "Dairy"})).await;
    app.create(
        &token,
        "/products",
        json!({"name": "Milk", "unit": "l", "default_quantity": 2, "category_id": dairy["id"]}),
    )
    .await;
    app.product(&token, "Bread", None).await;

    let resp = app
        .get(&format!("/products?category_id={}", id(&dairy["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page = expect_json(resp, StatusCode::OK).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["name"], "Milk");
    assert_eq!(page["data"][0]["default_quantity"], 2.0);

    let resp = app.get("/products").bearer_auth(&token).send().await.unwrap();
    assert_eq!(expect_json(resp, StatusCode::OK).await["total"], 2);
}

#[tokio::test]
async fn test_catalog_is_per_user() {
    let app = TestApp::spawn().await;
    let ana = app.signed_up("ana@example.com").await;
    let ben = app.signed_up("ben@example.com").await;

    let milk = app.product(&ana, "Milk", None).await;
    app.product(&ben, "Milk", None).await;

    let resp = app
        .post("/products")
        .bearer_auth(&ana)
        .json(&json!({"name": "Milk"}))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::CONFLICT, "conflict").await;

    let resp = app
        .get(&format!("/products/{}", id(&milk["id"])))
        .bearer_auth(&ben)
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn test_product_update_and_delete() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;
    let milk = app.product(&token, "Milk", Some("l")).await;
    let path = format!("/products/{}", id(&milk["id"]));

    let resp = app
        .put(&path)
        .bearer_auth(&token)
        .json(&json!({"name": "Oat milk", "unit": null}))
        .send()
        .await
        .unwrap();
    let product = expect_json(resp, StatusCode::OK).await;
    assert_eq!(product["name"], "Oat milk");
    assert!(product["unit"].is_null());

    let resp = app.delete(&path).bearer_auth(&token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.get(&path).bearer_auth(&token).send().await.unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "not_found").await;

    // The name is free again.
    app.product(&token, "Milk", None).await;
}
