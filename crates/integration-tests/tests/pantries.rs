//! Pantries and moving purchased items into them over HTTP.

#![allow(clippy::unwrap_used)]

use larder_integration_tests::{TestApp, expect_error, expect_json, id};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn transfer(app: &TestApp, token: &str, list: &Value, body: Value) -> reqwest::Response {
    app.post(&format!("/lists/{}/transfer", id(&list["id"])))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_transfer_merges_into_existing_stock() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;

    let milk = app.product(&token, "Milk", Some("l")).await;
    let pantry = app.create(&token, "/pantries", json!({"name": "Kitchen"})).await;
    app.create(
        &token,
        &format!("/pantries/{}/items", id(&pantry["id"])),
        json!({"product_id": milk["id"], "quantity": 2, "expiration_date": "2026-11-01"}),
    )
    .await;

    let list = app.list(&token, "Groceries", false).await;
    app.item(&token, &list["id"], &milk["id"], 3, true).await;

    let body = json!({"pantry_id": pantry["id"], "notes": "weekly shop"});
    let resp = transfer(&app, &token, &list, body).await;
    let outcome = expect_json(resp, StatusCode::OK).await;
    assert_eq!(outcome["items"].as_array().unwrap().len(), 1);

    let resp = app
        .get(&format!("/pantries/{}", id(&pantry["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let detail = expect_json(resp, StatusCode::OK).await;
    let items = detail["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5.0);
    assert_eq!(items[0]["unit"], "l");
    assert_eq!(items[0]["expiration_date"], "2026-11-01");
    assert_eq!(items[0]["metadata"]["transfer_notes"], "weekly shop");

    // The product remembers where it lives.
    let resp = app
        .get(&format!("/products/{}", id(&milk["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(expect_json(resp, StatusCode::OK).await["pantry_id"], pantry["id"]);
}

#[tokio::test]
async fn test_transfer_creates_missing_stock_and_skips_unpurchased() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;

    let rice = app.product(&token, "Rice", Some("kg")).await;
    let soap = app.product(&token, "Soap", None).await;
    let pantry = app.create(&token, "/pantries", json!({"name": "Cellar"})).await;
    let list = app.list(&token, "Groceries", false).await;
    app.item(&token, &list["id"], &rice["id"], 1, true).await;
    app.item(&token, &list["id"], &soap["id"], 2, false).await;

    let resp = transfer(&app, &token, &list, json!({"pantry_id": pantry["id"]})).await;
    let outcome = expect_json(resp, StatusCode::OK).await;
    let items = outcome["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], rice["id"]);
    assert_eq!(items[0]["unit"], "kg");

    // The list is untouched.
    let resp = app
        .get(&format!("/lists/{}", id(&list["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(expect_json(resp, StatusCode::OK).await["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_transfer_requires_access_to_both_sides() {
    let app = TestApp::spawn().await;
    let ana = app.signed_up("ana@example.com").await;
    let ben = app.signed_up("ben@example.com").await;

    let list = app.list(&ana, "Groceries", false).await;
    let bens_pantry = app.create(&ben, "/pantries", json!({"name": "Ben's"})).await;

    let resp = transfer(&app, &ana, &list, json!({"pantry_id": bens_pantry["id"]})).await;
    expect_error(resp, StatusCode::NOT_FOUND, "not_found").await;

    let anas_pantry = app.create(&ana, "/pantries", json!({"name": "Ana's"})).await;
    let resp = transfer(&app, &ben, &list, json!({"pantry_id": anas_pantry["id"]})).await;
    expect_error(resp, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn test_pantry_item_crud() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;
    let flour = app.product(&token, "Flour", Some("kg")).await;
    let pantry = app.create(&token, "/pantries", json!({"name": "Kitchen"})).await;
    let items_path = format!("/pantries/{}/items", id(&pantry["id"]));

    let item = app.create(&token, &items_path, json!({"product_id": flour["id"]})).await;
    assert_eq!(item["quantity"], 1.0);
    assert_eq!(item["unit"], "kg");

    let item_path = format!("{items_path}/{}", id(&item["id"]));
    let resp = app
        .patch(&item_path)
        .bearer_auth(&token)
        .json(&json!({"quantity": 2.5, "unit": null}))
        .send()
        .await
        .unwrap();
    let item = expect_json(resp, StatusCode::OK).await;
    assert_eq!(item["quantity"], 2.5);
    assert!(item["unit"].is_null());

    let resp = app
        .patch(&item_path)
        .bearer_auth(&token)
        .json(&json!({"quantity": 0}))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "bad_request").await;

    // One item per product.
    let resp = app
        .post(&items_path)
        .bearer_auth(&token)
        .json(&json!({"product_id": flour["id"]}))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::CONFLICT, "conflict").await;

    let resp = app.delete(&item_path).bearer_auth(&token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.get(&item_path).bearer_auth(&token).send().await.unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "not_found").await;
}
