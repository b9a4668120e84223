//! Lists, purchasing and restoring over HTTP.

#![allow(clippy::unwrap_used)]

use larder_integration_tests::{TestApp, expect_error, expect_json, id};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn test_groceries_purchase_archives_the_list() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;

    let milk = app.product(&token, "Milk", Some("l")).await;
    let eggs = app.product(&token, "Eggs", None).await;
    let list = app.list(&token, "Groceries", false).await;
    app.item(&token, &list["id"], &milk["id"], 2, true).await;
    app.item(&token, &list["id"], &eggs["id"], 12, false).await;

    let resp = app
        .post(&format!("/lists/{}/purchase", id(&list["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let outcome = expect_json(resp, StatusCode::CREATED).await;

    let snapshot = outcome["purchase"]["items"].as_array().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["product_id"], milk["id"]);
    assert_eq!(snapshot[0]["quantity"], 2.0);
    assert!(!outcome["list"]["last_purchased_at"].is_null());

    // Archived: gone from the list endpoints, still in the history.
    let resp = app
        .get(&format!("/lists/{}", id(&list["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "not_found").await;

    let resp = app.get("/purchases").bearer_auth(&token).send().await.unwrap();
    let page = expect_json(resp, StatusCode::OK).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["id"], outcome["purchase"]["id"]);
}

#[tokio::test]
async fn test_recurring_purchase_resets_items() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;

    let bread = app.product(&token, "Bread", None).await;
    let list = app.list(&token, "Weekly", true).await;
    app.item(&token, &list["id"], &bread["id"], 1, true).await;

    let resp = app
        .post(&format!("/lists/{}/purchase", id(&list["id"])))
        .bearer_auth(&token)
        .json(&json!({"metadata": {"store": "corner shop"}}))
        .send()
        .await
        .unwrap();
    let outcome = expect_json(resp, StatusCode::CREATED).await;
    assert_eq!(outcome["purchase"]["metadata"]["store"], "corner shop");

    let resp = app
        .get(&format!("/lists/{}", id(&list["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let detail = expect_json(resp, StatusCode::OK).await;
    assert_eq!(detail["items"][0]["purchased"], false);
    assert!(!detail["items"][0]["last_purchased_at"].is_null());
}

#[tokio::test]
async fn test_purchase_errors() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;
    let list = app.list(&token, "Groceries", false).await;
    let path = format!("/lists/{}/purchase", id(&list["id"]));

    let resp = app.post(&path).bearer_auth(&token).send().await.unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "list_empty").await;

    let milk = app.product(&token, "Milk", None).await;
    app.item(&token, &list["id"], &milk["id"], 1, false).await;
    let resp = app.post(&path).bearer_auth(&token).send().await.unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "nothing_purchased").await;

    // Nothing changed.
    let resp = app.get("/purchases").bearer_auth(&token).send().await.unwrap();
    assert_eq!(expect_json(resp, StatusCode::OK).await["total"], 0);
}

#[tokio::test]
async fn test_restore_recreates_the_list() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;

    let milk = app.product(&token, "Milk", Some("l")).await;
    let list = app.list(&token, "Groceries", false).await;
    app.item(&token, &list["id"], &milk["id"], 3, true).await;

    let resp = app
        .post(&format!("/lists/{}/purchase", id(&list["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let purchase = expect_json(resp, StatusCode::CREATED).await["purchase"].clone();

    let resp = app
        .post(&format!("/purchases/{}/restore", id(&purchase["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let restored = expect_json(resp, StatusCode::CREATED).await;

    assert_eq!(restored["list"]["name"], "Groceries (restored)");
    assert_ne!(restored["list"]["id"], list["id"]);
    assert_eq!(restored["list"]["items"][0]["quantity"], 3.0);
    assert_eq!(restored["list"]["items"][0]["purchased"], false);
    assert_eq!(restored["purchase"]["list_id"], restored["list"]["id"]);
    assert!(!restored["purchase"]["restored_at"].is_null());
}

#[tokio::test]
async fn test_list_names_are_unique_per_owner() {
    let app = TestApp::spawn().await;
    let ana = app.signed_up("ana@example.com").await;
    let ben = app.signed_up("ben@example.com").await;

    app.list(&ana, "Groceries", false).await;
    app.list(&ben, "Groceries", false).await;

    let resp = app
        .post("/lists")
        .bearer_auth(&ana)
        .json(&json!({"name": " Groceries "}))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::CONFLICT, "conflict").await;
}

#[tokio::test]
async fn test_list_pagination_and_search() {
    let app = TestApp::spawn().await;
    let token = app.signed_up("ana@example.com").await;
    for name in ["Groceries", "Hardware", "Party", "Garden"] {
        app.list(&token, name, false).await;
    }

    let resp = app
        .get("/lists?sort_by=name&order=asc&page=1&per_page=3")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page = expect_json(resp, StatusCode::OK).await;
    assert_eq!(page["total"], 4);
    let names: Vec<&str> = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Garden", "Groceries", "Hardware"]);

    let resp = app
        .get("/lists?search=gr")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page = expect_json(resp, StatusCode::OK).await;
    assert_eq!(page["total"], 1);

    let resp = app
        .get("/lists?per_page=0")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "bad_request").await;
}

#[tokio::test]
async fn test_purchases_are_private() {
    let app = TestApp::spawn().await;
    let ana = app.signed_up("ana@example.com").await;
    let ben = app.signed_up("ben@example.com").await;

    let milk = app.product(&ana, "Milk", None).await;
    let list = app.list(&ana, "Groceries", false).await;
    app.item(&ana, &list["id"], &milk["id"], 1, true).await;
    let resp = app
        .post(&format!("/lists/{}/purchase", id(&list["id"])))
        .bearer_auth(&ana)
        .send()
        .await
        .unwrap();
    let outcome: Value = expect_json(resp, StatusCode::CREATED).await;

    let resp = app
        .get(&format!("/purchases/{}", id(&outcome["purchase"]["id"])))
        .bearer_auth(&ben)
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "not_found").await;
}
