//! Integration tests for Larder.
//!
//! Each test spawns the full router (middleware included) over an in-memory
//! store on an ephemeral port and talks to it over HTTP with `reqwest`. No
//! database or SMTP relay is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p larder-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use larder_api::db::MemoryStore;
use larder_api::services::email::RecordingMailer;
use larder_api::state::AppState;
use larder_core::Email;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};

/// Default password for users created through [`TestApp::signed_up`].
pub const PASSWORD: &str = "correct horse battery";

/// A running API server and a client pointed at it.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub mailer: RecordingMailer,
}

impl TestApp {
    /// Start a fresh server with an empty store.
    pub async fn spawn() -> Self {
        let mailer = RecordingMailer::new();
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(mailer.clone()),
            SecretString::from("q7Lm2Vx9Rk4Tn8Wz1Hc6Jb3Pf5Ds0Ga"),
            Duration::from_secs(3600),
            Duration::from_secs(600),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, larder_api::app(state)).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            mailer,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.client.patch(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// The last one-time code mailed to `email`.
    pub fn last_code(&self, email: &str) -> String {
        self.mailer
            .last_code(&Email::parse(email).unwrap())
            .expect("no code was mailed")
    }

    /// Register, verify and log in a user. Returns the bearer token.
    pub async fn signed_up(&self, email: &str) -> String {
        let name = email.split('@').next().unwrap_or(email);
        let resp = self
            .post("/users")
            .json(&json!({"email": email, "password": PASSWORD, "display_name": name}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = self
            .post("/users/verify")
            .json(&json!({"email": email, "code": self.last_code(email)}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        self.login(email, PASSWORD).await
    }

    /// Log in and return the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .post("/users/login")
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_owned()
    }

    /// `POST` an authenticated JSON body and expect `201 Created`.
    pub async fn create(&self, token: &str, path: &str, body: Value) -> Value {
        let resp = self.post(path).bearer_auth(token).json(&body).send().await.unwrap();
        expect_json(resp, StatusCode::CREATED).await
    }

    /// A product owned by the token's user.
    pub async fn product(&self, token: &str, name: &str, unit: Option<&str>) -> Value {
        self.create(token, "/products", json!({"name": name, "unit": unit}))
            .await
    }

    /// A list owned by the token's user.
    pub async fn list(&self, token: &str, name: &str, recurring: bool) -> Value {
        self.create(token, "/lists", json!({"name": name, "recurring": recurring}))
            .await
    }

    /// Add a product to a list, optionally marking it purchased.
    pub async fn item(
        &self,
        token: &str,
        list_id: &Value,
        product_id: &Value,
        quantity: u32,
        purchased: bool,
    ) -> Value {
        let item = self
            .create(
                token,
                &format!("/lists/{}/items", id(list_id)),
                json!({"product_id": product_id, "quantity": quantity}),
            )
            .await;
        if !purchased {
            return item;
        }
        let resp = self
            .patch(&format!("/lists/{}/items/{}", id(list_id), id(&item["id"])))
            .bearer_auth(token)
            .json(&json!({"purchased": true}))
            .send()
            .await
            .unwrap();
        expect_json(resp, StatusCode::OK).await
    }
}

/// An id from a JSON body, for building paths.
pub fn id(value: &Value) -> i64 {
    value.as_i64().expect("id is an integer")
}

/// Assert the status and decode the JSON body.
pub async fn expect_json(resp: Response, status: StatusCode) -> Value {
    let actual = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    assert_eq!(actual, status, "unexpected status, body: {body}");
    body
}

/// Assert an error response with the given status and `error` code.
pub async fn expect_error(resp: Response, status: StatusCode, code: &str) -> Value {
    let body = expect_json(resp, status).await;
    assert_eq!(body["error"], code, "unexpected error body: {body}");
    assert!(body["message"].is_string(), "error body has no message: {body}");
    body
}
