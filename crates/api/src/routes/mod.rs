//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (store ping)
//!
//! # Users
//! POST /users                          - Register
//! POST /users/verify                   - Verify email with code
//! POST /users/verify/resend            - Resend verification code
//! POST /users/login                    - Issue bearer token
//! POST /users/logout                   - Revoke current token
//! POST /users/password/forgot          - Mail reset code (always 202)
//! POST /users/password/reset           - Reset password with code
//! GET|PATCH|DELETE /users/me           - Own account
//!
//! # Catalog
//! GET|POST /categories, GET|PUT|DELETE /categories/{id}
//! GET|POST /products,   GET|PUT|DELETE /products/{id}
//!
//! # Lists
//! GET|POST /lists, GET|PUT|DELETE /lists/{id}
//! POST   /lists/{id}/purchase          - Check out
//! POST   /lists/{id}/transfer          - Move purchased items to a pantry
//! POST   /lists/{id}/share             - Share with users by email
//! DELETE /lists/{id}/share/{user_id}   - Revoke a share
//! GET|POST /lists/{id}/items, GET|PUT|PATCH|DELETE /lists/{id}/items/{item_id}
//!
//! # Pantries
//! GET|POST /pantries, GET|PUT|DELETE /pantries/{id}
//! POST   /pantries/{id}/share
//! DELETE /pantries/{id}/share/{user_id}
//! GET|POST /pantries/{id}/items, GET|PATCH|DELETE /pantries/{id}/items/{item_id}
//!
//! # Purchases
//! GET  /purchases, GET /purchases/{id}
//! POST /purchases/{id}/restore         - Recreate an archived list
//! ```
//!
//! Everything except health, registration, verification, login and password
//! reset requires `Authorization: Bearer <token>`.

pub mod catalog;
pub mod health;
pub mod lists;
pub mod pantries;
pub mod purchases;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(users::register))
        .route("/verify", post(users::verify))
        .route("/verify/resend", post(users::resend))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/password/forgot", post(users::forgot))
        .route("/password/reset", post(users::reset))
        .route(
            "/me",
            get(users::me)
                .patch(users::update_me)
                .delete(users::delete_me),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/{id}",
            get(catalog::show_category)
                .put(catalog::update_category)
                .delete(catalog::delete_category),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::list_products).post(catalog::create_product))
        .route(
            "/{id}",
            get(catalog::show_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
}

/// Create the list routes router.
pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(lists::index).post(lists::create))
        .route(
            "/{id}",
            get(lists::show).put(lists::update).delete(lists::delete),
        )
        .route("/{id}/purchase", post(lists::purchase))
        .route("/{id}/transfer", post(lists::transfer))
        .route("/{id}/share", post(lists::share))
        .route("/{id}/share/{user_id}", delete(lists::revoke))
        .route("/{id}/items", get(lists::items).post(lists::add_item))
        .route(
            "/{id}/items/{item_id}",
            get(lists::show_item)
                .put(lists::update_item)
                .patch(lists::patch_item)
                .delete(lists::delete_item),
        )
}

/// Create the pantry routes router.
pub fn pantry_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pantries::index).post(pantries::create))
        .route(
            "/{id}",
            get(pantries::show)
                .put(pantries::update)
                .delete(pantries::delete),
        )
        .route("/{id}/share", post(pantries::share))
        .route("/{id}/share/{user_id}", delete(pantries::revoke))
        .route("/{id}/items", get(pantries::items).post(pantries::add_item))
        .route(
            "/{id}/items/{item_id}",
            get(pantries::show_item)
                .patch(pantries::patch_item)
                .delete(pantries::delete_item),
        )
}

/// Create the purchase routes router.
pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(purchases::index))
        .route("/{id}", get(purchases::show))
        .route("/{id}/restore", post(purchases::restore))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/users", user_routes())
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/lists", list_routes())
        .nest("/pantries", pantry_routes())
        .nest("/purchases", purchase_routes())
}
