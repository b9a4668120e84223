//! Category and product routes.

use axum::{Json, extract::State, http::StatusCode};

use larder_core::{CategoryId, Page, ProductId};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireUser;
use crate::models::query::PageParams;
use crate::models::{Category, Product};
use crate::services::catalog::{CategoryChanges, CategoryInput, ProductChanges, ProductInput};
use crate::state::AppState;

// =============================================================================
// Categories
// =============================================================================

/// GET /categories
pub async fn list_categories(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Category>>> {
    Ok(Json(state.catalog().categories(user.id, &params).await?))
}

/// POST /categories
pub async fn create_category(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.catalog().create_category(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /categories/{id}
pub async fn show_category(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<Category>> {
    Ok(Json(state.catalog().category(user.id, id).await?))
}

/// PUT /categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(changes): ApiJson<CategoryChanges>,
) -> Result<Json<Category>> {
    Ok(Json(
        state.catalog().update_category(user.id, id, changes).await?,
    ))
}

/// DELETE /categories/{id}
pub async fn delete_category(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<StatusCode> {
    state.catalog().delete_category(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

/// GET /products
pub async fn list_products(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Product>>> {
    Ok(Json(state.catalog().products(user.id, &params).await?))
}

/// POST /products
pub async fn create_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.catalog().create_product(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id}
pub async fn show_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().product(user.id, id).await?))
}

/// PUT /products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(changes): ApiJson<ProductChanges>,
) -> Result<Json<Product>> {
    Ok(Json(
        state.catalog().update_product(user.id, id, changes).await?,
    ))
}

/// DELETE /products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete_product(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
