//! Pantry routes: pantries, their items and sharing.

use axum::{Json, extract::State, http::StatusCode};

use larder_core::{Page, PantryId, PantryItemId, UserId};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireUser;
use crate::models::query::PageParams;
use crate::models::{Pantry, PantryDetail, PantryItem};
use crate::services::pantries::{PantryChanges, PantryInput};
use crate::services::pantry_items::{PantryItemInput, PantryItemPatch};
use crate::services::sharing::ShareInput;
use crate::state::AppState;

/// GET /pantries
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Pantry>>> {
    Ok(Json(state.pantries().page(user.id, &params).await?))
}

/// POST /pantries
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(input): ApiJson<PantryInput>,
) -> Result<(StatusCode, Json<Pantry>)> {
    let pantry = state.pantries().create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(pantry)))
}

/// GET /pantries/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PantryId>,
) -> Result<Json<PantryDetail>> {
    Ok(Json(state.pantries().get(user.id, id).await?))
}

/// PUT /pantries/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PantryId>,
    ApiJson(changes): ApiJson<PantryChanges>,
) -> Result<Json<Pantry>> {
    Ok(Json(state.pantries().update(user.id, id, changes).await?))
}

/// DELETE /pantries/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PantryId>,
) -> Result<StatusCode> {
    state.pantries().delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /pantries/{id}/share
pub async fn share(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PantryId>,
    ApiJson(input): ApiJson<ShareInput>,
) -> Result<Json<Pantry>> {
    Ok(Json(state.sharing().share_pantry(user.id, id, input).await?))
}

/// DELETE /pantries/{id}/share/{user_id}
pub async fn revoke(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, target)): ApiPath<(PantryId, UserId)>,
) -> Result<Json<Pantry>> {
    Ok(Json(
        state.sharing().revoke_pantry(user.id, id, target).await?,
    ))
}

// =============================================================================
// Items
// =============================================================================

/// GET /pantries/{id}/items
pub async fn items(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PantryId>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<PantryItem>>> {
    Ok(Json(state.pantry_items().page(user.id, id, &params).await?))
}

/// POST /pantries/{id}/items
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PantryId>,
    ApiJson(input): ApiJson<PantryItemInput>,
) -> Result<(StatusCode, Json<PantryItem>)> {
    let item = state.pantry_items().add(user.id, id, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /pantries/{id}/items/{item_id}
pub async fn show_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, item_id)): ApiPath<(PantryId, PantryItemId)>,
) -> Result<Json<PantryItem>> {
    Ok(Json(state.pantry_items().get(user.id, id, item_id).await?))
}

/// PATCH /pantries/{id}/items/{item_id}
pub async fn patch_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, item_id)): ApiPath<(PantryId, PantryItemId)>,
    ApiJson(patch): ApiJson<PantryItemPatch>,
) -> Result<Json<PantryItem>> {
    Ok(Json(
        state
            .pantry_items()
            .patch(user.id, id, item_id, patch)
            .await?,
    ))
}

/// DELETE /pantries/{id}/items/{item_id}
pub async fn delete_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, item_id)): ApiPath<(PantryId, PantryItemId)>,
) -> Result<StatusCode> {
    state.pantry_items().delete(user.id, id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
