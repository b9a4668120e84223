//! Shopping list routes: lists, their items, checkout, transfer and sharing.

use axum::{Json, extract::State, http::StatusCode};

use larder_core::{ListId, ListItemId, Page, UserId};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery, OptionalJson};
use crate::middleware::RequireUser;
use crate::models::query::PageParams;
use crate::models::{ListDetail, ListItem, ShoppingList};
use crate::services::list_items::{ListItemChanges, ListItemInput, ListItemPatch};
use crate::services::lists::{ListChanges, ListInput};
use crate::services::purchases::{PurchaseInput, PurchaseOutcome};
use crate::services::sharing::ShareInput;
use crate::services::transfer::{TransferInput, TransferOutcome};
use crate::state::AppState;

/// GET /lists
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<ShoppingList>>> {
    Ok(Json(state.lists().page(user.id, &params).await?))
}

/// POST /lists
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(input): ApiJson<ListInput>,
) -> Result<(StatusCode, Json<ShoppingList>)> {
    let list = state.lists().create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// GET /lists/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
) -> Result<Json<ListDetail>> {
    Ok(Json(state.lists().get(user.id, id).await?))
}

/// PUT /lists/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
    ApiJson(changes): ApiJson<ListChanges>,
) -> Result<Json<ShoppingList>> {
    Ok(Json(state.lists().update(user.id, id, changes).await?))
}

/// DELETE /lists/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
) -> Result<StatusCode> {
    state.lists().delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /lists/{id}/purchase
///
/// The body is optional.
pub async fn purchase(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
    OptionalJson(input): OptionalJson<PurchaseInput>,
) -> Result<(StatusCode, Json<PurchaseOutcome>)> {
    let outcome = state.purchases().purchase(user.id, id, input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /lists/{id}/transfer
pub async fn transfer(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
    ApiJson(input): ApiJson<TransferInput>,
) -> Result<Json<TransferOutcome>> {
    Ok(Json(state.transfers().transfer(user.id, id, input).await?))
}

/// POST /lists/{id}/share
pub async fn share(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
    ApiJson(input): ApiJson<ShareInput>,
) -> Result<Json<ShoppingList>> {
    Ok(Json(state.sharing().share_list(user.id, id, input).await?))
}

/// DELETE /lists/{id}/share/{user_id}
pub async fn revoke(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, target)): ApiPath<(ListId, UserId)>,
) -> Result<Json<ShoppingList>> {
    Ok(Json(state.sharing().revoke_list(user.id, id, target).await?))
}

// =============================================================================
// Items
// =============================================================================

/// GET /lists/{id}/items
pub async fn items(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<ListItem>>> {
    Ok(Json(state.list_items().page(user.id, id, &params).await?))
}

/// POST /lists/{id}/items
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<ListId>,
    ApiJson(input): ApiJson<ListItemInput>,
) -> Result<(StatusCode, Json<ListItem>)> {
    let item = state.list_items().add(user.id, id, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /lists/{id}/items/{item_id}
pub async fn show_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, item_id)): ApiPath<(ListId, ListItemId)>,
) -> Result<Json<ListItem>> {
    Ok(Json(state.list_items().get(user.id, id, item_id).await?))
}

/// PUT /lists/{id}/items/{item_id}
pub async fn update_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, item_id)): ApiPath<(ListId, ListItemId)>,
    ApiJson(changes): ApiJson<ListItemChanges>,
) -> Result<Json<ListItem>> {
    Ok(Json(
        state
            .list_items()
            .update(user.id, id, item_id, changes)
            .await?,
    ))
}

/// PATCH /lists/{id}/items/{item_id}
pub async fn patch_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, item_id)): ApiPath<(ListId, ListItemId)>,
    ApiJson(patch): ApiJson<ListItemPatch>,
) -> Result<Json<ListItem>> {
    Ok(Json(
        state.list_items().patch(user.id, id, item_id, patch).await?,
    ))
}

/// DELETE /lists/{id}/items/{item_id}
pub async fn delete_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath((id, item_id)): ApiPath<(ListId, ListItemId)>,
) -> Result<StatusCode> {
    state.list_items().delete(user.id, id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
