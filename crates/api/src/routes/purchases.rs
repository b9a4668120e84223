//! Purchase history routes.

use axum::{Json, extract::State, http::StatusCode};

use larder_core::{Page, PurchaseId};

use crate::error::Result;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::RequireUser;
use crate::models::Purchase;
use crate::models::query::PageParams;
use crate::services::purchases::PurchaseOutcome;
use crate::state::AppState;

/// GET /purchases
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Purchase>>> {
    Ok(Json(state.purchases().page(user.id, &params).await?))
}

/// GET /purchases/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PurchaseId>,
) -> Result<Json<Purchase>> {
    Ok(Json(state.purchases().get(user.id, id).await?))
}

/// POST /purchases/{id}/restore
///
/// Recreates the purchased list with every item unmarked.
pub async fn restore(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<PurchaseId>,
) -> Result<(StatusCode, Json<PurchaseOutcome>)> {
    let outcome = state.purchases().restore(user.id, id).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
