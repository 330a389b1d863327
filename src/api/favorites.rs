//! Favorite endpoints (JSON, signed-in users)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};

use super::parse_kind;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::FavoriteChange;

pub fn favorites_router() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/:kind/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/favorites/:favorite_id", delete(remove_favorite_by_id))
}

async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<FavoriteChange>, AppError> {
    let change = state
        .favorites
        .add(&session.user_id, parse_kind(&kind)?, &id)
        .await?;
    Ok(Json(change))
}

async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<FavoriteChange>, AppError> {
    let change = state
        .favorites
        .remove(&session.user_id, parse_kind(&kind)?, &id)
        .await?;
    Ok(Json(change))
}

async fn remove_favorite_by_id(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(favorite_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .favorites
        .remove_by_id(&session.user_id, &favorite_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
