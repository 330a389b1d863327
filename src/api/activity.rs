//! Popular tags and recent activity (JSON)

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::{Activity, TagCount};
use crate::error::AppError;

pub fn activity_router() -> Router<AppState> {
    Router::new()
        .route("/api/tags/popular", get(popular_tags))
        .route("/api/activity", get(recent_activity).delete(clear_activity))
}

async fn popular_tags(State(state): State<AppState>) -> Result<Json<Vec<TagCount>>, AppError> {
    let tags = state.tags.popular().await?;
    Ok(Json(tags.as_ref().clone()))
}

async fn recent_activity(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Json<Vec<Activity>> {
    Json(state.activity.list(&session.user_id).await)
}

async fn clear_activity(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> StatusCode {
    state.activity.clear(&session.user_id).await;
    StatusCode::NO_CONTENT
}
