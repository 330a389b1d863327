//! Post pages, downloads, publishing and editing

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use super::{locale, page_error, parse_kind};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{Post, PostKind};
use crate::error::AppError;
use crate::render::views::post_href;
use crate::render::{self, PostPage, PostView};
use crate::service::{ArchiveForm, CollabForm, Download};

pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/posts/:kind/:id", get(post_page).put(edit_post))
        .route("/posts/:kind/:id/download", post(download_post))
        .route("/publish/archive", post(publish_archive))
        .route("/publish/collab", post(publish_collab))
}

async fn post_page(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let viewer = user.viewer();
    let mut post = match load_post(&state, &kind, &id).await {
        Ok(post) => post,
        Err(error) => return page_error(viewer, error, "/posts/:kind/:id"),
    };

    state.posts.record_view(&mut post).await;

    let favorited = match user.user_id() {
        Some(user_id) => {
            state.activity.record_view(user_id, &post).await;
            match state
                .favorites
                .is_favorited(user_id, post.kind(), post.id())
                .await
            {
                Ok(favorited) => favorited,
                Err(error) => return page_error(viewer, error, "/posts/:kind/:id"),
            }
        }
        None => false,
    };

    let page = PostPage {
        post: PostView::new(&post, favorited, user.user_id(), locale(&headers)),
        viewer,
    };
    render::html(&page)
}

async fn load_post(state: &AppState, kind: &str, id: &str) -> Result<Post, AppError> {
    state.posts.get(parse_kind(kind)?, id).await
}

async fn download_post(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    match state.posts.download(parse_kind(&kind)?, &id).await? {
        Download::Text {
            filename,
            body,
            downloads,
        } => {
            tracing::info!(post_id = %id, downloads = downloads.value, "Post exported");
            Ok((
                [
                    (
                        header::CONTENT_TYPE,
                        "text/plain; charset=utf-8".to_string(),
                    ),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                body,
            )
                .into_response())
        }
        Download::Redirect { url, downloads } => {
            tracing::info!(post_id = %id, downloads = downloads.value, "Download redirected to embed");
            Ok(Redirect::to(&url).into_response())
        }
    }
}

/// Summary returned after a publish or edit
fn saved(kind: PostKind, id: &str, title: &str) -> Json<Value> {
    Json(json!({
        "id": id,
        "kind": kind.as_str(),
        "title": title,
        "url": post_href(kind, id),
    }))
}

async fn publish_archive(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(form): Json<ArchiveForm>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .posts
        .publish_archive(&session.user_id, &form)
        .await?;
    state.tags.invalidate().await;
    Ok((
        StatusCode::CREATED,
        saved(PostKind::Archive, &post.id, &post.title),
    ))
}

async fn publish_collab(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(form): Json<CollabForm>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .posts
        .publish_collab(&session.user_id, &form)
        .await?;
    Ok((
        StatusCode::CREATED,
        saved(PostKind::Collab, &post.id, &post.title),
    ))
}

/// Replace the editable fields of one's own post
///
/// The body is the publish form of the post's kind.
async fn edit_post(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((kind, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let invalid = |e: serde_json::Error| AppError::Validation(format!("Invalid post form: {e}"));
    let post = match parse_kind(&kind)? {
        PostKind::Archive => {
            let form: ArchiveForm = serde_json::from_value(body).map_err(invalid)?;
            let post = state
                .posts
                .update_archive(&session.user_id, &id, &form)
                .await?;
            state.tags.invalidate().await;
            post
        }
        PostKind::Collab => {
            let form: CollabForm = serde_json::from_value(body).map_err(invalid)?;
            state
                .posts
                .update_collab(&session.user_id, &id, &form)
                .await?
        }
    };
    Ok(saved(post.kind(), post.id(), post.title()))
}
