//! Full HTML pages
//!
//! - `GET /` redirects to the browse page
//! - `GET /browse` renders filters, popular tags and the requested page
//! - `GET /favorites` and `GET /profile` for signed-in users

use axum::{
    Router,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::{CookieJar, Query as MultiQuery, QueryRejection};
use chrono::Utc;
use serde::Deserialize;

use super::browse::{browse_session, results_view};
use super::{locale, page_error};
use crate::AppState;
use crate::auth::MaybeUser;
use crate::data::PostKind;
use crate::error::AppError;
use crate::query::BrowseParams;
use crate::render::{
    self, BrowsePage, FavoriteItem, FavoritesPage, FilterControls, ProfilePage, ProfilePostItem,
    ResultsView, TagChip,
};

pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/browse") }))
        .route("/browse", get(browse_page))
        .route("/favorites", get(favorites_page))
        .route("/profile", get(profile_page))
}

async fn browse_page(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    jar: CookieJar,
    params: Result<MultiQuery<BrowseParams>, QueryRejection>,
) -> Response {
    let viewer = user.viewer();
    let parsed = params
        .map_err(|rejection| AppError::Validation(rejection.to_string()))
        .and_then(|MultiQuery(params)| params.parse());
    let (filters, page) = match parsed {
        Ok(parsed) => parsed,
        Err(error) => return page_error(viewer, error, "/browse"),
    };
    let locale = locale(&headers);

    let (jar, session_id) = browse_session(jar, state.config.should_use_secure_cookies());
    let outcome = match state
        .sessions
        .open(&session_id, filters.clone(), page, user.user_id())
        .await
    {
        Ok(outcome) => outcome,
        Err(error) => return page_error(viewer, error, "/browse"),
    };
    let results = results_view(outcome, locale).unwrap_or_else(ResultsView::loading);

    let popular_tags = match state.tags.popular().await {
        Ok(tags) => tags
            .iter()
            .map(|tag| TagChip {
                tag: tag.tag.clone(),
                count: tag.count,
                selected: filters.tags.contains(&tag.tag),
            })
            .collect(),
        Err(error) => {
            tracing::warn!(%error, "Popular tags unavailable");
            Vec::new()
        }
    };

    if let Some(user_id) = user.user_id() {
        let url = filters.page_href(page);
        state.activity.record_browse(user_id, url.clone()).await;
        state
            .activity
            .record_search(user_id, &filters.term, url)
            .await;
    }

    let page = BrowsePage {
        viewer,
        filters: FilterControls::new(&filters),
        popular_tags,
        results,
        loading: ResultsView::loading(),
    };
    (jar, render::html(&page)).into_response()
}

#[derive(Debug, Deserialize)]
struct FavoritesQuery {
    filter: Option<String>,
}

/// `all` or a post kind
fn favorites_filter(raw: Option<&str>) -> Result<Option<PostKind>, AppError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(kind) => kind
            .parse()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Unknown favorites filter: {kind}"))),
    }
}

async fn favorites_page(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    Query(query): Query<FavoritesQuery>,
) -> Response {
    let viewer = user.viewer();
    let Some(user_id) = user.user_id() else {
        return page_error(viewer, AppError::Unauthorized, "/favorites");
    };
    let kind = match favorites_filter(query.filter.as_deref()) {
        Ok(kind) => kind,
        Err(error) => return page_error(viewer, error, "/favorites"),
    };

    let favorites = match state.favorites.list(user_id, kind).await {
        Ok(favorites) => favorites,
        Err(error) => return page_error(viewer, error, "/favorites"),
    };
    let locale = locale(&headers);
    let now = Utc::now();
    let items = favorites
        .iter()
        .map(|favorite| FavoriteItem::new(favorite, now, locale))
        .collect();

    let empty_message = match kind {
        None => "You haven't added any favorites yet.".to_string(),
        Some(kind) => format!("No {}s in your favorites yet.", kind.label().to_lowercase()),
    };
    let page = FavoritesPage {
        viewer,
        filter: kind.map_or("all", |kind| kind.as_str()).to_string(),
        items,
        empty_message,
    };
    render::html(&page)
}

async fn profile_page(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
) -> Response {
    let viewer = user.viewer();
    let Some(user_id) = user.user_id() else {
        return page_error(viewer, AppError::Unauthorized, "/profile");
    };

    let (archive, collab) = match state.posts.by_author(user_id).await {
        Ok(posts) => posts,
        Err(error) => return page_error(viewer, error, "/profile"),
    };
    let locale = locale(&headers);

    let page = ProfilePage {
        viewer,
        archive_posts: archive
            .iter()
            .map(|post| ProfilePostItem::from_archive(post, locale))
            .collect(),
        collab_posts: collab
            .iter()
            .map(|post| ProfilePostItem::from_collab(post, locale))
            .collect(),
    };
    render::html(&page)
}
