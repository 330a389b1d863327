//! Browse session events
//!
//! The browse page posts each user action here and swaps the returned
//! results fragment into place. `204 No Content` means the action was
//! debounced, superseded by a newer one, or changed nothing.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::locale;
use crate::AppState;
use crate::auth::MaybeUser;
use crate::error::AppError;
use crate::render::{self, DateLocale, PaginationView, PostCard, ResultsFragment, ResultsView};
use crate::service::{BrowseEvent, BrowseSessions, SESSION_COOKIE, SessionOutcome};

pub fn browse_router() -> Router<AppState> {
    Router::new().route("/browse/session/events", post(session_event))
}

/// Session id from the cookie, minting and setting a new one when absent
pub(super) fn browse_session(jar: CookieJar, secure: bool) -> (CookieJar, String) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| !id.is_empty())
    {
        return (jar, id);
    }

    let id = BrowseSessions::new_session_id();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), id)
}

/// Results area for a session outcome; `None` when nothing should change
pub(super) fn results_view(outcome: SessionOutcome, locale: DateLocale) -> Option<ResultsView> {
    match outcome {
        SessionOutcome::Loaded {
            result,
            filters,
            links,
        } => {
            let cards = result
                .posts
                .iter()
                .map(|post| PostCard::from_archive(post, result.is_favorited(&post.id), locale))
                .collect();
            Some(ResultsView::page(
                cards,
                result.page,
                result.page_size,
                result.total,
                PaginationView::new(&links, &filters),
            ))
        }
        SessionOutcome::Failed {
            error,
            filters,
            links,
        } => {
            tracing::warn!(%error, "Browse page failed to load");
            Some(ResultsView::error(PaginationView::new(&links, &filters)))
        }
        SessionOutcome::Superseded | SessionOutcome::Unchanged => None,
    }
}

async fn session_event(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    jar: CookieJar,
    Json(event): Json<BrowseEvent>,
) -> Result<Response, AppError> {
    let (jar, session_id) = browse_session(jar, state.config.should_use_secure_cookies());
    let searched = match &event {
        BrowseEvent::SearchInput { term } | BrowseEvent::SearchSubmit { term } => {
            Some(term.clone())
        }
        _ => None,
    };

    let outcome = state
        .sessions
        .dispatch(&session_id, event, user.user_id())
        .await?;

    if let (Some(user_id), Some(term), SessionOutcome::Loaded { filters, .. }) =
        (user.user_id(), searched.as_deref(), &outcome)
    {
        state
            .activity
            .record_search(user_id, term, filters.page_href(1))
            .await;
    }

    let response = match results_view(outcome, locale(&headers)) {
        Some(results) => render::html(&ResultsFragment { results }),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok((jar, response).into_response())
}
