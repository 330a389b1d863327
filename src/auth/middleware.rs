//! Authentication middleware and extractors

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use super::session::{Session, verify_session_token};
use crate::AppState;
use crate::error::AppError;
use crate::render::Viewer;

/// Cookie carrying the session token
pub const SESSION_TOKEN_COOKIE: &str = "session";

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_owned())
        })
}

fn session_from_parts(parts: &mut Parts, state: &AppState) -> Result<Session, AppError> {
    if let Some(session) = parts.extensions.get::<Session>() {
        return Ok(session.clone());
    }
    let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
    let session = verify_session_token(&token, &state.config.auth.session_secret)?;
    parts.extensions.insert(session.clone());
    Ok(session)
}

/// Middleware to require authentication
///
/// Adds the verified [`Session`] to the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token_from_headers(request.headers()).ok_or(AppError::Unauthorized)?;
    let session = verify_session_token(&token, &state.config.auth.session_secret)?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Signed-in user; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        session_from_parts(parts, &state).map(CurrentUser)
    }
}

/// Optional current user
///
/// Invalid or expired tokens count as signed out.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|session| session.user_id.as_str())
    }

    /// Page header state for this visitor
    pub fn viewer(&self) -> Viewer {
        match &self.0 {
            Some(session) => Viewer {
                signed_in: true,
                name: session.display_label(),
            },
            None => Viewer::default(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(MaybeUser(session_from_parts(parts, &state).ok()))
    }
}
