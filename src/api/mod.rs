//! API layer
//!
//! HTTP handlers for:
//! - Browse, post, favorites and profile pages (HTML)
//! - Browse session events (HTML fragments)
//! - Favorites, publishing and editing (JSON)
//! - Popular tags and recent activity (JSON)
//! - Metrics (Prometheus)

mod activity;
mod browse;
mod favorites;
pub mod metrics;
mod pages;
mod posts;

use axum::http::{HeaderMap, header};
use axum::response::Response;

pub use activity::activity_router;
pub use browse::browse_router;
pub use favorites::favorites_router;
pub use metrics::{metrics_router, track_requests};
pub use pages::pages_router;
pub use posts::posts_router;

use crate::data::PostKind;
use crate::error::AppError;
use crate::metrics::ERRORS_TOTAL;
use crate::render::{DateLocale, Viewer, error_page};

/// Post kind from a path segment; unknown kinds are not found
fn parse_kind(raw: &str) -> Result<PostKind, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// Date locale preferred by the browser
fn locale(headers: &HeaderMap) -> DateLocale {
    DateLocale::from_accept_language(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok()),
    )
}

/// Render an error as a full page for browser routes
fn page_error(viewer: Viewer, error: AppError, endpoint: &str) -> Response {
    let (status, kind) = error.status_and_kind();
    if status.is_server_error() {
        tracing::error!(error = %error, kind, endpoint, "Page request failed");
    } else {
        tracing::debug!(error = %error, kind, endpoint, "Page request rejected");
    }
    ERRORS_TOTAL.with_label_values(&[kind, endpoint]).inc();

    let message = match error {
        AppError::Unauthorized => "Please sign in to continue.".to_string(),
        other => other.user_message(),
    };
    error_page(viewer, status, &message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn unknown_kind_is_not_found() {
        assert_eq!(parse_kind("collab").unwrap(), PostKind::Collab);
        assert!(matches!(parse_kind("status"), Err(AppError::NotFound)));
    }

    #[test]
    fn locale_follows_accept_language() {
        let mut headers = HeaderMap::new();
        assert_eq!(locale(&headers), DateLocale::Iso);
        headers.insert(header::ACCEPT_LANGUAGE, "de-DE,de;q=0.9".parse().unwrap());
        assert_eq!(locale(&headers), DateLocale::German);
    }

    #[test]
    fn page_errors_keep_their_status() {
        let response = page_error(Viewer::default(), AppError::NotFound, "test");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
