//! Server-rendered pages
//!
//! Views are computed in [`views`], formatted with [`format`] and printed
//! by the askama templates under `templates/`.

pub mod export;
pub mod format;
pub mod views;

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

pub use export::{download_filename, export_text};
pub use format::DateLocale;
pub use views::{
    Choice, FavoriteItem, FilterControls, PaginationView, PostCard, PostView, ProfilePostItem,
    ResultsState, ResultsView, TagChip,
};

/// Header shared by every page
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub signed_in: bool,
    pub name: String,
}

#[derive(Template)]
#[template(path = "browse.html")]
pub struct BrowsePage {
    pub viewer: Viewer,
    pub filters: FilterControls,
    pub popular_tags: Vec<TagChip>,
    pub results: ResultsView,
    pub loading: ResultsView,
}

/// Results area alone, swapped in after a filter or page change
#[derive(Template)]
#[template(path = "browse_results.html")]
pub struct ResultsFragment {
    pub results: ResultsView,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostPage {
    pub viewer: Viewer,
    pub post: PostView,
}

#[derive(Template)]
#[template(path = "favorites.html")]
pub struct FavoritesPage {
    pub viewer: Viewer,
    pub filter: String,
    pub items: Vec<FavoriteItem>,
    pub empty_message: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub viewer: Viewer,
    pub archive_posts: Vec<ProfilePostItem>,
    pub collab_posts: Vec<ProfilePostItem>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub viewer: Viewer,
    pub status: u16,
    pub message: String,
}

/// Render a template into an HTML response
///
/// A template failure is logged and answered with a minimal static page.
pub fn html<T: Template>(template: &T) -> Response {
    html_with_status(StatusCode::OK, template)
}

pub fn html_with_status<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(error) => {
            tracing::error!(%error, "Template rendering failed");
            fallback_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Styled error page for browser routes
pub fn error_page(viewer: Viewer, status: StatusCode, message: &str) -> Response {
    let page = ErrorPage {
        viewer,
        status: status.as_u16(),
        message: message.to_string(),
    };
    html_with_status(status, &page)
}

fn fallback_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html><html><head><title>DeepWiki.io</title></head>\
         <body><h1>{}</h1><p>{}</p></body></html>",
        status.as_u16(),
        html_escape::encode_text(message)
    );
    (status, Html(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterState;

    fn results_page(results: ResultsView) -> String {
        ResultsFragment { results }.render().unwrap()
    }

    #[test]
    fn fragment_shows_each_state_message() {
        let loading = results_page(ResultsView::loading());
        assert!(loading.contains("Loading archive posts..."));

        let empty = results_page(ResultsView::page(
            Vec::new(),
            1,
            12,
            0,
            PaginationView::default(),
        ));
        assert!(empty.contains("No archive posts found"));
        assert!(!empty.contains("Loading archive posts..."));

        let error = results_page(ResultsView::error(PaginationView::default()));
        assert!(error.contains("Failed to load posts. Please try again."));
    }

    #[test]
    fn browse_page_escapes_search_term() {
        let mut filters = FilterState::default();
        filters.term = "<b>game</b>".to_string();
        let page = BrowsePage {
            viewer: Viewer::default(),
            filters: FilterControls::new(&filters),
            popular_tags: Vec::new(),
            results: ResultsView::loading(),
            loading: ResultsView::loading(),
        };
        let body = page.render().unwrap();
        assert!(!body.contains("<b>game</b>"));
        assert!(body.contains("&lt;b&gt;game&lt;/b&gt;"));
    }

    #[test]
    fn fallback_page_escapes_message() {
        let response = fallback_page(StatusCode::INTERNAL_SERVER_ERROR, "<oops>");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
