//! Browse service
//!
//! Runs one page query for a filter state and attaches the viewer's
//! favorite flags. Either the whole page succeeds or the caller gets one
//! error; partial pages are never returned.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::data::{ArchivePost, DataService, Expr, PostKind, Select, Table, Value};
use crate::error::AppError;
use crate::metrics::{BROWSE_QUERIES_TOTAL, INVALID_ROWS_TOTAL};
use crate::query::{FilterState, build_browse_query};

/// One page of archive posts
#[derive(Debug, Clone)]
pub struct PageResult {
    pub posts: Vec<ArchivePost>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    /// Ids of posts on this page the viewer has favorited
    pub favorited: HashSet<String>,
}

impl PageResult {
    pub fn is_favorited(&self, post_id: &str) -> bool {
        self.favorited.contains(post_id)
    }
}

pub struct BrowseService {
    data: Arc<dyn DataService>,
    page_size: u32,
}

impl BrowseService {
    pub fn new(data: Arc<dyn DataService>, page_size: u32) -> Self {
        Self { data, page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch `page` of the posts matching `filters`
    ///
    /// # Errors
    /// Validation errors before any request; `AppError::Remote` if either
    /// the page query or the favorites lookup fails.
    pub async fn fetch_page(
        &self,
        filters: &FilterState,
        page: u32,
        viewer: Option<&str>,
    ) -> Result<PageResult, AppError> {
        let query = build_browse_query(filters, page, self.page_size)?;
        let sort = filters.sort.as_str();

        let result = self.run(&query, page, viewer).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        BROWSE_QUERIES_TOTAL
            .with_label_values(&[sort, outcome])
            .inc();
        result
    }

    async fn run(
        &self,
        query: &Select,
        page: u32,
        viewer: Option<&str>,
    ) -> Result<PageResult, AppError> {
        let rows = self.data.select(query).await?;
        let total = rows.total.unwrap_or(rows.rows.len() as u64);
        let posts = parse_archive_rows(rows.rows);

        let favorited = match viewer {
            Some(user_id) if !posts.is_empty() => self.favorited_ids(user_id, &posts).await?,
            _ => HashSet::new(),
        };

        tracing::debug!(page, total, shown = posts.len(), "Browse page loaded");

        Ok(PageResult {
            posts,
            total,
            page,
            page_size: self.page_size,
            favorited,
        })
    }

    /// Single lookup of the viewer's favorites among `posts`
    async fn favorited_ids(
        &self,
        user_id: &str,
        posts: &[ArchivePost],
    ) -> Result<HashSet<String>, AppError> {
        let ids = posts.iter().map(|p| Value::text(p.id.clone())).collect();
        let query = Select::from(Table::UserFavorites)
            .columns("post_id")
            .filter(Expr::And(vec![
                Expr::eq("user_id", Value::text(user_id)),
                Expr::eq("post_type", Value::text(PostKind::Archive.as_str())),
                Expr::is_in("post_id", ids),
            ]));

        let rows = self.data.select(&query).await?;
        Ok(rows
            .rows
            .iter()
            .filter_map(|row| match &row["post_id"] {
                Json::String(id) => Some(id.clone()),
                Json::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .collect())
    }
}

/// Parse archive rows, skipping and counting the invalid ones
pub fn parse_archive_rows(rows: Vec<Json>) -> Vec<ArchivePost> {
    rows.into_iter()
        .filter_map(|row| match ArchivePost::from_row(row) {
            Ok(post) => Some(post),
            Err(error) => {
                INVALID_ROWS_TOTAL
                    .with_label_values(&[Table::ArchivePosts.as_str()])
                    .inc();
                tracing::warn!(%error, "Skipping invalid archive post");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FailOp, MemoryDataService};
    use serde_json::json;

    async fn seeded() -> Arc<MemoryDataService> {
        let data = Arc::new(MemoryDataService::new());
        data.seed(
            Table::ArchivePosts,
            (1..=5).map(|i| {
                json!({
                    "id": format!("p{i}"),
                    "user_id": "author",
                    "title": format!("Post {i}"),
                    "ai_model": "GPT-4",
                    "prompt": "prompt",
                    "content": "content",
                    "tags": ["game"],
                    "created_at": format!("2024-01-0{i}T00:00:00Z"),
                })
            }),
        )
        .await;
        data.seed(
            Table::ArchivePosts,
            [json!({"id": "broken", "title": "No body", "ai_model": "GPT-4", "created_at": "2024-01-09T00:00:00Z"})],
        )
        .await;
        data.seed(
            Table::UserFavorites,
            [json!({
                "user_id": "viewer",
                "post_id": "p5",
                "post_type": "archive",
                "post_title": "Post 5",
            })],
        )
        .await;
        data
    }

    #[tokio::test]
    async fn page_skips_invalid_rows_and_flags_favorites() {
        let data = seeded().await;
        let service = BrowseService::new(data.clone(), 12);
        let page = service
            .fetch_page(&FilterState::default(), 1, Some("viewer"))
            .await
            .unwrap();

        assert_eq!(page.posts.len(), 5);
        assert_eq!(page.posts[0].id, "p5");
        assert!(page.is_favorited("p5"));
        assert!(!page.is_favorited("p4"));
    }

    #[tokio::test]
    async fn favorites_lookup_failure_fails_the_page() {
        let data = seeded().await;
        data.fail_next(Table::UserFavorites, FailOp::Select, 1).await;
        let service = BrowseService::new(data.clone(), 12);
        let result = service
            .fetch_page(&FilterState::default(), 1, Some("viewer"))
            .await;
        assert!(matches!(result, Err(AppError::Remote(_))));
    }

    #[tokio::test]
    async fn invalid_page_never_reaches_the_backend() {
        let data = seeded().await;
        let service = BrowseService::new(data.clone(), 12);
        let result = service.fetch_page(&FilterState::default(), 0, None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(data.select_calls(), 0);
    }
}
