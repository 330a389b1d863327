//! Post service
//!
//! Single-post reads, view and download counting, publishing, editing and
//! the author's own post lists.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as Json;

use super::browse::parse_archive_rows;
use super::counters::{Counter, CounterService, CounterUpdate};
use super::publish::{ArchiveForm, CollabForm};
use crate::data::{
    ArchiveBody, ArchivePost, CollabPost, DataService, Expr, Order, Post, PostKind, Select, Table,
    Value,
};
use crate::error::AppError;
use crate::metrics::INVALID_ROWS_TOTAL;
use crate::render::{download_filename, export_text};

/// What a download request resolves to
#[derive(Debug, Clone)]
pub enum Download {
    /// Text export served as an attachment
    Text {
        filename: String,
        body: String,
        downloads: CounterUpdate,
    },
    /// Embedded posts download from their link
    Redirect { url: String, downloads: CounterUpdate },
}

pub struct PostService {
    data: Arc<dyn DataService>,
    counters: Arc<CounterService>,
}

impl PostService {
    pub fn new(data: Arc<dyn DataService>, counters: Arc<CounterService>) -> Self {
        Self { data, counters }
    }

    /// Fetch one post with its author
    ///
    /// # Errors
    /// `NotFound` when the post does not exist or its row is invalid.
    pub async fn get(&self, kind: PostKind, id: &str) -> Result<Post, AppError> {
        let query = Select::from(kind.table())
            .with_author()
            .filter(Expr::eq("id", Value::text(id)));
        let row = self
            .data
            .select(&query)
            .await?
            .rows
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)?;

        Post::from_row(kind, row).map_err(|error| {
            INVALID_ROWS_TOTAL
                .with_label_values(&[kind.table().as_str()])
                .inc();
            tracing::warn!(%error, "Post row failed validation");
            AppError::NotFound
        })
    }

    /// Count a view of `post`, updating its displayed view count
    pub async fn record_view(&self, post: &mut Post) -> CounterUpdate {
        let update = self
            .counters
            .apply(post.kind(), post.id(), Counter::Views, 1, post.views())
            .await;
        post.set_views(update.value);
        update
    }

    /// Resolve a download and count it
    pub async fn download(&self, kind: PostKind, id: &str) -> Result<Download, AppError> {
        if kind != PostKind::Archive {
            return Err(AppError::Validation(
                "Downloads are only available for archive posts".to_string(),
            ));
        }
        let Post::Archive(post) = self.get(kind, id).await? else {
            return Err(AppError::NotFound);
        };

        let embed = match &post.body {
            ArchiveBody::Embedded(raw) => Some(
                crate::render::format::safe_embed_url(raw).ok_or_else(|| {
                    AppError::Unprocessable("This post's link cannot be opened".to_string())
                })?,
            ),
            ArchiveBody::Text(_) => None,
        };

        let downloads = self
            .counters
            .apply(kind, &post.id, Counter::Downloads, 1, post.downloads)
            .await;

        if let Some(url) = embed {
            return Ok(Download::Redirect { url, downloads });
        }
        let body = export_text(&post, Utc::now()).ok_or(AppError::NotFound)?;
        Ok(Download::Text {
            filename: download_filename(&post.title),
            body,
            downloads,
        })
    }

    pub async fn publish_archive(
        &self,
        user_id: &str,
        form: &ArchiveForm,
    ) -> Result<ArchivePost, AppError> {
        let row = with_author(form.validate()?, user_id);
        let stored = self.data.insert(Table::ArchivePosts, row).await?;
        let post = ArchivePost::from_row(stored).map_err(anyhow::Error::from)?;
        tracing::info!(post_id = %post.id, user_id, "Archive post published");
        Ok(post)
    }

    pub async fn publish_collab(
        &self,
        user_id: &str,
        form: &CollabForm,
    ) -> Result<CollabPost, AppError> {
        let row = with_author(form.validate()?, user_id);
        let stored = self.data.insert(Table::CollabPosts, row).await?;
        let Post::Collab(post) =
            Post::from_row(PostKind::Collab, stored).map_err(anyhow::Error::from)?
        else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "collab insert returned another kind"
            )));
        };
        tracing::info!(post_id = %post.id, user_id, "Collab post published");
        Ok(post)
    }

    /// Replace the editable fields of the viewer's own post
    ///
    /// # Errors
    /// `Forbidden` when the post belongs to someone else.
    pub async fn update(
        &self,
        user_id: &str,
        kind: PostKind,
        id: &str,
        fields: Json,
    ) -> Result<Post, AppError> {
        let existing = self.get(kind, id).await?;
        if existing.user_id() != user_id {
            tracing::warn!(post_id = id, user_id, "Rejected edit of another user's post");
            return Err(AppError::Forbidden);
        }

        let filter = Expr::And(vec![
            Expr::eq("id", Value::text(id)),
            Expr::eq("user_id", Value::text(user_id)),
        ]);
        let row = self
            .data
            .update(kind.table(), &filter, fields)
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)?;
        tracing::info!(post_id = id, user_id, kind = kind.as_str(), "Post updated");
        Ok(Post::from_row(kind, row).map_err(anyhow::Error::from)?)
    }

    pub async fn update_archive(
        &self,
        user_id: &str,
        id: &str,
        form: &ArchiveForm,
    ) -> Result<Post, AppError> {
        let fields = form.validate()?;
        self.update(user_id, PostKind::Archive, id, fields).await
    }

    pub async fn update_collab(
        &self,
        user_id: &str,
        id: &str,
        form: &CollabForm,
    ) -> Result<Post, AppError> {
        let fields = form.validate()?;
        self.update(user_id, PostKind::Collab, id, fields).await
    }

    /// The user's own posts, newest first
    pub async fn by_author(
        &self,
        user_id: &str,
    ) -> Result<(Vec<ArchivePost>, Vec<CollabPost>), AppError> {
        let query = |table| {
            Select::from(table)
                .filter(Expr::eq("user_id", Value::text(user_id)))
                .order_by(Order::desc("created_at"))
        };

        let archive_query = query(Table::ArchivePosts);
        let collab_query = query(Table::CollabPosts);
        let (archive, collab) = tokio::try_join!(
            self.data.select(&archive_query),
            self.data.select(&collab_query),
        )?;

        let archive = parse_archive_rows(archive.rows);
        let collab = collab
            .rows
            .into_iter()
            .filter_map(|row| match Post::from_row(PostKind::Collab, row) {
                Ok(Post::Collab(post)) => Some(post),
                Ok(Post::Archive(_)) => None,
                Err(error) => {
                    INVALID_ROWS_TOTAL
                        .with_label_values(&[Table::CollabPosts.as_str()])
                        .inc();
                    tracing::warn!(%error, "Skipping invalid collab post");
                    None
                }
            })
            .collect();

        Ok((archive, collab))
    }
}

fn with_author(mut row: Json, user_id: &str) -> Json {
    row["user_id"] = Json::from(user_id);
    row
}
