//! Favorites service
//!
//! A favorite row stores a snapshot of the post so the favorites page
//! renders without joining back to the post tables. The post's
//! `favorite_count` moves with every add and remove. When that increment does
//! not commit, the count is reset from the favorite rows that exist.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::counters::{Counter, CounterService, CounterUpdate};
use super::posts::PostService;
use crate::data::{
    DataService, Expr, Favorite, Order, PostKind, RemoteError, Select, Table, Value,
};
use crate::error::AppError;
use crate::metrics::{FAVORITES_TOTAL, INVALID_ROWS_TOTAL};

/// Favorite state of a post after a change
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FavoriteChange {
    pub favorited: bool,
    pub favorite_count: CounterUpdate,
}

pub struct FavoriteService {
    data: Arc<dyn DataService>,
    posts: Arc<PostService>,
    counters: Arc<CounterService>,
}

impl FavoriteService {
    pub fn new(
        data: Arc<dyn DataService>,
        posts: Arc<PostService>,
        counters: Arc<CounterService>,
    ) -> Self {
        Self {
            data,
            posts,
            counters,
        }
    }

    /// Add a post to the user's favorites
    ///
    /// # Errors
    /// `AlreadyFavorited` when the favorite exists; the count is untouched.
    pub async fn add(
        &self,
        user_id: &str,
        kind: PostKind,
        post_id: &str,
    ) -> Result<FavoriteChange, AppError> {
        let post = self.posts.get(kind, post_id).await?;

        let row = json!({
            "user_id": user_id,
            "post_id": post.id(),
            "post_type": kind.as_str(),
            "post_title": post.title(),
            "post_data": post.snapshot(),
        });
        match self.data.insert(Table::UserFavorites, row).await {
            Ok(_) => {}
            Err(RemoteError::UniqueViolation) => return Err(AppError::AlreadyFavorited),
            Err(error) => return Err(error.into()),
        }

        FAVORITES_TOTAL
            .with_label_values(&["add", kind.as_str()])
            .inc();
        let update = self
            .counters
            .apply(kind, post.id(), Counter::Favorites, 1, post.favorite_count())
            .await;
        let favorite_count = self.settle_count(kind, post.id(), update).await;
        tracing::info!(user_id, post_id, kind = kind.as_str(), "Favorite added");

        Ok(FavoriteChange {
            favorited: true,
            favorite_count,
        })
    }

    /// Remove the user's favorite of a post
    pub async fn remove(
        &self,
        user_id: &str,
        kind: PostKind,
        post_id: &str,
    ) -> Result<FavoriteChange, AppError> {
        let filter = Expr::And(vec![
            Expr::eq("user_id", Value::text(user_id)),
            Expr::eq("post_id", Value::text(post_id)),
            Expr::eq("post_type", Value::text(kind.as_str())),
        ]);
        let removed = self.data.delete(Table::UserFavorites, &filter).await?;
        if removed.is_empty() {
            return Err(AppError::NotFound);
        }
        let favorite_count = self.after_removal(kind, post_id).await;

        Ok(FavoriteChange {
            favorited: false,
            favorite_count,
        })
    }

    /// Remove a favorite by its own id; only its owner may
    pub async fn remove_by_id(&self, user_id: &str, favorite_id: &str) -> Result<(), AppError> {
        let filter = Expr::And(vec![
            Expr::eq("id", Value::text(favorite_id)),
            Expr::eq("user_id", Value::text(user_id)),
        ]);
        let removed = self.data.delete(Table::UserFavorites, &filter).await?;
        let Some(row) = removed.into_iter().next() else {
            return Err(AppError::NotFound);
        };

        match Favorite::from_row(row) {
            Ok(favorite) => {
                self.after_removal(favorite.post_kind, &favorite.post_id)
                    .await;
            }
            Err(error) => tracing::warn!(%error, "Removed favorite row failed validation"),
        }
        Ok(())
    }

    async fn after_removal(&self, kind: PostKind, post_id: &str) -> CounterUpdate {
        FAVORITES_TOTAL
            .with_label_values(&["remove", kind.as_str()])
            .inc();

        // The post may be gone; its counter then has nothing to follow.
        let displayed = match self.posts.get(kind, post_id).await {
            Ok(post) => post.favorite_count(),
            Err(_) => {
                return CounterUpdate {
                    value: 0,
                    committed: false,
                };
            }
        };
        let update = self
            .counters
            .apply(kind, post_id, Counter::Favorites, -1, displayed)
            .await;
        let update = self.settle_count(kind, post_id, update).await;
        tracing::info!(post_id, kind = kind.as_str(), "Favorite removed");
        update
    }

    async fn settle_count(
        &self,
        kind: PostKind,
        post_id: &str,
        update: CounterUpdate,
    ) -> CounterUpdate {
        if update.committed {
            return update;
        }
        match self.reconcile_count(kind, post_id).await {
            Ok(value) => {
                tracing::info!(post_id, kind = kind.as_str(), value, "Favorite count reconciled");
                CounterUpdate {
                    value,
                    committed: true,
                }
            }
            Err(error) => {
                tracing::error!(%error, post_id, kind = kind.as_str(), "Favorite count not reconciled");
                update
            }
        }
    }

    /// Reset `favorite_count` to the number of favorite rows for the post
    async fn reconcile_count(&self, kind: PostKind, post_id: &str) -> Result<i64, RemoteError> {
        let query = Select::from(Table::UserFavorites)
            .columns("id")
            .filter(Expr::And(vec![
                Expr::eq("post_id", Value::text(post_id)),
                Expr::eq("post_type", Value::text(kind.as_str())),
            ]))
            .window(0, 1)
            .count_exact();
        let total = self
            .data
            .select(&query)
            .await?
            .total
            .ok_or_else(|| RemoteError::Decode("favorites count missing".to_string()))?;
        let value = i64::try_from(total)
            .map_err(|_| RemoteError::Decode(format!("favorites count: {total}")))?;

        self.data
            .update(
                kind.table(),
                &Expr::eq("id", Value::text(post_id)),
                json!({ "favorite_count": value }),
            )
            .await?;
        Ok(value)
    }

    /// The user's favorites, newest first, optionally of one kind
    pub async fn list(
        &self,
        user_id: &str,
        kind: Option<PostKind>,
    ) -> Result<Vec<Favorite>, AppError> {
        let mut conditions = vec![Expr::eq("user_id", Value::text(user_id))];
        if let Some(kind) = kind {
            conditions.push(Expr::eq("post_type", Value::text(kind.as_str())));
        }
        let query = Select::from(Table::UserFavorites)
            .filter_opt(Expr::all(conditions))
            .order_by(Order::desc("created_at"));

        let rows = self.data.select(&query).await?;
        Ok(rows
            .rows
            .into_iter()
            .filter_map(|row| match Favorite::from_row(row) {
                Ok(favorite) => Some(favorite),
                Err(error) => {
                    INVALID_ROWS_TOTAL
                        .with_label_values(&[Table::UserFavorites.as_str()])
                        .inc();
                    tracing::warn!(%error, "Skipping invalid favorite");
                    None
                }
            })
            .collect())
    }

    pub async fn is_favorited(
        &self,
        user_id: &str,
        kind: PostKind,
        post_id: &str,
    ) -> Result<bool, AppError> {
        let query = Select::from(Table::UserFavorites)
            .columns("id")
            .filter(Expr::And(vec![
                Expr::eq("user_id", Value::text(user_id)),
                Expr::eq("post_id", Value::text(post_id)),
                Expr::eq("post_type", Value::text(kind.as_str())),
            ]))
            .window(0, 1);
        Ok(!self.data.select(&query).await?.rows.is_empty())
    }
}
