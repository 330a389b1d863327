//! Recent activity
//!
//! Signed-in users get a short, volatile history of what they viewed,
//! searched and browsed.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Activity, ActivityKind, Post, RecentActivityCache};
use crate::render::views::post_href;

pub struct ActivityService {
    cache: Arc<RecentActivityCache>,
}

impl ActivityService {
    pub fn new(cache: Arc<RecentActivityCache>) -> Self {
        Self { cache }
    }

    pub async fn record_view(&self, user_id: &str, post: &Post) {
        let activity = Activity::new(
            ActivityKind::ViewPost,
            post.title(),
            post_href(post.kind(), post.id()),
            Some((post.kind(), post.id().to_string())),
            Utc::now(),
        );
        self.cache.record(user_id, activity).await;
    }

    /// `url` reproduces the search on the browse page
    pub async fn record_search(&self, user_id: &str, term: &str, url: String) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        let activity = Activity::new(ActivityKind::Search, term, url, None, Utc::now());
        self.cache.record(user_id, activity).await;
    }

    pub async fn record_browse(&self, user_id: &str, url: String) {
        let activity = Activity::new(
            ActivityKind::Browse,
            "Browsed archive posts",
            url,
            None,
            Utc::now(),
        );
        self.cache.record(user_id, activity).await;
    }

    pub async fn list(&self, user_id: &str) -> Vec<Activity> {
        self.cache.list(user_id).await
    }

    pub async fn clear(&self, user_id: &str) {
        self.cache.clear(user_id).await;
        tracing::debug!(user_id, "Recent activity cleared");
    }
}
