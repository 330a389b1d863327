//! In-memory caches
//!
//! These caches are volatile and cleared on restart.
//! Uses Moka for high-performance concurrent caching.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::models::PostKind;

// =============================================================================
// Popular tags
// =============================================================================

/// Tag with its number of occurrences across archive posts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Popular tag cache (single entry, TTL bound)
///
/// Computing popular tags scans every archive post's tag list, so the
/// result is shared between requests until it expires.
pub struct PopularTagsCache {
    entries: Cache<(), Arc<Vec<TagCount>>>,
}

impl PopularTagsCache {
    /// Create new popular tags cache
    ///
    /// # Arguments
    /// * `ttl` - How long a computed ranking stays valid
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { entries }
    }

    pub async fn get(&self) -> Option<Arc<Vec<TagCount>>> {
        let result = self.entries.get(&()).await;

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["popular_tags"]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&["popular_tags"]).inc();
        }

        result
    }

    pub async fn insert(&self, tags: Vec<TagCount>) -> Arc<Vec<TagCount>> {
        let tags = Arc::new(tags);
        self.entries.insert((), tags.clone()).await;
        tags
    }

    /// Drop the cached ranking (after a publish or edit)
    pub async fn invalidate(&self) {
        self.entries.invalidate(&()).await;
    }
}

// =============================================================================
// Recent activity
// =============================================================================

/// Maximum activities kept per user
pub const MAX_ACTIVITIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ViewPost,
    Search,
    Browse,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewPost => "view_post",
            Self::Search => "search",
            Self::Browse => "browse",
        }
    }
}

/// One entry of a user's recent activity list
#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    /// De-duplication key
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_type: Option<PostKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    /// Build an activity and derive its de-duplication key
    ///
    /// Views are keyed by post, searches by normalised title and browse
    /// events by time, so only the first two collapse.
    pub fn new(
        kind: ActivityKind,
        title: impl Into<String>,
        url: impl Into<String>,
        post: Option<(PostKind, String)>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let id = match (&kind, &post) {
            (ActivityKind::ViewPost, Some((post_kind, post_id))) => {
                format!("view_post_{post_kind}_{post_id}")
            }
            (ActivityKind::Search, _) => format!(
                "search_{}",
                title
                    .to_lowercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_")
            ),
            _ => format!("{}_{}", kind.as_str(), timestamp.timestamp_millis()),
        };

        let (post_type, post_id) = match post {
            Some((post_kind, post_id)) => (Some(post_kind), Some(post_id)),
            None => (None, None),
        };

        Self {
            id,
            kind,
            title,
            url: url.into(),
            post_type,
            post_id,
            timestamp,
        }
    }
}

/// Per-user recent activity, newest first
pub struct RecentActivityCache {
    /// User ID -> activities
    activities: Cache<String, Arc<Vec<Activity>>>,
}

impl RecentActivityCache {
    pub fn new(max_users: u64, idle: Duration) -> Self {
        let activities = Cache::builder()
            .max_capacity(max_users)
            .time_to_idle(idle)
            .build();
        Self { activities }
    }

    /// Record an activity, replacing any earlier entry with the same id
    pub async fn record(&self, user_id: &str, activity: Activity) {
        let current = self.activities.get(user_id).await.unwrap_or_default();
        let mut next: Vec<Activity> = Vec::with_capacity(MAX_ACTIVITIES);
        next.extend(
            current
                .iter()
                .filter(|existing| existing.id != activity.id)
                .cloned(),
        );
        next.insert(0, activity);
        next.truncate(MAX_ACTIVITIES);
        self.activities
            .insert(user_id.to_string(), Arc::new(next))
            .await;

        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE
            .with_label_values(&["recent_activity"])
            .set(self.activities.entry_count() as i64);
    }

    pub async fn list(&self, user_id: &str) -> Vec<Activity> {
        self.activities
            .get(user_id)
            .await
            .map(|list| list.as_ref().clone())
            .unwrap_or_default()
    }

    pub async fn clear(&self, user_id: &str) {
        self.activities.invalidate(user_id).await;
    }
}
