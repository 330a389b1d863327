//! Popular tags

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::data::{DataService, PopularTagsCache, Select, Table, TagCount};
use crate::error::AppError;

pub struct TagService {
    data: Arc<dyn DataService>,
    cache: Arc<PopularTagsCache>,
    limit: usize,
}

impl TagService {
    pub fn new(data: Arc<dyn DataService>, cache: Arc<PopularTagsCache>, limit: usize) -> Self {
        Self { data, cache, limit }
    }

    /// Most used archive tags, most frequent first
    pub async fn popular(&self) -> Result<Arc<Vec<TagCount>>, AppError> {
        if let Some(tags) = self.cache.get().await {
            return Ok(tags);
        }

        let rows = self
            .data
            .select(&Select::from(Table::ArchivePosts).columns("tags"))
            .await?;
        let ranked = rank_tags(rows.rows.iter().map(|row| &row["tags"]), self.limit);
        tracing::debug!(tags = ranked.len(), "Popular tags recomputed");
        Ok(self.cache.insert(ranked).await)
    }

    /// Drop the cached ranking after posts change
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }
}

/// Count tags across posts; ties are ordered alphabetically
pub fn rank_tags<'a>(tag_lists: impl Iterator<Item = &'a Json>, limit: usize) -> Vec<TagCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for list in tag_lists {
        let Some(list) = list.as_array() else {
            continue;
        };
        for tag in list.iter().filter_map(Json::as_str) {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() {
                *counts.entry(tag).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ranked.truncate(limit);
    ranked
}
