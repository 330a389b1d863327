//! View models
//!
//! Everything a template prints is computed here as plain strings and
//! flags. Templates escape all of it.

use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use super::format::{
    CARD_PREVIEW_CHARS, CARD_TAG_LIMIT, DateLocale, EMBEDDED_PREVIEW, LONG_PREVIEW_CHARS,
    PROMPT_PREVIEW_CHARS, author_name, safe_embed_url, stats_line, time_ago, truncate,
    visible_tags,
};
use crate::data::{ArchiveBody, ArchivePost, CollabPost, Favorite, Post, PostKind};
use crate::query::{AiModelCategory, FilterState, PageLinks, SortOrder};

pub const LOADING_MESSAGE: &str = "Loading archive posts...";
pub const EMPTY_MESSAGE: &str = "No archive posts found";
pub const ERROR_MESSAGE: &str = "Failed to load posts. Please try again.";
pub const PRIVATE_PROMPT_NOTICE: &str = "[Prompt kept private by author]";

pub fn post_href(kind: PostKind, id: &str) -> String {
    format!("/posts/{kind}/{}", urlencoding::encode(id))
}

// =============================================================================
// Browse
// =============================================================================

/// One archive post card on the browse page
#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: String,
    pub href: String,
    pub title: String,
    pub author: String,
    pub date: String,
    pub ai_model: String,
    pub preview: String,
    pub embedded: bool,
    pub prompt_private: bool,
    pub tags: Vec<String>,
    pub more_tags: Option<String>,
    pub views: i64,
    pub downloads: i64,
    pub favorite_count: i64,
    pub favorited: bool,
}

impl PostCard {
    pub fn from_archive(post: &ArchivePost, favorited: bool, locale: DateLocale) -> Self {
        let (tags, more_tags) = visible_tags(&post.tags, CARD_TAG_LIMIT);
        let preview = match &post.body {
            ArchiveBody::Text(content) => truncate(content, CARD_PREVIEW_CHARS),
            ArchiveBody::Embedded(_) => EMBEDDED_PREVIEW.to_string(),
        };

        Self {
            id: post.id.clone(),
            href: post_href(PostKind::Archive, &post.id),
            title: post.title.clone(),
            author: author_name(post.author.as_ref()),
            date: locale.format_timestamp(post.created_at),
            ai_model: post.ai_model.clone(),
            preview,
            embedded: matches!(post.body, ArchiveBody::Embedded(_)),
            prompt_private: !post.prompt_is_public,
            tags,
            more_tags,
            views: post.views,
            downloads: post.downloads,
            favorite_count: post.favorite_count,
            favorited,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageLinkView {
    pub number: u32,
    pub href: String,
    pub current: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PaginationView {
    pub previous: Option<PageLinkView>,
    pub next: Option<PageLinkView>,
    pub pages: Vec<PageLinkView>,
}

impl PaginationView {
    pub fn new(links: &PageLinks, filters: &FilterState) -> Self {
        let link = |number: u32, current: bool| PageLinkView {
            number,
            href: filters.page_href(number),
            current,
        };
        Self {
            previous: links.previous.map(|n| link(n, false)),
            next: links.next.map(|n| link(n, false)),
            pages: links.pages.iter().map(|p| link(p.number, p.current)).collect(),
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.pages.is_empty()
    }
}

/// Which of the four result states is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsState {
    Loading,
    Empty,
    Error,
    Results,
}

/// Results area: state, message, stats, cards, page links
#[derive(Debug, Clone)]
pub struct ResultsView {
    pub state: ResultsState,
    pub message: String,
    pub stats: String,
    pub cards: Vec<PostCard>,
    pub pagination: PaginationView,
}

impl ResultsView {
    pub fn loading() -> Self {
        Self {
            state: ResultsState::Loading,
            message: LOADING_MESSAGE.to_string(),
            stats: String::new(),
            cards: Vec::new(),
            pagination: PaginationView::default(),
        }
    }

    /// Failure view; `pagination` is whatever was shown before
    pub fn error(pagination: PaginationView) -> Self {
        Self {
            state: ResultsState::Error,
            message: ERROR_MESSAGE.to_string(),
            stats: String::new(),
            cards: Vec::new(),
            pagination,
        }
    }

    pub fn page(
        cards: Vec<PostCard>,
        page: u32,
        page_size: u32,
        total: u64,
        pagination: PaginationView,
    ) -> Self {
        let stats = stats_line(page, page_size, cards.len(), total);
        if cards.is_empty() {
            return Self {
                state: ResultsState::Empty,
                message: EMPTY_MESSAGE.to_string(),
                stats,
                cards,
                pagination,
            };
        }
        Self {
            state: ResultsState::Results,
            message: String::new(),
            stats,
            cards,
            pagination,
        }
    }

    pub fn state_class(&self) -> &'static str {
        match self.state {
            ResultsState::Loading => "loading",
            ResultsState::Empty => "empty",
            ResultsState::Error => "error",
            ResultsState::Results => "results",
        }
    }

    pub fn has_cards(&self) -> bool {
        !self.cards.is_empty()
    }
}

/// Select/checkbox option
#[derive(Debug, Clone)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Popular tag chip
#[derive(Debug, Clone)]
pub struct TagChip {
    pub tag: String,
    pub count: u64,
    pub selected: bool,
}

/// Current values of the filter form
#[derive(Debug, Clone)]
pub struct FilterControls {
    pub term: String,
    pub models: Vec<Choice>,
    pub content_types: Vec<Choice>,
    pub prompt_visibilities: Vec<Choice>,
    pub date_from: String,
    pub date_to: String,
    pub views_min: String,
    pub views_max: String,
    pub sorts: Vec<Choice>,
    pub selected_tags: Vec<String>,
    pub active: bool,
}

impl FilterControls {
    pub fn new(filters: &FilterState) -> Self {
        let choice = |value: &str, label: &str, selected: bool| Choice {
            value: value.to_string(),
            label: label.to_string(),
            selected,
        };

        Self {
            term: filters.term.clone(),
            models: AiModelCategory::ALL
                .iter()
                .map(|m| choice(m.as_str(), m.label(), filters.ai_models.contains(m)))
                .collect(),
            content_types: [("all", "All content"), ("text", "Text"), ("embedded", "Embedded")]
                .iter()
                .map(|(v, l)| choice(v, l, filters.content_type.as_str() == *v))
                .collect(),
            prompt_visibilities: [
                ("all", "All prompts"),
                ("public", "Public prompts"),
                ("private", "Private prompts"),
            ]
            .iter()
            .map(|(v, l)| choice(v, l, filters.prompt_visibility.as_str() == *v))
            .collect(),
            date_from: filters.date_from.map(|d| d.to_string()).unwrap_or_default(),
            date_to: filters.date_to.map(|d| d.to_string()).unwrap_or_default(),
            views_min: filters.views_min.map(|v| v.to_string()).unwrap_or_default(),
            views_max: filters.views_max.map(|v| v.to_string()).unwrap_or_default(),
            sorts: SortOrder::ALL
                .iter()
                .map(|s| choice(s.as_str(), s.label(), filters.sort == *s))
                .collect(),
            selected_tags: filters.tags.iter().cloned().collect(),
            active: !filters.is_default(),
        }
    }
}

// =============================================================================
// Single post
// =============================================================================

#[derive(Debug, Clone)]
pub struct ArchiveDetail {
    pub ai_model: String,
    pub generation_date: Option<String>,
    pub prompt: Option<String>,
    pub content: Option<String>,
    pub embed_url: Option<String>,
    pub downloads: i64,
}

#[derive(Debug, Clone)]
pub struct CollabDetail {
    pub collab_type: String,
    pub description: String,
    pub contact_email: String,
}

/// Full post view
#[derive(Debug, Clone)]
pub struct PostView {
    pub id: String,
    pub kind: String,
    pub kind_label: String,
    pub title: String,
    pub author: String,
    pub date: String,
    pub tags: Vec<String>,
    pub views: i64,
    pub favorite_count: i64,
    pub favorited: bool,
    pub is_owner: bool,
    pub archive: Option<ArchiveDetail>,
    pub collab: Option<CollabDetail>,
}

impl PostView {
    pub fn new(
        post: &Post,
        favorited: bool,
        viewer_id: Option<&str>,
        locale: DateLocale,
    ) -> Self {
        let (archive, collab) = match post {
            Post::Archive(p) => (Some(archive_detail(p, locale)), None),
            Post::Collab(p) => (None, Some(collab_detail(p))),
        };

        Self {
            id: post.id().to_string(),
            kind: post.kind().as_str().to_string(),
            kind_label: post.kind().label().to_string(),
            title: post.title().to_string(),
            author: author_name(post.author()),
            date: locale.format_timestamp(post.created_at()),
            tags: post.tags().to_vec(),
            views: post.views(),
            favorite_count: post.favorite_count(),
            favorited,
            is_owner: viewer_id.is_some_and(|id| !id.is_empty() && id == post.user_id()),
            archive,
            collab,
        }
    }
}

fn archive_detail(post: &ArchivePost, locale: DateLocale) -> ArchiveDetail {
    ArchiveDetail {
        ai_model: post.ai_model.clone(),
        generation_date: post.generation_date.map(|d| locale.format_date(d)),
        prompt: post.prompt_is_public.then(|| post.prompt.clone()),
        content: post.body.content().map(str::to_string),
        embed_url: post.body.embed_url().and_then(safe_embed_url),
        downloads: post.downloads,
    }
}

fn collab_detail(post: &CollabPost) -> CollabDetail {
    CollabDetail {
        collab_type: post.collab_type.describe().to_string(),
        description: post.description.clone(),
        contact_email: post.contact_email.clone(),
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// One saved favorite, rendered from its snapshot
#[derive(Debug, Clone)]
pub struct FavoriteItem {
    pub id: String,
    pub kind: String,
    pub kind_label: String,
    pub post_href: String,
    pub title: String,
    pub saved_ago: String,
    pub added: String,
    pub meta: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl FavoriteItem {
    pub fn new(favorite: &Favorite, now: DateTime<Utc>, locale: DateLocale) -> Self {
        let data = &favorite.post_data;
        let text = |key: &str| data[key].as_str().filter(|s| !s.is_empty());

        let (meta, description) = match favorite.post_kind {
            PostKind::Archive => {
                let mut meta = format!("AI Model: {}", text("ai_model").unwrap_or("Unknown"));
                if let Some(generated) = text("generation_date")
                    .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                {
                    meta.push_str(&format!(" • Generated: {}", locale.format_date(generated)));
                }
                let description = text("content")
                    .map(|c| truncate(c, LONG_PREVIEW_CHARS))
                    .unwrap_or_else(|| EMBEDDED_PREVIEW.to_string());
                (meta, description)
            }
            PostKind::Collab => {
                let meta = match text("type") {
                    Some("request") => "Looking for collaboration",
                    _ => "Offering to collaborate",
                };
                let description = text("description")
                    .map(|d| truncate(d, LONG_PREVIEW_CHARS))
                    .unwrap_or_else(|| "Collaboration description".to_string());
                (meta.to_string(), description)
            }
        };

        let tags = data["tags"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .filter_map(Json::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: favorite.id.clone(),
            kind: favorite.post_kind.as_str().to_string(),
            kind_label: favorite.post_kind.label().to_string(),
            post_href: post_href(favorite.post_kind, &favorite.post_id),
            title: favorite.post_title.clone(),
            saved_ago: time_ago(favorite.created_at, now),
            added: locale.format_timestamp(favorite.created_at),
            meta,
            description,
            tags,
        }
    }
}

// =============================================================================
// Profile
// =============================================================================

#[derive(Debug, Clone)]
pub struct ProfilePostItem {
    pub href: String,
    pub kind: String,
    pub title: String,
    pub date: String,
    pub summary: String,
    pub prompt: Option<String>,
    pub tags: Vec<String>,
    pub views: i64,
    pub downloads: Option<i64>,
}

impl ProfilePostItem {
    pub fn from_archive(post: &ArchivePost, locale: DateLocale) -> Self {
        let summary = match &post.body {
            ArchiveBody::Text(content) => truncate(content, LONG_PREVIEW_CHARS),
            ArchiveBody::Embedded(_) => EMBEDDED_PREVIEW.to_string(),
        };
        let prompt = if post.prompt_is_public {
            truncate(&post.prompt, PROMPT_PREVIEW_CHARS)
        } else {
            PRIVATE_PROMPT_NOTICE.to_string()
        };

        Self {
            href: post_href(PostKind::Archive, &post.id),
            kind: PostKind::Archive.as_str().to_string(),
            title: post.title.clone(),
            date: locale.format_timestamp(post.created_at),
            summary,
            prompt: Some(prompt),
            tags: post.tags.clone(),
            views: post.views,
            downloads: Some(post.downloads),
        }
    }

    pub fn from_collab(post: &CollabPost, locale: DateLocale) -> Self {
        Self {
            href: post_href(PostKind::Collab, &post.id),
            kind: PostKind::Collab.as_str().to_string(),
            title: post.title.clone(),
            date: locale.format_timestamp(post.created_at),
            summary: format!(
                "{}: {}",
                post.collab_type.describe(),
                truncate(&post.description, LONG_PREVIEW_CHARS)
            ),
            prompt: None,
            tags: post.tags.clone(),
            views: post.views,
            downloads: None,
        }
    }
}
