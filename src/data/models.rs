//! Data models
//!
//! Records returned by the remote data service are validated here, at the
//! boundary. Anything above the data layer sees only well-formed posts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value as Json, json};
use thiserror::Error;

use super::request::Table;

/// A stored row that violates the record invariants
#[derive(Debug, Error)]
#[error("invalid {table} row: {reason}")]
pub struct InvalidRow {
    pub table: Table,
    pub reason: String,
}

impl InvalidRow {
    fn new(table: Table, reason: impl Into<String>) -> Self {
        Self {
            table,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Post kind
// =============================================================================

/// Discriminant shared by posts, favorites and routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Archive,
    Collab,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Collab => "collab",
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Self::Archive => Table::ArchivePosts,
            Self::Collab => Table::CollabPosts,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Archive => "Archive Post",
            Self::Collab => "Collab Post",
        }
    }
}

impl std::str::FromStr for PostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(Self::Archive),
            "collab" => Ok(Self::Collab),
            other => Err(format!("unknown post type: {other}")),
        }
    }
}

impl std::fmt::Display for PostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Author
// =============================================================================

/// Author profile embedded in post rows (`users:user_id(...)`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorProfile {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
struct AuthorRow {
    email: Option<String>,
    #[serde(default)]
    raw_user_meta_data: Option<AuthorMeta>,
}

#[derive(Deserialize, Default)]
struct AuthorMeta {
    display_name: Option<String>,
    full_name: Option<String>,
}

impl From<AuthorRow> for AuthorProfile {
    fn from(row: AuthorRow) -> Self {
        let meta = row.raw_user_meta_data.unwrap_or_default();
        Self {
            email: non_blank(row.email),
            display_name: non_blank(meta.display_name),
            full_name: non_blank(meta.full_name),
        }
    }
}

// =============================================================================
// Archive posts
// =============================================================================

/// Body of an archive post: pasted text or a link to hosted content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveBody {
    Text(String),
    Embedded(String),
}

impl ArchiveBody {
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Text(content) => Some(content),
            Self::Embedded(_) => None,
        }
    }

    pub fn embed_url(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Embedded(url) => Some(url),
        }
    }
}

/// AI insight post
#[derive(Debug, Clone)]
pub struct ArchivePost {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub ai_model: String,
    pub prompt: String,
    pub prompt_is_public: bool,
    pub generation_date: Option<NaiveDate>,
    pub body: ArchiveBody,
    pub tags: Vec<String>,
    pub views: i64,
    pub downloads: i64,
    pub favorite_count: i64,
    pub created_at: DateTime<Utc>,
    pub author: Option<AuthorProfile>,
}

#[derive(Deserialize)]
struct ArchiveRow {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    user_id: Option<String>,
    title: Option<String>,
    ai_model: Option<String>,
    prompt: Option<String>,
    prompt_is_public: Option<bool>,
    generation_date: Option<NaiveDate>,
    content: Option<String>,
    embed_url: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    views: Option<i64>,
    downloads: Option<i64>,
    favorite_count: Option<i64>,
    created_at: DateTime<Utc>,
    users: Option<AuthorRow>,
}

impl TryFrom<ArchiveRow> for ArchivePost {
    type Error = InvalidRow;

    fn try_from(row: ArchiveRow) -> Result<Self, Self::Error> {
        let table = Table::ArchivePosts;
        // Older rows may still carry placeholder content next to the embed URL.
        let body = match (non_blank(row.embed_url), row.content) {
            (Some(url), _) => ArchiveBody::Embedded(url),
            (None, Some(content)) if !content.trim().is_empty() => ArchiveBody::Text(content),
            _ => {
                return Err(InvalidRow::new(
                    table,
                    format!("post {} has neither content nor embed_url", row.id),
                ));
            }
        };

        Ok(Self {
            title: row.title.unwrap_or_default(),
            user_id: row.user_id.unwrap_or_default(),
            ai_model: row.ai_model.unwrap_or_default(),
            prompt: row.prompt.unwrap_or_default(),
            // Rows written before visibility existed were public.
            prompt_is_public: row.prompt_is_public.unwrap_or(true),
            generation_date: row.generation_date,
            body,
            tags: row.tags.unwrap_or_default(),
            views: row.views.unwrap_or(0),
            downloads: row.downloads.unwrap_or(0),
            favorite_count: row.favorite_count.unwrap_or(0),
            created_at: row.created_at,
            author: row.users.map(AuthorProfile::from),
            id: row.id,
        })
    }
}

// =============================================================================
// Collab posts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollabType {
    Request,
    Offer,
}

impl CollabType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Offer => "offer",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Request => "Looking for collaboration",
            Self::Offer => "Offering to collaborate",
        }
    }
}

impl std::str::FromStr for CollabType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Self::Request),
            "offer" => Ok(Self::Offer),
            other => Err(format!("unknown collaboration type: {other}")),
        }
    }
}

/// Collaboration request or offer
#[derive(Debug, Clone)]
pub struct CollabPost {
    pub id: String,
    pub user_id: String,
    pub collab_type: CollabType,
    pub title: String,
    pub description: String,
    pub contact_email: String,
    pub tags: Vec<String>,
    pub views: i64,
    pub favorite_count: i64,
    pub created_at: DateTime<Utc>,
    pub author: Option<AuthorProfile>,
}

#[derive(Deserialize)]
struct CollabRow {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    user_id: Option<String>,
    #[serde(rename = "type")]
    collab_type: Option<String>,
    title: Option<String>,
    description: Option<String>,
    contact_email: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    views: Option<i64>,
    favorite_count: Option<i64>,
    created_at: DateTime<Utc>,
    users: Option<AuthorRow>,
}

impl TryFrom<CollabRow> for CollabPost {
    type Error = InvalidRow;

    fn try_from(row: CollabRow) -> Result<Self, Self::Error> {
        let collab_type = row
            .collab_type
            .as_deref()
            .ok_or_else(|| InvalidRow::new(Table::CollabPosts, "missing type"))?
            .parse::<CollabType>()
            .map_err(|reason| InvalidRow::new(Table::CollabPosts, reason))?;

        Ok(Self {
            collab_type,
            user_id: row.user_id.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            contact_email: row.contact_email.unwrap_or_default(),
            tags: row.tags.unwrap_or_default(),
            views: row.views.unwrap_or(0),
            favorite_count: row.favorite_count.unwrap_or(0),
            created_at: row.created_at,
            author: row.users.map(AuthorProfile::from),
            id: row.id,
        })
    }
}

// =============================================================================
// Post
// =============================================================================

/// Either kind of post
#[derive(Debug, Clone)]
pub enum Post {
    Archive(ArchivePost),
    Collab(CollabPost),
}

impl Post {
    /// Validate a raw row of the table backing `kind`
    pub fn from_row(kind: PostKind, row: Json) -> Result<Self, InvalidRow> {
        match kind {
            PostKind::Archive => ArchivePost::from_row(row).map(Post::Archive),
            PostKind::Collab => {
                let row: CollabRow = serde_json::from_value(row)
                    .map_err(|e| InvalidRow::new(Table::CollabPosts, e.to_string()))?;
                CollabPost::try_from(row).map(Post::Collab)
            }
        }
    }

    pub fn kind(&self) -> PostKind {
        match self {
            Self::Archive(_) => PostKind::Archive,
            Self::Collab(_) => PostKind::Collab,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Archive(p) => &p.id,
            Self::Collab(p) => &p.id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Archive(p) => &p.user_id,
            Self::Collab(p) => &p.user_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Archive(p) => &p.title,
            Self::Collab(p) => &p.title,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Archive(p) => &p.tags,
            Self::Collab(p) => &p.tags,
        }
    }

    pub fn views(&self) -> i64 {
        match self {
            Self::Archive(p) => p.views,
            Self::Collab(p) => p.views,
        }
    }

    pub fn favorite_count(&self) -> i64 {
        match self {
            Self::Archive(p) => p.favorite_count,
            Self::Collab(p) => p.favorite_count,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Archive(p) => p.created_at,
            Self::Collab(p) => p.created_at,
        }
    }

    pub fn author(&self) -> Option<&AuthorProfile> {
        match self {
            Self::Archive(p) => p.author.as_ref(),
            Self::Collab(p) => p.author.as_ref(),
        }
    }

    pub fn set_views(&mut self, views: i64) {
        match self {
            Self::Archive(p) => p.views = views,
            Self::Collab(p) => p.views = views,
        }
    }

    /// Denormalised copy stored with a favorite
    pub fn snapshot(&self) -> Json {
        match self {
            Self::Archive(p) => json!({
                "id": p.id,
                "title": p.title,
                "ai_model": p.ai_model,
                "prompt": if p.prompt_is_public { Json::from(p.prompt.clone()) } else { Json::Null },
                "prompt_is_public": p.prompt_is_public,
                "content": p.body.content(),
                "embed_url": p.body.embed_url(),
                "generation_date": p.generation_date,
                "tags": p.tags,
                "created_at": p.created_at,
            }),
            Self::Collab(p) => json!({
                "id": p.id,
                "title": p.title,
                "type": p.collab_type.as_str(),
                "description": p.description,
                "contact_email": p.contact_email,
                "tags": p.tags,
                "created_at": p.created_at,
            }),
        }
    }
}

impl ArchivePost {
    pub fn from_row(row: Json) -> Result<Self, InvalidRow> {
        let row: ArchiveRow = serde_json::from_value(row)
            .map_err(|e| InvalidRow::new(Table::ArchivePosts, e.to_string()))?;
        Self::try_from(row)
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// A user's saved reference to a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub user_id: String,
    #[serde(deserialize_with = "de_id")]
    pub post_id: String,
    #[serde(rename = "post_type")]
    pub post_kind: PostKind,
    pub post_title: String,
    #[serde(default)]
    pub post_data: Json,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn from_row(row: Json) -> Result<Self, InvalidRow> {
        serde_json::from_value(row).map_err(|e| InvalidRow::new(Table::UserFavorites, e.to_string()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Row ids may be serialised as numbers (bigint keys) or strings (uuid keys)
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Json::deserialize(deserializer)? {
        Json::String(s) => Ok(s),
        Json::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Json::deserialize(deserializer)? {
        Json::Null => Ok(None),
        Json::String(s) => Ok(Some(s)),
        Json::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}
