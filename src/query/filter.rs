//! Filter state for the browse page
//!
//! [`FilterState`] is an immutable snapshot of every filter control.
//! [`FilterStore`] owns the current snapshot for one browse session and is
//! the only way to change it. Raw control values arrive as strings
//! ([`FilterPatch`], [`BrowseParams`]) and are validated here, before any
//! remote request is built.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// =============================================================================
// Filter enums
// =============================================================================

/// Model family filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AiModelCategory {
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "gemini")]
    Gemini,
    /// Anything not in a known family
    #[serde(rename = "other")]
    Other,
}

impl AiModelCategory {
    pub const ALL: [AiModelCategory; 4] = [Self::Gpt4, Self::Claude, Self::Gemini, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4 => "gpt-4",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Gpt4 => "GPT-4",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
            Self::Other => "Other",
        }
    }
}

impl FromStr for AiModelCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpt-4" => Ok(Self::Gpt4),
            "claude" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            "other" => Ok(Self::Other),
            other => Err(AppError::Validation(format!("Unknown AI model filter: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    All,
    Text,
    Embedded,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Text => "text",
            Self::Embedded => "embedded",
        }
    }
}

impl FromStr for ContentType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(Self::All),
            "text" => Ok(Self::Text),
            "embedded" => Ok(Self::Embedded),
            other => Err(AppError::Validation(format!("Unknown content type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVisibility {
    #[default]
    All,
    Public,
    Private,
}

impl PromptVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl FromStr for PromptVisibility {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(Self::All),
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(AppError::Validation(format!(
                "Unknown prompt visibility: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    MostViewed,
    MostFavorited,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        Self::Newest,
        Self::Oldest,
        Self::MostViewed,
        Self::MostFavorited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::MostViewed => "most-viewed",
            Self::MostFavorited => "most-favorited",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Newest => "Newest first",
            Self::Oldest => "Oldest first",
            Self::MostViewed => "Most viewed",
            Self::MostFavorited => "Most favorited",
        }
    }
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "most-viewed" => Ok(Self::MostViewed),
            "most-favorited" => Ok(Self::MostFavorited),
            other => Err(AppError::Validation(format!("Unknown sort order: {other}"))),
        }
    }
}

// =============================================================================
// Filter state
// =============================================================================

/// Snapshot of every browse filter control
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub term: String,
    pub ai_models: BTreeSet<AiModelCategory>,
    pub content_type: ContentType,
    pub prompt_visibility: PromptVisibility,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub views_min: Option<u64>,
    pub views_max: Option<u64>,
    pub tags: BTreeSet<String>,
    pub sort: SortOrder,
}

impl FilterState {
    /// True when no control differs from its default
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Query string reproducing this state on `/browse`, without `page`
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if !self.term.is_empty() {
            pairs.push(("q", self.term.clone()));
        }
        for model in &self.ai_models {
            pairs.push(("ai_model", model.as_str().to_string()));
        }
        if self.content_type != ContentType::All {
            pairs.push(("content_type", self.content_type.as_str().to_string()));
        }
        if self.prompt_visibility != PromptVisibility::All {
            pairs.push((
                "prompt_visibility",
                self.prompt_visibility.as_str().to_string(),
            ));
        }
        if let Some(from) = self.date_from {
            pairs.push(("date_from", from.to_string()));
        }
        if let Some(to) = self.date_to {
            pairs.push(("date_to", to.to_string()));
        }
        if let Some(min) = self.views_min {
            pairs.push(("views_min", min.to_string()));
        }
        if let Some(max) = self.views_max {
            pairs.push(("views_max", max.to_string()));
        }
        for tag in &self.tags {
            pairs.push(("tag", tag.clone()));
        }
        if self.sort != SortOrder::Newest {
            pairs.push(("sort", self.sort.as_str().to_string()));
        }

        pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `/browse` URL for `page` under this state
    pub fn page_href(&self, page: u32) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            format!("/browse?page={page}")
        } else {
            format!("/browse?{query}&page={page}")
        }
    }
}

// =============================================================================
// Raw control values
// =============================================================================

/// Partial update of the filter controls, as raw control values
///
/// `None` leaves a control unchanged; an empty string clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterPatch {
    pub term: Option<String>,
    pub ai_models: Option<Vec<String>>,
    pub content_type: Option<String>,
    pub prompt_visibility: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub views_min: Option<String>,
    pub views_max: Option<String>,
    pub tags: Option<Vec<String>>,
    pub sort: Option<String>,
}

impl FilterPatch {
    /// Merge into `base`, validating every touched control
    pub fn apply_to(&self, base: &FilterState) -> Result<FilterState, AppError> {
        let mut next = base.clone();

        if let Some(term) = &self.term {
            next.term = term.trim().to_string();
        }
        if let Some(models) = &self.ai_models {
            next.ai_models = models
                .iter()
                .map(|m| m.trim())
                .filter(|m| !m.is_empty())
                .map(AiModelCategory::from_str)
                .collect::<Result<_, _>>()?;
        }
        if let Some(content_type) = &self.content_type {
            next.content_type = content_type.trim().parse()?;
        }
        if let Some(visibility) = &self.prompt_visibility {
            next.prompt_visibility = visibility.trim().parse()?;
        }
        if let Some(from) = &self.date_from {
            next.date_from = parse_date("From date", from)?;
        }
        if let Some(to) = &self.date_to {
            next.date_to = parse_date("To date", to)?;
        }
        if let Some(min) = &self.views_min {
            next.views_min = parse_views("Minimum views", min)?;
        }
        if let Some(max) = &self.views_max {
            next.views_max = parse_views("Maximum views", max)?;
        }
        if let Some(tags) = &self.tags {
            next.tags = tags.iter().filter_map(|t| normalize_tag(t)).collect();
        }
        if let Some(sort) = &self.sort {
            next.sort = sort.trim().parse()?;
        }

        if let (Some(min), Some(max)) = (next.views_min, next.views_max) {
            if min > max {
                return Err(AppError::Validation(
                    "Minimum views cannot exceed maximum views".to_string(),
                ));
            }
        }

        Ok(next)
    }
}

/// Query parameters of `GET /browse`
///
/// Repeated keys (`ai_model`, `tag`) select several values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseParams {
    pub q: Option<String>,
    #[serde(default)]
    pub ai_model: Vec<String>,
    pub content_type: Option<String>,
    pub prompt_visibility: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub views_min: Option<String>,
    pub views_max: Option<String>,
    #[serde(default)]
    pub tag: Vec<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

impl BrowseParams {
    /// Validate into a filter state and a page number
    pub fn parse(&self) -> Result<(FilterState, u32), AppError> {
        let patch = FilterPatch {
            term: self.q.clone(),
            ai_models: Some(self.ai_model.clone()),
            content_type: self.content_type.clone(),
            prompt_visibility: self.prompt_visibility.clone(),
            date_from: self.date_from.clone(),
            date_to: self.date_to.clone(),
            views_min: self.views_min.clone(),
            views_max: self.views_max.clone(),
            tags: Some(self.tag.clone()),
            sort: self.sort.clone(),
        };
        let state = patch.apply_to(&FilterState::default())?;
        let page = parse_page(self.page.as_deref())?;
        Ok((state, page))
    }
}

/// Page numbers start at 1; a missing page means the first
pub fn parse_page(raw: Option<&str>) -> Result<u32, AppError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(1),
        Some(raw) => raw,
    };
    let page: i64 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid page number: {raw}")))?;
    if page < 1 {
        return Err(AppError::Validation("Page must be at least 1".to_string()));
    }
    u32::try_from(page).map_err(|_| AppError::Validation(format!("Invalid page number: {raw}")))
}

fn parse_date(label: &str, raw: &str) -> Result<Option<NaiveDate>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| AppError::Validation(format!("{label} must be a date (YYYY-MM-DD)")))
}

fn parse_views(label: &str, raw: &str) -> Result<Option<u64>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: i64 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("{label} must be a whole number")))?;
    if value < 0 {
        return Err(AppError::Validation(format!("{label} cannot be negative")));
    }
    Ok(Some(value as u64))
}

/// Tags are stored trimmed and lowercase
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

// =============================================================================
// Store
// =============================================================================

/// Owner of one session's filter state
///
/// Every mutation marks the store dirty; the browse session consumes the
/// flag to reset pagination before the next query.
#[derive(Debug, Default)]
pub struct FilterStore {
    state: FilterState,
    dirty: bool,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &FilterState {
        &self.state
    }

    /// Merge a validated patch; on error nothing changes
    pub fn set(&mut self, patch: &FilterPatch) -> Result<(), AppError> {
        self.state = patch.apply_to(&self.state)?;
        self.dirty = true;
        Ok(())
    }

    /// Adopt a state validated elsewhere, such as the `/browse` URL
    pub fn replace(&mut self, state: FilterState) {
        if self.state != state {
            self.state = state;
            self.dirty = true;
        }
    }

    pub fn set_term(&mut self, term: &str) {
        self.state.term = term.trim().to_string();
        self.dirty = true;
    }

    /// Add or remove a tag; returns whether it is now selected
    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        let selected = if self.state.tags.remove(&tag) {
            false
        } else {
            self.state.tags.insert(tag);
            true
        };
        self.dirty = true;
        selected
    }

    /// Restore defaults; always re-triggers the page-1 query
    pub fn clear(&mut self) {
        self.state = FilterState::default();
        self.dirty = true;
    }

    /// Return and reset the dirty flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
