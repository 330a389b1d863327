//! Text formatting helpers shared by every view

use chrono::{DateTime, NaiveDate, Utc};

use crate::data::AuthorProfile;

/// Characters kept in browse card previews
pub const CARD_PREVIEW_CHARS: usize = 150;
/// Characters kept in favorite and profile content previews
pub const LONG_PREVIEW_CHARS: usize = 200;
/// Characters kept in profile prompt previews
pub const PROMPT_PREVIEW_CHARS: usize = 150;
/// Tags shown on a card before the "+N more" chip
pub const CARD_TAG_LIMIT: usize = 3;

/// Preview text for archive posts whose body is an embedded link
pub const EMBEDDED_PREVIEW: &str = "AI-generated content available via embedded link";

/// Display name: display name, then full name, then email local part
pub fn author_name(author: Option<&AuthorProfile>) -> String {
    author
        .and_then(|a| {
            a.display_name
                .clone()
                .or_else(|| a.full_name.clone())
                .or_else(|| {
                    a.email
                        .as_deref()
                        .and_then(|email| email.split('@').next())
                        .filter(|local| !local.is_empty())
                        .map(str::to_string)
                })
        })
        .unwrap_or_else(|| "Anonymous".to_string())
}

/// Cut to `max` characters on a char boundary, marking the cut with `...`
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// First `limit` tags plus the "+N more" label for the rest
pub fn visible_tags(tags: &[String], limit: usize) -> (Vec<String>, Option<String>) {
    let shown = tags.iter().take(limit).cloned().collect();
    let hidden = tags.len().saturating_sub(limit);
    let more = (hidden > 0).then(|| format!("+{hidden} more"));
    (shown, more)
}

/// Embed links are only rendered for http(s) URLs, always as https
pub fn safe_embed_url(raw: &str) -> Option<String> {
    let mut url = url::Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "https" => {}
        "http" => url.set_scheme("https").ok()?,
        _ => return None,
    }
    Some(url.to_string())
}

/// Result range line above the cards
pub fn stats_line(page: u32, page_size: u32, shown: usize, total: u64) -> String {
    if total == 0 || shown == 0 {
        return "No posts found".to_string();
    }
    let start = u64::from(page.saturating_sub(1)) * u64::from(page_size) + 1;
    let end = start + shown as u64 - 1;
    format!("Showing {start}-{end} of {total} archive posts")
}

/// "3 days ago" style relative time
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else {
        "Just now".to_string()
    }
}

// =============================================================================
// Locale-aware dates
// =============================================================================

/// Date style derived from the viewer's `Accept-Language`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateLocale {
    /// "Jan 5, 2024"
    UnitedStates,
    /// "5 Jan 2024"
    DayMonthYear,
    /// "05.01.2024"
    German,
    /// "2024/01/05"
    EastAsian,
    /// "2024-01-05"
    #[default]
    Iso,
}

impl DateLocale {
    /// Pick a style from the first language range of the header
    pub fn from_accept_language(header: Option<&str>) -> Self {
        let Some(first) = header
            .and_then(|h| h.split(',').next())
            .map(|range| range.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        else {
            return Self::Iso;
        };

        let mut parts = first.split(['-', '_']);
        let language = parts.next().unwrap_or("");
        let region = parts.next().unwrap_or("");

        match (language, region) {
            ("en", "" | "us") => Self::UnitedStates,
            ("en", _) => Self::DayMonthYear,
            ("de", _) => Self::German,
            ("ja" | "zh" | "ko", _) => Self::EastAsian,
            ("fr" | "es" | "it" | "pt" | "nl" | "sv" | "da" | "nb" | "no" | "fi" | "pl"
            | "cs" | "el" | "ga", _) => Self::DayMonthYear,
            _ => Self::Iso,
        }
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        let pattern = match self {
            Self::UnitedStates => "%b %-d, %Y",
            Self::DayMonthYear => "%-d %b %Y",
            Self::German => "%d.%m.%Y",
            Self::EastAsian => "%Y/%m/%d",
            Self::Iso => "%Y-%m-%d",
        };
        date.format(pattern).to_string()
    }

    pub fn format_timestamp(&self, timestamp: DateTime<Utc>) -> String {
        self.format_date(timestamp.date_naive())
    }
}
