//! Plain-text export of archive posts

use chrono::{DateTime, Utc};

use super::format::author_name;
use crate::data::{ArchiveBody, ArchivePost};

/// Longest filename stem offered for download
const FILENAME_MAX_CHARS: usize = 100;

/// Downloadable text document for a text archive post
///
/// Returns `None` for embedded posts, which are downloaded by following the
/// embed link instead.
pub fn export_text(post: &ArchivePost, downloaded_at: DateTime<Utc>) -> Option<String> {
    let ArchiveBody::Text(content) = &post.body else {
        return None;
    };

    let generated = post
        .generation_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut doc = String::new();
    doc.push_str(&post.title);
    doc.push('\n');
    doc.push_str(&"=".repeat(post.title.chars().count()));
    doc.push_str("\n\n");
    doc.push_str(&format!("Author: {}\n", author_name(post.author.as_ref())));
    doc.push_str(&format!("AI Model: {}\n", post.ai_model));
    doc.push_str(&format!("Generated: {generated}\n"));
    doc.push_str(&format!("Tags: {}\n\n", post.tags.join(", ")));

    if post.prompt_is_public {
        doc.push_str("Original Prompt:\n");
        doc.push_str(&"-".repeat(16));
        doc.push('\n');
        doc.push_str(&post.prompt);
        doc.push_str("\n\n");
    }

    doc.push_str("AI-Generated Content:\n");
    doc.push_str(&"-".repeat(21));
    doc.push('\n');
    doc.push_str(content);
    doc.push_str("\n\n---\nDownloaded from DeepWiki.io\n");
    doc.push_str(&format!("Post ID: {}\n", post.id));
    doc.push_str(&format!(
        "Downloaded on: {}\n",
        downloaded_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    Some(doc)
}

/// `{sanitised title}.txt`
///
/// Keeps ASCII letters, digits, whitespace, `-` and `_`; whitespace runs
/// become one `_`; the stem is capped at 100 characters.
pub fn download_filename(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut in_space = false;
    for c in title.chars() {
        if c.is_whitespace() {
            if !in_space {
                stem.push('_');
                in_space = true;
            }
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            stem.push(c);
            in_space = false;
        }
    }
    let stem: String = stem.chars().take(FILENAME_MAX_CHARS).collect();
    let stem = if stem.is_empty() {
        "deepwiki-post".to_string()
    } else {
        stem
    };
    format!("{stem}.txt")
}
