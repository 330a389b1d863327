//! Publish and edit forms
//!
//! Forms are validated into the row fields stored by the data service.
//! The author (`user_id`) is added by the caller from the session.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value as Json, json};

use crate::data::CollabType;
use crate::error::AppError;
use crate::render::format::safe_embed_url;
use crate::render::views::PRIVATE_PROMPT_NOTICE;

pub const MAX_TAGS: usize = 10;
const TAG_MIN_CHARS: usize = 2;
const TAG_MAX_CHARS: usize = 30;

fn default_true() -> bool {
    true
}

/// Archive post form
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveForm {
    pub title: String,
    pub ai_model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_true")]
    pub prompt_is_public: bool,
    #[serde(default)]
    pub generation_date: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArchiveForm {
    /// Row fields for `archive_posts`
    pub fn validate(&self) -> Result<Json, AppError> {
        let title = required("Title", &self.title)?;
        let ai_model = required("AI model", &self.ai_model)?;

        let prompt = if self.prompt_is_public {
            required("Prompt", &self.prompt)?
        } else {
            PRIVATE_PROMPT_NOTICE.to_string()
        };

        let generation_date = match self.generation_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::Validation("Generation date must be a date (YYYY-MM-DD)".to_string())
            })?),
        };

        let content = self
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let embed_url = self
            .embed_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        let (content, embed_url) = match (content, embed_url) {
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "Provide either the AI-generated content or a shareable link, not both"
                        .to_string(),
                ));
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "Please provide the AI-generated content or a shareable link".to_string(),
                ));
            }
            (Some(content), None) => (Json::from(content), Json::Null),
            (None, Some(raw)) => {
                let url = safe_embed_url(raw).ok_or_else(|| {
                    AppError::Validation("Shareable link must be an http(s) URL".to_string())
                })?;
                (Json::Null, Json::from(url))
            }
        };

        Ok(json!({
            "title": title,
            "ai_model": ai_model,
            "prompt": prompt,
            "prompt_is_public": self.prompt_is_public,
            "generation_date": generation_date,
            "content": content,
            "embed_url": embed_url,
            "tags": validate_tags(&self.tags)?,
        }))
    }
}

/// Collab post form
#[derive(Debug, Clone, Deserialize)]
pub struct CollabForm {
    #[serde(rename = "type")]
    pub collab_type: String,
    pub title: String,
    pub description: String,
    pub contact_email: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CollabForm {
    /// Row fields for `collab_posts`
    pub fn validate(&self) -> Result<Json, AppError> {
        let collab_type: CollabType = self.collab_type.trim().parse().map_err(|_| {
            AppError::Validation("Collaboration type must be request or offer".to_string())
        })?;
        let title = required("Title", &self.title)?;
        let description = required("Description", &self.description)?;
        let contact_email = self.contact_email.trim();
        if !is_plausible_email(contact_email) {
            return Err(AppError::Validation(
                "Please provide a valid contact email".to_string(),
            ));
        }

        Ok(json!({
            "type": collab_type.as_str(),
            "title": title,
            "description": description,
            "contact_email": contact_email,
            "tags": validate_tags(&self.tags)?,
        }))
    }
}

/// Trim, lowercase and check the tag list
pub fn validate_tags(raw: &[String]) -> Result<Vec<String>, AppError> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        let chars = tag.chars().count();
        if chars < TAG_MIN_CHARS {
            return Err(AppError::Validation(format!(
                "Tag must be at least {TAG_MIN_CHARS} characters long: {tag}"
            )));
        }
        if chars > TAG_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "Tag must be at most {TAG_MAX_CHARS} characters long: {tag}"
            )));
        }
        if tags.contains(&tag) {
            return Err(AppError::Validation(format!("Tag already added: {tag}")));
        }
        tags.push(tag);
    }

    if tags.is_empty() {
        return Err(AppError::Validation(
            "Please add at least one tag".to_string(),
        ));
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "Maximum {MAX_TAGS} tags allowed"
        )));
    }
    Ok(tags)
}

fn required(label: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{label} is required")));
    }
    Ok(value.to_string())
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_form() -> ArchiveForm {
        ArchiveForm {
            title: " Game AI ".to_string(),
            ai_model: "Claude 3".to_string(),
            prompt: "Design an NPC".to_string(),
            prompt_is_public: true,
            generation_date: Some("2024-01-05".to_string()),
            content: Some("Behaviour tree".to_string()),
            embed_url: None,
            tags: vec![" Game ".to_string(), "AI".to_string()],
        }
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn archive_form_normalises_fields() {
        let row = archive_form().validate().unwrap();
        assert_eq!(row["title"], "Game AI");
        assert_eq!(row["tags"], json!(["game", "ai"]));
        assert_eq!(row["generation_date"], "2024-01-05");
        assert!(row["embed_url"].is_null());
    }

    #[test]
    fn private_prompt_is_replaced() {
        let mut form = archive_form();
        form.prompt_is_public = false;
        form.prompt = String::new();
        let row = form.validate().unwrap();
        assert_eq!(row["prompt"], PRIVATE_PROMPT_NOTICE);
    }

    #[test]
    fn content_and_embed_are_exclusive() {
        let mut both = archive_form();
        both.embed_url = Some("https://example.com".to_string());
        assert!(both.validate().is_err());

        let mut neither = archive_form();
        neither.content = Some("   ".to_string());
        assert!(neither.validate().is_err());

        let mut embedded = archive_form();
        embedded.content = None;
        embedded.embed_url = Some("http://chat.example.com/s/1".to_string());
        let row = embedded.validate().unwrap();
        assert_eq!(row["embed_url"], "https://chat.example.com/s/1");
        assert!(row["content"].is_null());
    }

    #[test]
    fn embed_url_must_be_web_link() {
        let mut form = archive_form();
        form.content = None;
        form.embed_url = Some("javascript:alert(1)".to_string());
        assert!(matches!(form.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn tag_rules() {
        assert!(validate_tags(&tags(&["a"])).is_err());
        assert!(validate_tags(&tags(&[&"x".repeat(31)])).is_err());
        assert!(validate_tags(&tags(&["rust", "RUST"])).is_err());
        assert!(validate_tags(&[]).is_err());
        let eleven: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&eleven).is_err());
        assert_eq!(validate_tags(&tags(&["ok", " "])).unwrap(), vec!["ok"]);
    }

    #[test]
    fn collab_form_checks_type_and_email() {
        let form = CollabForm {
            collab_type: "offer".to_string(),
            title: "Pair on evals".to_string(),
            description: "Looking at eval harnesses".to_string(),
            contact_email: "ada@example.com".to_string(),
            tags: tags(&["evals"]),
        };
        assert_eq!(form.validate().unwrap()["type"], "offer");

        let mut bad_type = form.clone();
        bad_type.collab_type = "trade".to_string();
        assert!(bad_type.validate().is_err());

        let mut bad_email = form;
        bad_email.contact_email = "ada at example".to_string();
        assert!(bad_email.validate().is_err());
    }
}
