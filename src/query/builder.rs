//! Browse query construction
//!
//! Translates a [`FilterState`] plus a page into one [`Select`] against
//! `archive_posts`. All active predicates are AND-ed; every sort order ends
//! with stable tie-breakers so repeated queries page consistently.

use chrono::{NaiveDate, NaiveTime, Utc};

use super::filter::{AiModelCategory, ContentType, FilterState, PromptVisibility, SortOrder};
use crate::data::{Expr, Op, Order, Select, Table, Value};
use crate::error::AppError;

/// Build the page query for the browse view
///
/// # Errors
/// Returns `Validation` for a page below 1 or a zero page size. No request
/// exists in that case.
pub fn build_browse_query(
    filters: &FilterState,
    page: u32,
    page_size: u32,
) -> Result<Select, AppError> {
    if page < 1 {
        return Err(AppError::Validation("Page must be at least 1".to_string()));
    }
    if page_size == 0 {
        return Err(AppError::Validation(
            "Page size must be at least 1".to_string(),
        ));
    }

    let offset = u64::from(page - 1) * u64::from(page_size);
    let mut query = Select::from(Table::ArchivePosts)
        .with_author()
        .filter_opt(browse_filter(filters))
        .window(offset, u64::from(page_size))
        .count_exact();
    query.order = sort_keys(filters.sort);

    Ok(query)
}

/// Conjunction of every active filter control
pub fn browse_filter(filters: &FilterState) -> Option<Expr> {
    let mut clauses = Vec::new();

    if !filters.term.is_empty() {
        clauses.push(term_clause(&filters.term));
    }

    if let Some(models) = Expr::any(filters.ai_models.iter().map(|m| model_clause(*m)).collect())
    {
        clauses.push(models);
    }

    match filters.content_type {
        ContentType::All => {}
        ContentType::Text => clauses.push(Expr::is_null("embed_url")),
        ContentType::Embedded => clauses.push(Expr::is_null("embed_url").negate()),
    }

    match filters.prompt_visibility {
        PromptVisibility::All => {}
        PromptVisibility::Public => {
            clauses.push(Expr::eq("prompt_is_public", Value::Bool(true)))
        }
        PromptVisibility::Private => {
            clauses.push(Expr::eq("prompt_is_public", Value::Bool(false)))
        }
    }

    if let Some(from) = filters.date_from {
        clauses.push(Expr::cmp(
            "created_at",
            Op::Gte,
            Value::Timestamp(start_of_day(from)),
        ));
    }
    // Inclusive end date: everything before the following midnight.
    if let Some(next_day) = filters.date_to.and_then(|to| to.succ_opt()) {
        clauses.push(Expr::cmp(
            "created_at",
            Op::Lt,
            Value::Timestamp(start_of_day(next_day)),
        ));
    }

    if let Some(min) = filters.views_min {
        clauses.push(Expr::cmp("views", Op::Gte, Value::Int(saturating_i64(min))));
    }
    if let Some(max) = filters.views_max {
        clauses.push(Expr::cmp("views", Op::Lte, Value::Int(saturating_i64(max))));
    }

    if let Some(tags) = Expr::any(
        filters
            .tags
            .iter()
            .map(|tag| Expr::has_element("tags", tag))
            .collect(),
    ) {
        clauses.push(tags);
    }

    Expr::all(clauses)
}

fn term_clause(term: &str) -> Expr {
    Expr::Or(vec![
        Expr::icontains("title", term),
        Expr::icontains("content", term),
        Expr::icontains("prompt", term),
        Expr::has_element("tags", &term.to_lowercase()),
    ])
}

fn model_clause(category: AiModelCategory) -> Expr {
    match category {
        AiModelCategory::Gpt4 => Expr::Or(vec![
            Expr::icontains("ai_model", "gpt-4"),
            Expr::icontains("ai_model", "gpt4"),
        ]),
        AiModelCategory::Claude => Expr::icontains("ai_model", "claude"),
        AiModelCategory::Gemini => Expr::Or(vec![
            Expr::icontains("ai_model", "gemini"),
            Expr::icontains("ai_model", "bard"),
        ]),
        AiModelCategory::Other => Expr::And(
            ["gpt", "claude", "gemini", "bard"]
                .into_iter()
                .map(|family| Expr::icontains("ai_model", family).negate())
                .collect(),
        ),
    }
}

fn sort_keys(sort: SortOrder) -> Vec<Order> {
    let mut keys = match sort {
        SortOrder::Newest => vec![Order::desc("created_at")],
        SortOrder::Oldest => vec![Order::asc("created_at")],
        SortOrder::MostViewed => vec![Order::desc("views"), Order::desc("created_at")],
        SortOrder::MostFavorited => vec![Order::desc("favorite_count"), Order::desc("created_at")],
    };
    keys.push(Order::asc("id"));
    keys
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
