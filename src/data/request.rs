//! Backend-neutral request model
//!
//! Queries are built once as plain values and then either encoded for the
//! PostgREST wire format or evaluated directly by the in-memory backend.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Tables
// =============================================================================

/// Remote tables this application reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    ArchivePosts,
    CollabPosts,
    UserFavorites,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArchivePosts => "archive_posts",
            Self::CollabPosts => "collab_posts",
            Self::UserFavorites => "user_favorites",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Values and predicates
// =============================================================================

/// Literal operand of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Render a scalar the way it appears in a query string
    pub fn to_query_literal(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Text(s) => s.clone(),
            Self::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::List(items) => items
                .iter()
                .map(Value::to_query_literal)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-insensitive substring match on a text column
    IContains,
    /// Array column contains every element of the operand list
    Contains,
    /// Column is null (operand ignored)
    IsNull,
    /// Column equals one of the operand list
    In,
}

/// Filter expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Cmp {
        column: String,
        op: Op,
        value: Value,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn cmp(column: &str, op: Op, value: Value) -> Self {
        Self::Cmp {
            column: column.to_string(),
            op,
            value,
        }
    }

    pub fn eq(column: &str, value: Value) -> Self {
        Self::cmp(column, Op::Eq, value)
    }

    pub fn icontains(column: &str, needle: &str) -> Self {
        Self::cmp(column, Op::IContains, Value::text(needle))
    }

    /// Array column contains the single element `element`
    pub fn has_element(column: &str, element: &str) -> Self {
        Self::cmp(column, Op::Contains, Value::List(vec![Value::text(element)]))
    }

    pub fn is_null(column: &str) -> Self {
        Self::cmp(column, Op::IsNull, Value::Null)
    }

    pub fn is_in(column: &str, values: Vec<Value>) -> Self {
        Self::cmp(column, Op::In, Value::List(values))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Conjunction that collapses trivial cases
    pub fn all(mut exprs: Vec<Expr>) -> Option<Expr> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::And(exprs)),
        }
    }

    /// Disjunction that collapses trivial cases
    pub fn any(mut exprs: Vec<Expr>) -> Option<Expr> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::Or(exprs)),
        }
    }
}

// =============================================================================
// Select
// =============================================================================

/// One ordering key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }
}

/// Row window (offset + limit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    /// Inclusive last row index, as used by `Range` headers
    pub fn last_index(&self) -> u64 {
        self.offset + self.limit.saturating_sub(1)
    }
}

/// A read request against one table
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: Table,
    /// Column list, `*` for all
    pub columns: String,
    /// Embed the author profile (email and metadata) under `users`
    pub embed_author: bool,
    pub filter: Option<Expr>,
    pub order: Vec<Order>,
    pub window: Option<Window>,
    /// Ask the backend for the exact total count of matching rows
    pub count_exact: bool,
}

impl Select {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            columns: "*".to_string(),
            embed_author: false,
            filter: None,
            order: Vec::new(),
            window: None,
            count_exact: false,
        }
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn with_author(mut self) -> Self {
        self.embed_author = true;
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn filter_opt(mut self, expr: Option<Expr>) -> Self {
        self.filter = expr;
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.window = Some(Window { offset, limit });
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count_exact = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_and_any_collapse_single_items() {
        let single = Expr::all(vec![Expr::is_null("embed_url")]);
        assert_eq!(single, Some(Expr::is_null("embed_url")));
        assert_eq!(Expr::any(vec![]), None);
    }

    #[test]
    fn window_last_index_is_inclusive() {
        let window = Window {
            offset: 12,
            limit: 12,
        };
        assert_eq!(window.last_index(), 23);
    }

    #[test]
    fn timestamps_render_in_utc_seconds() {
        let ts = DateTime::parse_from_rfc3339("2024-01-05T00:00:00+00:00")
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_query_literal(), "2024-01-05T00:00:00Z");
    }
}
