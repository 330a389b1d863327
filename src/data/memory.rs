//! In-process data service
//!
//! Evaluates the request model directly against JSON rows. Used for local
//! development and by the test suites. Mirrors the hosted schema closely
//! enough to matter: the favorites unique key, server-assigned ids and
//! timestamps, and non-negative atomic counters.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as Json};
use tokio::sync::RwLock;

use super::request::{Expr, Op, Select, Table, Value};
use super::service::{DataService, RemoteError, Rows};

/// Operations that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOp {
    Select,
    Insert,
    Update,
    Delete,
    Increment,
}

/// Volatile table store
#[derive(Default)]
pub struct MemoryDataService {
    tables: RwLock<HashMap<Table, Vec<Json>>>,
    failures: RwLock<HashMap<(Table, FailOp), usize>>,
    select_calls: AtomicUsize,
}

impl MemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows verbatim, filling server defaults
    pub async fn seed(&self, table: Table, rows: impl IntoIterator<Item = Json>) {
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table).or_default();
        for row in rows {
            stored.push(with_server_defaults(table, row));
        }
    }

    /// Current contents of a table
    pub async fn rows(&self, table: Table) -> Vec<Json> {
        self.tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next `times` calls of `op` on `table` fail with a backend error
    pub async fn fail_next(&self, table: Table, op: FailOp, times: usize) {
        self.failures.write().await.insert((table, op), times);
    }

    /// Number of selects served so far
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(AtomicOrdering::SeqCst)
    }

    async fn check_failure(&self, table: Table, op: FailOp) -> Result<(), RemoteError> {
        let mut failures = self.failures.write().await;
        if let Some(remaining) = failures.get_mut(&(table, op)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Backend {
                    status: 503,
                    code: None,
                    message: format!("injected {op:?} failure on {table}"),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn select(&self, query: &Select) -> Result<Rows, RemoteError> {
        self.select_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_failure(query.table, FailOp::Select).await?;

        let tables = self.tables.read().await;
        let mut matched: Vec<Json> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filter.as_ref().is_none_or(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        matched.sort_by(|a, b| {
            for key in &query.order {
                let ordering = compare_json(&a[&key.column], &b[&key.column]);
                let ordering = if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let total = query.count_exact.then_some(matched.len() as u64);
        let rows = match query.window {
            Some(window) => matched
                .into_iter()
                .skip(window.offset as usize)
                .take(window.limit as usize)
                .collect(),
            None => matched,
        };

        Ok(Rows {
            rows: rows
                .into_iter()
                .map(|row| project(row, &query.columns))
                .collect(),
            total,
        })
    }

    async fn insert(&self, table: Table, row: Json) -> Result<Json, RemoteError> {
        self.check_failure(table, FailOp::Insert).await?;

        let row = with_server_defaults(table, row);
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table).or_default();

        if table == Table::UserFavorites {
            let key = |r: &Json| {
                (
                    scalar_text(&r["user_id"]),
                    scalar_text(&r["post_id"]),
                    scalar_text(&r["post_type"]),
                )
            };
            let candidate = key(&row);
            if stored.iter().any(|existing| key(existing) == candidate) {
                return Err(RemoteError::UniqueViolation);
            }
        }

        stored.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: Table,
        filter: &Expr,
        patch: Json,
    ) -> Result<Vec<Json>, RemoteError> {
        self.check_failure(table, FailOp::Update).await?;

        let Json::Object(patch) = patch else {
            return Err(RemoteError::Backend {
                status: 400,
                code: Some("PGRST102".to_string()),
                message: "patch body must be an object".to_string(),
            });
        };

        let mut tables = self.tables.write().await;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|row| matches(row, filter)) {
                if let Json::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filter: &Expr) -> Result<Vec<Json>, RemoteError> {
        self.check_failure(table, FailOp::Delete).await?;

        let mut tables = self.tables.write().await;
        let mut deleted = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            let (gone, kept): (Vec<Json>, Vec<Json>) =
                rows.drain(..).partition(|row| matches(row, filter));
            *rows = kept;
            deleted = gone;
        }
        Ok(deleted)
    }

    async fn increment(
        &self,
        table: Table,
        id: &str,
        column: &str,
        delta: i64,
    ) -> Result<i64, RemoteError> {
        self.check_failure(table, FailOp::Increment).await?;

        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|row| scalar_text(&row["id"]) == id))
            .ok_or(RemoteError::NotFound)?;

        let current = row[column].as_i64().unwrap_or(0);
        let next = (current + delta).max(0);
        row[column] = Json::from(next);
        Ok(next)
    }
}

// =============================================================================
// Evaluation
// =============================================================================

fn with_server_defaults(table: Table, row: Json) -> Json {
    let mut fields = match row {
        Json::Object(fields) => fields,
        _ => Map::new(),
    };
    fields
        .entry("id")
        .or_insert_with(|| Json::from(ulid::Ulid::new().to_string()));
    fields
        .entry("created_at")
        .or_insert_with(|| Json::from(Utc::now().to_rfc3339()));
    if table != Table::UserFavorites {
        for counter in ["views", "favorite_count"] {
            fields.entry(counter).or_insert(Json::from(0));
        }
        if table == Table::ArchivePosts {
            fields.entry("downloads").or_insert(Json::from(0));
        }
    }
    Json::Object(fields)
}

fn project(row: Json, columns: &str) -> Json {
    if columns.trim() == "*" {
        return row;
    }
    let Json::Object(fields) = row else {
        return row;
    };
    let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
    Json::Object(
        fields
            .into_iter()
            .filter(|(key, _)| wanted.contains(&key.as_str()))
            .collect(),
    )
}

fn matches(row: &Json, expr: &Expr) -> bool {
    match expr {
        Expr::And(items) => items.iter().all(|e| matches(row, e)),
        Expr::Or(items) => items.iter().any(|e| matches(row, e)),
        Expr::Not(inner) => !matches(row, inner),
        Expr::Cmp { column, op, value } => compare(&row[column.as_str()], *op, value),
    }
}

fn compare(field: &Json, op: Op, value: &Value) -> bool {
    match op {
        Op::IsNull => field.is_null(),
        Op::Eq => equals(field, value),
        Op::Neq => !field.is_null() && !equals(field, value),
        Op::Gt => ordering(field, value) == Some(Ordering::Greater),
        Op::Gte => matches!(
            ordering(field, value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Op::Lt => ordering(field, value) == Some(Ordering::Less),
        Op::Lte => matches!(
            ordering(field, value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Op::IContains => match (field.as_str(), value) {
            (Some(text), Value::Text(needle)) => {
                text.to_lowercase().contains(&needle.to_lowercase())
            }
            _ => false,
        },
        Op::Contains => match (field.as_array(), value) {
            (Some(items), Value::List(wanted)) => wanted
                .iter()
                .all(|w| items.iter().any(|item| equals(item, w))),
            _ => false,
        },
        Op::In => match value {
            Value::List(options) => options.iter().any(|o| equals(field, o)),
            _ => false,
        },
    }
}

fn equals(field: &Json, value: &Value) -> bool {
    match value {
        Value::Null => field.is_null(),
        Value::Bool(b) => field.as_bool() == Some(*b),
        Value::Int(i) => field.as_i64() == Some(*i) || scalar_text(field) == i.to_string(),
        Value::Text(s) => scalar_text(field) == *s,
        Value::Timestamp(ts) => parse_timestamp(field) == Some(*ts),
        Value::List(_) => false,
    }
}

fn ordering(field: &Json, value: &Value) -> Option<Ordering> {
    match value {
        Value::Int(i) => field.as_i64().map(|f| f.cmp(i)),
        Value::Timestamp(ts) => parse_timestamp(field).map(|f| f.cmp(ts)),
        Value::Text(s) => field.as_str().map(|f| f.cmp(s.as_str())),
        Value::Bool(_) | Value::Null | Value::List(_) => None,
    }
}

/// Total order used for sorting; nulls sort last
fn compare_json(a: &Json, b: &Json) -> Ordering {
    match (a, b) {
        (Json::Null, Json::Null) => Ordering::Equal,
        (Json::Null, _) => Ordering::Greater,
        (_, Json::Null) => Ordering::Less,
        (Json::Number(x), Json::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Json::String(x), Json::String(y)) => match (parse_timestamp(a), parse_timestamp(b)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        _ => scalar_text(a).cmp(&scalar_text(b)),
    }
}

fn parse_timestamp(field: &Json) -> Option<DateTime<Utc>> {
    field
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn scalar_text(field: &Json) -> String {
    match field {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}
