//! Remote data service interface
//!
//! Authentication, persistence, row-level security and counters are owned
//! by the hosted backend. Everything above the data layer talks to it only
//! through [`DataService`].

use async_trait::async_trait;
use serde_json::Value as Json;
use thiserror::Error;

use super::request::{Expr, Select, Table};

/// Errors reported by a data service backend
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Connection never established, so nothing reached the backend
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Transport failure after the request was sent (timeout, reset). The
    /// backend may or may not have applied it.
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with an error status
    #[error("backend returned {status}: {message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Unique constraint violated (Postgres 23505)
    #[error("unique constraint violated")]
    UniqueViolation,

    /// Targeted row does not exist
    #[error("row not found")]
    NotFound,

    /// Response body could not be interpreted
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if err.is_connect() {
            RemoteError::Unreachable(err.to_string())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

/// Rows returned by a select, plus the exact total when requested
#[derive(Debug, Clone, Default)]
pub struct Rows {
    pub rows: Vec<Json>,
    pub total: Option<u64>,
}

/// Hosted table API
#[async_trait]
pub trait DataService: Send + Sync {
    /// Run a filtered, ordered, windowed read
    async fn select(&self, query: &Select) -> Result<Rows, RemoteError>;

    /// Insert one row and return it as stored
    async fn insert(&self, table: Table, row: Json) -> Result<Json, RemoteError>;

    /// Patch every row matching `filter`, returning the updated rows
    async fn update(&self, table: Table, filter: &Expr, patch: Json)
    -> Result<Vec<Json>, RemoteError>;

    /// Delete every row matching `filter`, returning the deleted rows
    async fn delete(&self, table: Table, filter: &Expr) -> Result<Vec<Json>, RemoteError>;

    /// Atomically add `delta` to an integer column and return the new value
    ///
    /// The stored value never drops below zero.
    async fn increment(
        &self,
        table: Table,
        id: &str,
        column: &str,
        delta: i64,
    ) -> Result<i64, RemoteError>;
}
