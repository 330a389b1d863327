//! PostgREST data service client
//!
//! Encodes the request model into PostgREST query syntax and talks to the
//! hosted table API (`/rest/v1/{table}`) over `reqwest`.
//!
//! Filters are sent as a single `and=(...)` logic tree. Windows use the
//! `Range` header with `Prefer: count=exact`, and the total comes back in
//! `Content-Range`. Counters go through the `increment_counter` RPC so that
//! concurrent increments never lose updates.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value as Json, json};

use super::request::{Expr, Op, Order, Select, Table, Value};
use super::service::{DataService, RemoteError, Rows};
use crate::metrics::{REMOTE_REQUEST_DURATION_SECONDS, REMOTE_REQUESTS_TOTAL};

/// Embedded author relation (`users` joined through `user_id`)
const AUTHOR_EMBED: &str = "users:user_id(email,raw_user_meta_data)";

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// PostgREST "no rows" for singular responses
const NO_ROWS: &str = "PGRST116";

/// Hosted table API client
pub struct PostgrestDataService {
    client: reqwest::Client,
    rest_url: String,
    anon_key: String,
}

impl PostgrestDataService {
    /// Create a client for the project at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Project URL, e.g. `https://xyz.supabase.co`
    /// * `anon_key` - Public API key sent as `apikey` and bearer token
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("DeepWiki/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn send(
        &self,
        operation: &'static str,
        table: Table,
        builder: RequestBuilder,
    ) -> Result<Response, RemoteError> {
        let timer = REMOTE_REQUEST_DURATION_SECONDS
            .with_label_values(&[operation, table.as_str()])
            .start_timer();
        let started = Instant::now();

        let result = match builder.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            // Window past the end of the result set
            Ok(response) if response.status() == StatusCode::RANGE_NOT_SATISFIABLE => Ok(response),
            Ok(response) => Err(error_from_response(response).await),
            Err(err) => Err(RemoteError::from(err)),
        };
        timer.observe_duration();

        let outcome = if result.is_ok() { "ok" } else { "error" };
        REMOTE_REQUESTS_TOTAL
            .with_label_values(&[operation, table.as_str(), outcome])
            .inc();

        match &result {
            Ok(_) => tracing::debug!(
                operation,
                table = %table,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Remote request completed"
            ),
            Err(error) => tracing::warn!(
                operation,
                table = %table,
                %error,
                "Remote request failed"
            ),
        }

        result
    }
}

#[async_trait]
impl DataService for PostgrestDataService {
    async fn select(&self, query: &Select) -> Result<Rows, RemoteError> {
        let mut builder = self
            .request(Method::GET, query.table.as_str())
            .query(&select_params(query));

        if let Some(window) = query.window {
            builder = builder
                .header("Range-Unit", "items")
                .header("Range", format!("{}-{}", window.offset, window.last_index()));
        }
        if query.count_exact {
            builder = builder.header("Prefer", "count=exact");
        }

        let response = self.send("select", query.table, builder).await?;
        let total = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(Rows {
                rows: Vec::new(),
                total,
            });
        }

        let rows: Vec<Json> = response.json().await?;
        Ok(Rows { rows, total })
    }

    async fn insert(&self, table: Table, row: Json) -> Result<Json, RemoteError> {
        let builder = self
            .request(Method::POST, table.as_str())
            .header("Prefer", "return=representation")
            .json(&row);

        let response = self.send("insert", table, builder).await?;
        let mut rows: Vec<Json> = response.json().await?;
        if rows.is_empty() {
            return Err(RemoteError::Decode("insert returned no rows".to_string()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        table: Table,
        filter: &Expr,
        patch: Json,
    ) -> Result<Vec<Json>, RemoteError> {
        let builder = self
            .request(Method::PATCH, table.as_str())
            .query(&[("and", encode_filter(filter))])
            .header("Prefer", "return=representation")
            .json(&patch);

        let response = self.send("update", table, builder).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: Table, filter: &Expr) -> Result<Vec<Json>, RemoteError> {
        let builder = self
            .request(Method::DELETE, table.as_str())
            .query(&[("and", encode_filter(filter))])
            .header("Prefer", "return=representation");

        let response = self.send("delete", table, builder).await?;
        Ok(response.json().await?)
    }

    async fn increment(
        &self,
        table: Table,
        id: &str,
        column: &str,
        delta: i64,
    ) -> Result<i64, RemoteError> {
        let builder = self.request(Method::POST, "rpc/increment_counter").json(&json!({
            "table_name": table.as_str(),
            "row_id": id,
            "column_name": column,
            "delta": delta,
        }));

        let response = self.send("increment", table, builder).await?;
        match response.json::<Json>().await? {
            Json::Null => Err(RemoteError::NotFound),
            value => value
                .as_i64()
                .ok_or_else(|| RemoteError::Decode(format!("counter value: {value}"))),
        }
    }
}

// =============================================================================
// Error mapping
// =============================================================================

#[derive(Deserialize, Default)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

async fn error_from_response(response: Response) -> RemoteError {
    let status = response.status();
    let body: PostgrestErrorBody = response.json().await.unwrap_or_default();
    classify_error(status.as_u16(), body.code, body.message)
}

fn classify_error(status: u16, code: Option<String>, message: Option<String>) -> RemoteError {
    match code.as_deref() {
        Some(UNIQUE_VIOLATION) => return RemoteError::UniqueViolation,
        Some(NO_ROWS) => return RemoteError::NotFound,
        _ => {}
    }
    if status == StatusCode::CONFLICT.as_u16() {
        return RemoteError::UniqueViolation;
    }
    RemoteError::Backend {
        status,
        code,
        message: message.unwrap_or_else(|| "no error message".to_string()),
    }
}

fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

// =============================================================================
// Query encoding
// =============================================================================

fn select_params(query: &Select) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    let columns = if query.embed_author {
        format!("{},{}", query.columns, AUTHOR_EMBED)
    } else {
        query.columns.clone()
    };
    params.push(("select", columns));

    if let Some(filter) = &query.filter {
        params.push(("and", encode_filter(filter)));
    }
    if !query.order.is_empty() {
        params.push(("order", encode_order(&query.order)));
    }
    params
}

fn encode_order(order: &[Order]) -> String {
    order
        .iter()
        .map(|o| {
            format!(
                "{}.{}",
                o.column,
                if o.descending { "desc" } else { "asc" }
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Encode a filter as the value of a top-level `and` parameter
fn encode_filter(expr: &Expr) -> String {
    let items = match expr {
        Expr::And(items) => items.iter().map(encode_node).collect::<Vec<_>>(),
        other => vec![encode_node(other)],
    };
    format!("({})", items.join(","))
}

fn encode_node(expr: &Expr) -> String {
    match expr {
        Expr::Cmp { column, op, value } => format!("{column}.{}", encode_cmp(*op, value)),
        Expr::And(items) => format!("and({})", join_nodes(items)),
        Expr::Or(items) => format!("or({})", join_nodes(items)),
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Cmp { column, op, value } => {
                format!("{column}.not.{}", encode_cmp(*op, value))
            }
            Expr::Not(twice) => encode_node(twice),
            group => format!("not.{}", encode_node(group)),
        },
    }
}

fn join_nodes(items: &[Expr]) -> String {
    items.iter().map(encode_node).collect::<Vec<_>>().join(",")
}

fn encode_cmp(op: Op, value: &Value) -> String {
    match op {
        Op::Eq => format!("eq.{}", quote(&value.to_query_literal())),
        Op::Neq => format!("neq.{}", quote(&value.to_query_literal())),
        Op::Gt => format!("gt.{}", quote(&value.to_query_literal())),
        Op::Gte => format!("gte.{}", quote(&value.to_query_literal())),
        Op::Lt => format!("lt.{}", quote(&value.to_query_literal())),
        Op::Lte => format!("lte.{}", quote(&value.to_query_literal())),
        Op::IsNull => "is.null".to_string(),
        Op::IContains => {
            let needle = value.to_query_literal();
            format!("ilike.{}", quote(&format!("*{}*", escape_like(&needle))))
        }
        Op::Contains => format!("cs.{}", quote(&array_literal(value))),
        Op::In => format!("in.({})", list_items(value).join(",")),
    }
}

fn list_items(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| quote(&item.to_query_literal()))
            .collect(),
        scalar => vec![quote(&scalar.to_query_literal())],
    }
}

/// Postgres array literal, e.g. `{rust,"game dev"}`
fn array_literal(value: &Value) -> String {
    let elements: Vec<String> = match value {
        Value::List(items) => items.iter().map(Value::to_query_literal).collect(),
        scalar => vec![scalar.to_query_literal()],
    };
    let quoted: Vec<String> = elements
        .iter()
        .map(|e| {
            if e.is_empty()
                || e
                    .chars()
                    .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\') || c.is_whitespace())
            {
                format!("\"{}\"", e.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                e.clone()
            }
        })
        .collect();
    format!("{{{}}}", quoted.join(","))
}

/// Escape LIKE metacharacters; `*` is PostgREST's wildcard alias and is dropped
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '*' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Double-quote values containing logic-tree reserved characters
fn quote(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace());
    if reserved {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn encodes_nested_logic_tree() {
        let expr = Expr::And(vec![
            Expr::Or(vec![
                Expr::icontains("title", "game"),
                Expr::has_element("tags", "game"),
            ]),
            Expr::is_null("embed_url").negate(),
            Expr::cmp("views", Op::Gte, Value::Int(10)),
        ]);
        assert_eq!(
            encode_filter(&expr),
            "(or(title.ilike.*game*,tags.cs.{game}),embed_url.not.is.null,views.gte.10)"
        );
    }

    #[test]
    fn quotes_reserved_characters() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let expr = Expr::cmp("created_at", Op::Lt, Value::Timestamp(ts));
        assert_eq!(
            encode_filter(&expr),
            "(created_at.lt.\"2024-01-05T00:00:00Z\")"
        );
        assert_eq!(
            encode_node(&Expr::icontains("title", "a, b")),
            "title.ilike.\"*a, b*\""
        );
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("100%_done*"), "100\\%\\_done");
    }

    #[test]
    fn negated_group_uses_prefix_form() {
        let expr = Expr::Or(vec![
            Expr::icontains("ai_model", "gpt"),
            Expr::icontains("ai_model", "bard"),
        ])
        .negate();
        assert_eq!(
            encode_node(&expr),
            "not.or(ai_model.ilike.*gpt*,ai_model.ilike.*bard*)"
        );
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(parse_content_range_total("0-11/25"), Some(25));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-11/*"), None);
    }

    #[test]
    fn classifies_unique_violation_by_code_or_status() {
        assert!(matches!(
            classify_error(400, Some("23505".to_string()), None),
            RemoteError::UniqueViolation
        ));
        assert!(matches!(
            classify_error(409, None, None),
            RemoteError::UniqueViolation
        ));
        assert!(matches!(
            classify_error(500, Some("XX000".to_string()), Some("boom".to_string())),
            RemoteError::Backend { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn select_sends_range_and_reads_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/archive_posts"))
            .and(query_param("order", "created_at.desc,id.asc"))
            .and(query_param("and", "(title.ilike.*game*)"))
            .and(header("Range", "12-23"))
            .and(header("Prefer", "count=exact"))
            .and(header("apikey", "anon"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "12-23/25")
                    .set_body_json(json!([{ "id": 13 }])),
            )
            .mount(&server)
            .await;

        let service =
            PostgrestDataService::new(&server.uri(), "anon", Duration::from_secs(5)).unwrap();
        let query = Select::from(Table::ArchivePosts)
            .filter(Expr::icontains("title", "game"))
            .order_by(Order::desc("created_at"))
            .order_by(Order::asc("id"))
            .window(12, 12)
            .count_exact();

        let rows = service.select(&query).await.unwrap();
        assert_eq!(rows.total, Some(25));
        assert_eq!(rows.rows.len(), 1);
    }

    #[tokio::test]
    async fn window_past_end_yields_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/archive_posts"))
            .respond_with(ResponseTemplate::new(416).insert_header("Content-Range", "*/25"))
            .mount(&server)
            .await;

        let service =
            PostgrestDataService::new(&server.uri(), "anon", Duration::from_secs(5)).unwrap();
        let rows = service
            .select(&Select::from(Table::ArchivePosts).window(48, 12).count_exact())
            .await
            .unwrap();
        assert!(rows.rows.is_empty());
        assert_eq!(rows.total, Some(25));
    }

    #[tokio::test]
    async fn duplicate_insert_maps_to_unique_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_favorites"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint"
            })))
            .mount(&server)
            .await;

        let service =
            PostgrestDataService::new(&server.uri(), "anon", Duration::from_secs(5)).unwrap();
        let error = service
            .insert(Table::UserFavorites, json!({ "post_id": "1" }))
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::UniqueViolation));
    }

    #[tokio::test]
    async fn increment_calls_rpc() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/increment_counter"))
            .and(body_json(json!({
                "table_name": "archive_posts",
                "row_id": "7",
                "column_name": "views",
                "delta": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
            .mount(&server)
            .await;

        let service =
            PostgrestDataService::new(&server.uri(), "anon", Duration::from_secs(5)).unwrap();
        let value = service
            .increment(Table::ArchivePosts, "7", "views", 1)
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn timed_out_increment_is_sent_once() {
        use crate::config::CounterConfig;
        use crate::data::PostKind;
        use crate::service::{Counter, CounterService};
        use std::sync::Arc;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/increment_counter"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(5))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service =
            PostgrestDataService::new(&server.uri(), "anon", Duration::from_millis(50)).unwrap();
        let error = service
            .increment(Table::ArchivePosts, "7", "views", 1)
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Network(_)));

        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/increment_counter"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(5))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let counters = CounterService::new(
            Arc::new(service),
            &CounterConfig {
                max_attempts: 3,
                backoff_ms: 0,
            },
        );
        let update = counters
            .apply(PostKind::Archive, "7", Counter::Views, 1, 4)
            .await;
        assert_eq!(update.value, 4);
        assert!(!update.committed);
        server.verify().await;
    }
}
