//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::Arc;

use deepwiki::auth::{Session, create_session_token};
use deepwiki::data::{MemoryDataService, Table};
use deepwiki::{AppState, config};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Test server instance backed by in-memory tables
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub data: Arc<MemoryDataService>,
    pub client: reqwest::Client,
}

pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        remote: config::RemoteConfig {
            backend: config::RemoteBackend::Memory,
            url: String::new(),
            anon_key: String::new(),
            timeout_seconds: 5,
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 604800,
        },
        browse: config::BrowseConfig {
            page_size: 12,
            search_debounce_ms: 50,
            popular_tags: 10,
            popular_tags_ttl: 300,
            session_idle_seconds: 1800,
        },
        counters: config::CounterConfig {
            max_attempts: 2,
            backoff_ms: 1,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        deepwiki::metrics::init_metrics();

        let data = Arc::new(MemoryDataService::new());
        let state = AppState::with_data_service(test_config(), data.clone());

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = deepwiki::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            data,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Signed session token for `user_id`
    pub fn token(&self, user_id: &str) -> String {
        let mut session = Session::new(
            user_id,
            Some(format!("{user_id}@example.com")),
            self.state.config.auth.session_max_age,
        );
        session.display_name = Some(format!("User {user_id}"));
        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Seed archive posts
    pub async fn seed_archive(&self, rows: impl IntoIterator<Item = Value>) {
        self.data.seed(Table::ArchivePosts, rows).await;
    }

    pub async fn seed_collab(&self, rows: impl IntoIterator<Item = Value>) {
        self.data.seed(Table::CollabPosts, rows).await;
    }

    pub async fn archive_row(&self, id: &str) -> Value {
        self.data
            .rows(Table::ArchivePosts)
            .await
            .into_iter()
            .find(|row| row["id"] == id)
            .expect("archive post exists")
    }
}

/// Archive post row with sensible defaults
///
/// `created_at` is spaced one minute apart by `n` so newest-first order is
/// predictable.
pub fn archive_post(n: u32, title: &str, ai_model: &str, tags: &[&str]) -> Value {
    json!({
        "id": format!("p{n:03}"),
        "user_id": "author-1",
        "title": title,
        "ai_model": ai_model,
        "prompt": format!("Prompt {n}"),
        "prompt_is_public": true,
        "content": format!("Insight number {n}"),
        "tags": tags,
        "views": n,
        "created_at": format!("2024-01-01T{:02}:{:02}:00Z", n / 60, n % 60),
        "users": {
            "email": "author@example.com",
            "raw_user_meta_data": {"display_name": "Author One"},
        },
    })
}
