//! DeepWiki - browse, search and favorite AI insight posts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Server-rendered pages (askama)                           │
//! │  - Browse session events, favorites, publishing             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Service / Query Layer                         │
//! │  - Browse sessions, pagination, debouncing                  │
//! │  - Counters, favorites, popular tags, recent activity       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - Remote data service (PostgREST) or in-memory tables      │
//! │  - moka caches (volatile)                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers and routers
//! - `service`: Business logic layer
//! - `query`: Filter state, query builder, pagination, debouncing
//! - `render`: View models and templates
//! - `data`: Remote data service, records and caches
//! - `auth`: Session tokens and extractors
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod query;
pub mod render;
pub mod service;

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Most users whose recent activity is kept at once
const MAX_ACTIVITY_USERS: u64 = 10_000;

/// Largest accepted request body (publish forms, events)
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Application state shared across all handlers
///
/// This struct is cloned for each request; every service behind it is
/// shared.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Per-browser browse sessions (volatile)
    pub sessions: Arc<service::BrowseSessions>,

    pub posts: Arc<service::PostService>,
    pub favorites: Arc<service::FavoriteService>,

    /// Popular tags (cached)
    pub tags: Arc<service::TagService>,

    /// Recent activity per user (volatile)
    pub activity: Arc<service::ActivityService>,

    /// Process start, for the uptime gauge
    pub started_at: Instant,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect the configured data service
    /// 2. Initialize caches
    /// 3. Wire services
    ///
    /// # Errors
    /// Returns error if the data service cannot be built
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let data: Arc<dyn data::DataService> = match config.remote.backend {
            config::RemoteBackend::Postgrest => {
                let service = data::PostgrestDataService::new(
                    &config.remote.url,
                    &config.remote.anon_key,
                    config.remote.timeout(),
                )?;
                tracing::info!(url = %config.remote.url, "Remote data service configured");
                Arc::new(service)
            }
            config::RemoteBackend::Memory => {
                tracing::warn!("Using in-memory data service; nothing will be persisted");
                Arc::new(data::MemoryDataService::new())
            }
        };

        Ok(Self::with_data_service(config, data))
    }

    /// Build state around an existing data service
    pub fn with_data_service(config: config::AppConfig, data: Arc<dyn data::DataService>) -> Self {
        let browse_config = &config.browse;

        let tags_cache = Arc::new(data::PopularTagsCache::new(Duration::from_secs(
            browse_config.popular_tags_ttl,
        )));
        let activity_cache = Arc::new(data::RecentActivityCache::new(
            MAX_ACTIVITY_USERS,
            Duration::from_secs(config.auth.session_max_age.max(1) as u64),
        ));
        tracing::info!("Caches initialized");

        let counters = Arc::new(service::CounterService::new(data.clone(), &config.counters));
        let browse = Arc::new(service::BrowseService::new(
            data.clone(),
            browse_config.page_size,
        ));
        let sessions = Arc::new(service::BrowseSessions::new(
            browse,
            browse_config.search_debounce(),
            Duration::from_secs(browse_config.session_idle_seconds),
        ));
        let posts = Arc::new(service::PostService::new(data.clone(), counters.clone()));
        let favorites = Arc::new(service::FavoriteService::new(
            data.clone(),
            posts.clone(),
            counters,
        ));
        let tags = Arc::new(service::TagService::new(
            data,
            tags_cache,
            browse_config.popular_tags,
        ));
        let activity = Arc::new(service::ActivityService::new(activity_cache));

        tracing::info!("Application state initialized successfully");

        Self {
            config: Arc::new(config),
            sessions,
            posts,
            favorites,
            tags,
            activity,
            started_at: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::pages_router())
        .merge(api::browse_router())
        .merge(api::posts_router())
        .merge(api::favorites_router())
        .merge(api::activity_router())
        .merge(api::metrics_router(state.clone()))
        .layer(middleware::from_fn(api::track_requests))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
