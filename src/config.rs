//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
    pub browse: BrowseConfig,
    pub counters: CounterConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "deepwiki.io")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL
    ///
    /// # Returns
    /// Full URL like "https://deepwiki.io"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Which data service implementation to use
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// Hosted PostgREST table API
    #[default]
    Postgrest,
    /// In-process tables (local development)
    Memory,
}

/// Remote data service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: RemoteBackend,
    /// Project URL (e.g., "https://xyz.supabase.co")
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key
    #[serde(default)]
    pub anon_key: String,
    /// Per-request timeout in seconds (default: 10)
    pub timeout_seconds: u64,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Session token configuration
///
/// Tokens are minted by the hosted auth flow; this server only verifies them.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
}

/// Browse page configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowseConfig {
    /// Posts per page (default: 12)
    pub page_size: u32,
    /// Quiet period before a search keystroke queries (default: 300)
    pub search_debounce_ms: u64,
    /// Number of popular tags shown (default: 10)
    pub popular_tags: usize,
    /// Popular tag cache TTL in seconds (default: 300)
    pub popular_tags_ttl: u64,
    /// Idle browse sessions expire after this many seconds (default: 1800)
    pub session_idle_seconds: u64,
}

impl BrowseConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

/// Counter update policy
#[derive(Debug, Clone, Deserialize)]
pub struct CounterConfig {
    /// Attempts per increment before rolling back (default: 3)
    pub max_attempts: u32,
    /// Initial backoff between attempts, doubled each retry (default: 100)
    pub backoff_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (DEEPWIKI__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("remote.backend", "postgrest")?
            .set_default("remote.timeout_seconds", 10)?
            .set_default("auth.session_max_age", 604800)?
            .set_default("browse.page_size", 12)?
            .set_default("browse.search_debounce_ms", 300)?
            .set_default("browse.popular_tags", 10)?
            .set_default("browse.popular_tags_ttl", 300)?
            .set_default("browse.session_idle_seconds", 1800)?
            .set_default("counters.max_attempts", 3)?
            .set_default("counters.backoff_ms", 100)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (DEEPWIKI__*)
            .add_source(
                Environment::with_prefix("DEEPWIKI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.browse.page_size == 0 {
            return Err(crate::error::AppError::Config(
                "browse.page_size must be greater than 0".to_string(),
            ));
        }

        if self.counters.max_attempts == 0 {
            return Err(crate::error::AppError::Config(
                "counters.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.remote.backend == RemoteBackend::Postgrest {
            let parsed = url::Url::parse(&self.remote.url).map_err(|e| {
                crate::error::AppError::Config(format!(
                    "remote.url must be a valid URL when remote.backend=postgrest: {e}"
                ))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(crate::error::AppError::Config(
                    "remote.url must use http or https".to_string(),
                ));
            }
            if self.remote.anon_key.trim().is_empty() {
                return Err(crate::error::AppError::Config(
                    "remote.anon_key is required when remote.backend=postgrest".to_string(),
                ));
            }
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
