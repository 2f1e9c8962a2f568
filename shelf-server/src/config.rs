//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::str::FromStr;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// PostgreSQL URL; in-memory storage when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 10)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 1)
    pub database_min_connections: u32,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 1)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Upper bound for one similarity recompute pass in seconds (default: 300)
    pub recompute_timeout_secs: u64,
    /// Genre-group reads in flight during a recompute (default: 4)
    pub recompute_read_concurrency: usize,
    /// Open Library base URL (default: https://openlibrary.org)
    pub openlibrary_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            database_url: None,
            database_max_connections: 10,
            database_min_connections: 1,
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 1,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            recompute_timeout_secs: 300,
            recompute_read_concurrency: shelf_core::similarity::DEFAULT_READ_CONCURRENCY,
            openlibrary_url: "https://openlibrary.org".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let openlibrary_url =
            std::env::var("OPENLIBRARY_URL").unwrap_or(defaults.openlibrary_url);

        Self {
            port: env_or("PORT", defaults.port),
            host,
            database_url,
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            database_min_connections: env_or(
                "DATABASE_MIN_CONNECTIONS",
                defaults.database_min_connections,
            ),
            allowed_origins,
            body_limit_mb: env_or("BODY_LIMIT_MB", defaults.body_limit_mb),
            timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_or("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            recompute_timeout_secs: env_or(
                "RECOMPUTE_TIMEOUT_SECS",
                defaults.recompute_timeout_secs,
            ),
            recompute_read_concurrency: env_or(
                "RECOMPUTE_READ_CONCURRENCY",
                defaults.recompute_read_concurrency,
            ),
            openlibrary_url,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

/// Parse `name` from the environment, keeping `default` when unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.recompute_read_concurrency, 4);
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            port: 8080,
            host: [0, 0, 0, 0],
            ..Default::default()
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("SHELF_TEST_ENV_OR_GARBAGE", "not-a-number");
        assert_eq!(env_or("SHELF_TEST_ENV_OR_GARBAGE", 7u64), 7);
        std::env::set_var("SHELF_TEST_ENV_OR_GARBAGE", " 42 ");
        assert_eq!(env_or("SHELF_TEST_ENV_OR_GARBAGE", 7u64), 42);
        std::env::remove_var("SHELF_TEST_ENV_OR_GARBAGE");
        assert_eq!(env_or("SHELF_TEST_ENV_OR_GARBAGE", 7u64), 7);
    }
}
