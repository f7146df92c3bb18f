//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use yatube_shared::constants::{
    APP_NAME, DEFAULT_HTTP_PORT, INDEX_CACHE_TTL_SECS, MAX_UPLOAD_SIZE, POSTS_PER_PAGE,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./yatube.db`
    pub database_path: PathBuf,

    /// Directory where uploaded images are stored.
    /// Env: `MEDIA_ROOT`
    /// Default: `./media`
    pub media_root: PathBuf,

    /// How long a rendered home page is served from cache.
    /// Env: `INDEX_CACHE_TTL_SECS`
    /// Default: 20 seconds
    pub index_cache_ttl: Duration,

    /// Rows per feed page.
    /// Env: `POSTS_PER_PAGE`
    /// Default: 10
    pub posts_per_page: usize,

    /// Maximum uploaded image size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 5 MiB
    pub max_upload_size: usize,

    /// Site name shown in page titles and the footer.
    /// Env: `SITE_NAME`
    pub site_name: String,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./yatube.db"),
            media_root: PathBuf::from("./media"),
            index_cache_ttl: Duration::from_secs(INDEX_CACHE_TTL_SECS),
            posts_per_page: POSTS_PER_PAGE,
            max_upload_size: MAX_UPLOAD_SIZE,
            site_name: APP_NAME.to_string(),
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            config.http_addr = parse_or_default("HTTP_ADDR", &addr, config.http_addr);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("MEDIA_ROOT") {
            config.media_root = PathBuf::from(path);
        }

        if let Some(val) = lookup("INDEX_CACHE_TTL_SECS") {
            let secs = parse_or_default("INDEX_CACHE_TTL_SECS", &val, INDEX_CACHE_TTL_SECS);
            config.index_cache_ttl = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("POSTS_PER_PAGE") {
            let n = parse_or_default("POSTS_PER_PAGE", &val, POSTS_PER_PAGE);
            config.posts_per_page = if n == 0 {
                tracing::warn!("POSTS_PER_PAGE must be positive, using default");
                POSTS_PER_PAGE
            } else {
                n
            };
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            config.max_upload_size = parse_or_default("MAX_UPLOAD_SIZE", &val, MAX_UPLOAD_SIZE);
        }

        if let Some(name) = lookup("SITE_NAME") {
            if !name.trim().is_empty() {
                config.site_name = name;
            }
        }

        if let Some(token) = lookup("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_or_default<T: FromStr + Copy>(key: &str, raw: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Invalid value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8000).into());
        assert_eq!(config.index_cache_ttl, Duration::from_secs(20));
        assert_eq!(config.posts_per_page, 10);
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("MEDIA_ROOT", "/srv/media"),
            ("INDEX_CACHE_TTL_SECS", "5"),
            ("POSTS_PER_PAGE", "3"),
            ("ADMIN_TOKEN", "secret"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.index_cache_ttl, Duration::from_secs(5));
        assert_eq!(config.posts_per_page, 3);
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("POSTS_PER_PAGE", "0"),
            ("MAX_UPLOAD_SIZE", "lots"),
            ("ADMIN_TOKEN", ""),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8000).into());
        assert_eq!(config.posts_per_page, 10);
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
        assert!(config.admin_token.is_none());
    }
}
