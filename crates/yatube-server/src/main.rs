//! # yatube-server
//!
//! HTTP server for Yatube, a small blogging site.
//!
//! This binary provides:
//! - **Feeds**: home (cached), group, profile and followed-authors pages,
//!   all paginated
//! - **Posts**: detail pages with comments, create and edit forms with image
//!   upload
//! - **Follows** between users
//! - **Accounts**: signup, login and logout with cookie sessions
//! - **Admin API** (bearer token) for groups, users and the page cache

mod admin;
mod api;
mod auth;
mod config;
mod error;
mod media_store;
mod page_cache;
mod render;
mod views;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use yatube_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::media_store::MediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,yatube_server=debug")),
        )
        .init();

    info!("Starting Yatube server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        database = %config.database_path.display(),
        media = %config.media_root.display(),
        cache_ttl_secs = config.index_cache_ttl.as_secs(),
        per_page = config.posts_per_page,
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    let media = MediaStore::new(config.media_root.clone()).await?;

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, media, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Evict stale home page renders once per TTL (at least every second).
    let cache = app_state.page_cache.clone();
    let period = cache.ttl().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            cache.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP server until it fails or Ctrl+C arrives
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
