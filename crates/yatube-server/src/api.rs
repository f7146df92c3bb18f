use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;
use yatube_store::Database;

use crate::admin;
use crate::auth;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::media_store::MediaStore;
use crate::page_cache::PageCache;
use crate::render;
use crate::views;

/// Room for multipart framing and text fields on top of the image itself.
const FORM_OVERHEAD: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub media: Arc<MediaStore>,
    pub page_cache: PageCache,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, media: MediaStore, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            media: Arc::new(media),
            page_cache: PageCache::new(config.index_cache_ttl),
            config: Arc::new(config),
        }
    }

    /// Lock the database. Never hold the guard across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Database>, ServerError> {
        self.db
            .lock()
            .map_err(|e| ServerError::Internal(format!("Database lock poisoned: {e}")))
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size + FORM_OVERHEAD;

    Router::new()
        .route("/", get(views::index))
        .route("/groups/", get(views::groups))
        .route("/group/:slug/", get(views::group_posts))
        .route("/profile/:username/", get(views::profile))
        .route(
            "/profile/:username/follow/",
            get(views::profile_follow).post(views::profile_follow),
        )
        .route(
            "/profile/:username/unfollow/",
            get(views::profile_unfollow).post(views::profile_unfollow),
        )
        .route("/posts/:post_id/", get(views::post_detail))
        .route(
            "/posts/:post_id/edit/",
            get(views::post_edit_form).post(views::post_edit),
        )
        .route("/posts/:post_id/comment/", post(views::add_comment))
        .route(
            "/create/",
            get(views::post_create_form).post(views::post_create),
        )
        .route("/follow/", get(views::follow_index))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/media/posts/:file_name", get(media_image))
        .route("/health", get(health_check))
        .route("/admin/groups", post(admin::create_group))
        .route("/admin/groups/:slug", delete(admin::delete_group))
        .route("/admin/users/:username", delete(admin::delete_user))
        .route("/admin/posts/:post_id", delete(admin::delete_post))
        .route("/admin/cache/clear", post(admin::clear_cache))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A 302 redirect.
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => ServerError::Internal(format!("Bad redirect target: {location}")).into_response(),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn media_image(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ServerError> {
    let (data, kind) = state.media.read_post_image(&file_name).await?;
    Ok(([(header::CONTENT_TYPE, kind.content_type())], data).into_response())
}

async fn not_found() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html(render::not_found_page()))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::test_support::{body_string, get, TestApp, SMALL_GIF};

    #[test]
    fn test_found() {
        let response = found("/posts/1/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/posts/1/");
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let response = app.send(get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_path_renders_404_page() {
        let app = TestApp::new().await;
        let response = app.send(get("/nonexist-page/", None)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_string(response).await;
        assert!(body.contains("data-template=\"core/404.html\""));
    }

    #[tokio::test]
    async fn test_media_served_with_content_type() {
        let app = TestApp::new().await;
        std::fs::write(app.state.media.root().join("posts/pic.gif"), SMALL_GIF).unwrap();

        let response = app.send(get("/media/posts/pic.gif", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");

        let response = app.send(get("/media/posts/missing.gif", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
