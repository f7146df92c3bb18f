//! Router fixtures for handler tests.

use std::sync::MutexGuard;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;
use yatube_store::{Database, NewPost, Post, User};

use crate::api::{build_router, AppState};
use crate::config::ServerConfig;
use crate::media_store::MediaStore;

pub const ADMIN_TOKEN: &str = "test-admin-token";

// 2x1 GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const BOUNDARY: &str = "yatube-test-boundary";

/// A router over a throwaway database and media root.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = ServerConfig {
            database_path: dir.path().join("yatube.db"),
            media_root: dir.path().join("media"),
            admin_token: Some(ADMIN_TOKEN.to_string()),
            ..ServerConfig::default()
        };
        tweak(&mut config);

        let db = Database::open_at(&config.database_path).unwrap();
        let media = MediaStore::new(config.media_root.clone()).await.unwrap();
        let state = AppState::new(db, media, config);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn db(&self) -> MutexGuard<'_, Database> {
        self.state.db().unwrap()
    }

    /// Create a user with an open session; returns the `Cookie` header value.
    pub fn login(&self, username: &str) -> (User, String) {
        let db = self.db();
        let user = db.create_user(username, "!").unwrap();
        let session = db.create_session(user.id).unwrap();
        (user, format!("sessionid={}", session.token))
    }
}

pub fn add_post(app: &TestApp, author_id: i64, text: &str, group_id: Option<i64>) -> Post {
    app.db()
        .create_post(&NewPost {
            text: text.to_string(),
            author_id,
            group_id,
            image: None,
        })
        .unwrap()
}

/// A JSON admin API request, with a bearer token when given.
pub fn admin_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    json: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match json {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// POST an urlencoded form body.
pub fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// POST a multipart body with text fields and an optional `image` file.
pub fn multipart_request(
    uri: &str,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
