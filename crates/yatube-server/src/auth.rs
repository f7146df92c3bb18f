//! Sessions, password hashing and access checks.
//!
//! Every request resolves a [`Viewer`] from the `sessionid` cookie. Protected
//! handlers call [`authorize`] and turn a denial into a redirect; they never
//! render an error page for it.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;
use yatube_shared::constants::SESSION_COOKIE;
use yatube_shared::forms::{
    SignupForm, SignupInput, MSG_BAD_CREDENTIALS, MSG_REQUIRED, MSG_USERNAME_TAKEN,
};
use yatube_shared::FormErrors;
use yatube_store::{StoreError, User};

use crate::api::{found, AppState};
use crate::error::ServerError;
use crate::render::{self, FormState, Layout};

// ---------------------------------------------------------------------------
// Viewer
// ---------------------------------------------------------------------------

/// Whoever is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(User),
}

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(user) => Some(user),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user().map(|u| u.username.as_str())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(Viewer::Anonymous);
        };

        let db = state.db()?;
        Ok(match db.get_session_user(token)? {
            Some(user) => Viewer::User(user),
            None => Viewer::Anonymous,
        })
    }
}

/// Session token carried by the request's `Cookie` headers, if well-formed.
pub fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<'a> {
    Authorized(&'a User),
    Unauthenticated,
    /// Logged in, but not the owner of the resource.
    Forbidden,
}

/// Check a viewer against a resource. `owner_id` is `None` for actions any
/// logged-in user may take.
pub fn authorize(viewer: &Viewer, owner_id: Option<i64>) -> Access<'_> {
    match viewer {
        Viewer::Anonymous => Access::Unauthenticated,
        Viewer::User(user) => match owner_id {
            Some(owner) if owner != user.id => Access::Forbidden,
            _ => Access::Authorized(user),
        },
    }
}

/// 302 to the login page, returning to `next` afterwards.
pub fn login_redirect(next: &str) -> Response {
    found(&format!("/auth/login/?next={}", urlencoding::encode(next)))
}

/// A post-login target: only local absolute paths are honored.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

// ---------------------------------------------------------------------------
// Passwords and cookies
// ---------------------------------------------------------------------------

pub fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServerError::Internal(format!("Password hashing failed: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!("failed to parse password hash: {}", err);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

fn session_cookie(token: Uuid) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/")
}

fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

fn with_cookie(mut response: Response, cookie: String) -> Result<Response, ServerError> {
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ServerError::Internal(format!("Bad cookie header: {e}")))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

async fn run_blocking<T, F>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("Blocking task failed: {e}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn signup_form(State(state): State<AppState>, viewer: Viewer) -> Html<String> {
    let layout = Layout::new(&state.config, &viewer);
    Html(render::signup(&layout, &FormState::default()))
}

pub async fn signup(
    State(state): State<AppState>,
    viewer: Viewer,
    Form(input): Form<SignupInput>,
) -> Result<Response, ServerError> {
    let rerender = |errors: FormErrors| {
        let form = FormState::new(errors).with("username", &input.username);
        let layout = Layout::new(&state.config, &viewer);
        Html(render::signup(&layout, &form)).into_response()
    };

    let cleaned = match SignupForm::validate(&input) {
        Ok(cleaned) => cleaned,
        Err(errors) => return Ok(rerender(errors)),
    };

    let password = cleaned.password.clone();
    let password_hash = run_blocking(move || hash_password(&password)).await??;

    let created = {
        let db = state.db()?;
        match db.create_user(&cleaned.username, &password_hash) {
            Ok(user) => Some(db.create_session(user.id)?),
            Err(StoreError::Conflict(_)) => None,
            Err(e) => return Err(e.into()),
        }
    };

    let Some(session) = created else {
        let mut errors = FormErrors::new();
        errors.add("username", MSG_USERNAME_TAKEN);
        return Ok(rerender(errors));
    };

    info!(username = %cleaned.username, "User signed up");
    with_cookie(found("/"), session_cookie(session.token))
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn login_form(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<NextQuery>,
) -> Html<String> {
    let layout = Layout::new(&state.config, &viewer);
    Html(render::login(
        &layout,
        &FormState::default(),
        query.next.as_deref(),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginSubmission {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    viewer: Viewer,
    Form(input): Form<LoginSubmission>,
) -> Result<Response, ServerError> {
    let rerender = |errors: FormErrors| {
        let form = FormState::new(errors).with("username", &input.username);
        let layout = Layout::new(&state.config, &viewer);
        Html(render::login(&layout, &form, input.next.as_deref())).into_response()
    };

    let mut errors = FormErrors::new();
    let username = input.username.trim();
    if username.is_empty() {
        errors.add("username", MSG_REQUIRED);
    }
    if input.password.is_empty() {
        errors.add("password", MSG_REQUIRED);
    }
    if !errors.is_empty() {
        return Ok(rerender(errors));
    }

    let user = {
        let db = state.db()?;
        match db.get_user_by_username(username) {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        }
    };

    let verified = match user {
        Some(user) => {
            let password = input.password.clone();
            let hash = user.password_hash.clone();
            if run_blocking(move || verify_password(&password, &hash)).await? {
                Some(user)
            } else {
                None
            }
        }
        None => None,
    };

    let Some(user) = verified else {
        debug!(username, "Rejected login");
        let mut errors = FormErrors::new();
        errors.add("__all__", MSG_BAD_CREDENTIALS);
        return Ok(rerender(errors));
    };

    let session = {
        let db = state.db()?;
        db.create_session(user.id)?
    };

    info!(username = %user.username, "User logged in");
    with_cookie(
        found(safe_next(input.next.as_deref())),
        session_cookie(session.token),
    )
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    if let Some(token) = session_token(&headers) {
        let db = state.db()?;
        db.delete_session(token)?;
    }

    let layout = Layout::new(&state.config, &Viewer::Anonymous);
    let page = Html(render::logged_out(&layout)).into_response();
    with_cookie(page, expired_session_cookie())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::test_support::{body_string, form_request, get, location, TestApp};

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            password_hash: String::new(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_authorize() {
        let anon = Viewer::Anonymous;
        let author = Viewer::User(user(1));

        assert_eq!(authorize(&anon, None), Access::Unauthenticated);
        assert_eq!(authorize(&anon, Some(1)), Access::Unauthenticated);
        assert!(matches!(authorize(&author, None), Access::Authorized(u) if u.id == 1));
        assert!(matches!(authorize(&author, Some(1)), Access::Authorized(_)));
        assert_eq!(authorize(&author, Some(2)), Access::Forbidden);
    }

    #[test]
    fn test_session_token_parsing() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; sessionid={token}")).unwrap(),
        );
        assert_eq!(session_token(&headers), Some(token));

        headers.insert(header::COOKIE, HeaderValue::from_static("sessionid=garbage"));
        assert_eq!(session_token(&headers), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/create/")), "/create/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_login_redirect_encodes_next() {
        let response = login_redirect("/posts/1/edit/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            location(&response),
            "/auth/login/?next=%2Fposts%2F1%2Fedit%2F"
        );

        let response = login_redirect("/?page=2");
        assert_eq!(location(&response), "/auth/login/?next=%2F%3Fpage%3D2");
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    fn session_from(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_signup_login_logout() {
        let app = TestApp::new().await;

        let response = app
            .send(form_request(
                "/auth/signup/",
                "username=margarita&password1=master1930&password2=master1930",
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");
        assert!(session_from(&response).starts_with("sessionid="));
        assert!(app.db().get_user_by_username("margarita").is_ok());

        let response = app
            .send(form_request(
                "/auth/login/",
                "username=margarita&password=master1930&next=%2Ffollow%2F",
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/follow/");
        let cookie = session_from(&response);

        let response = app.send(get("/auth/logout/", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let token = Uuid::parse_str(cookie.trim_start_matches("sessionid=")).unwrap();
        assert_eq!(app.db().get_session_user(token).unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_credentials_rerender() {
        let app = TestApp::new().await;

        let response = app
            .send(form_request(
                "/auth/login/",
                "username=nobody&password=whatever1",
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("data-template=\"users/login.html\""));
        assert!(body.contains(&render::escape(MSG_BAD_CREDENTIALS)));
    }

    #[tokio::test]
    async fn test_signup_duplicate_username() {
        let app = TestApp::new().await;
        app.db().create_user("margarita", "h").unwrap();

        let response = app
            .send(form_request(
                "/auth/signup/",
                "username=margarita&password1=master1930&password2=master1930",
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains(&render::escape(MSG_USERNAME_TAKEN)));
        assert_eq!(app.db().count_users().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_viewer_resolved_from_cookie() {
        let app = TestApp::new().await;
        let (_, cookie) = app.login("behemoth");

        let body = body_string(app.send(get("/", Some(&cookie))).await).await;
        assert!(body.contains("/profile/behemoth/"));

        let body = body_string(app.send(get("/", None)).await).await;
        assert!(body.contains("/auth/login/"));
    }
}
