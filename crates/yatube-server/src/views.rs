//! HTML page handlers: feeds, post detail, post create/edit, comments and
//! follows.
//!
//! The database lock is taken inside short synchronous blocks and always
//! released before the next `.await`.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::FormRejection, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, Uri},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use yatube_shared::forms::{
    CleanedPost, CommentForm, CommentInput, ImageChange, PostForm, PostInput, UploadedFile, COMMENT_TEXT,
    IMAGE_CLEAR_FIELD, POST_GROUP, POST_IMAGE, POST_TEXT,
};
use yatube_shared::{FormErrors, PageRequest};
use yatube_store::{FollowOutcome, NewComment, NewPost, Post, PostFilter, PostUpdate, User};

use crate::api::{found, AppState};
use crate::auth::{authorize, login_redirect, Access, Viewer};
use crate::error::ServerError;
use crate::page_cache::cache_key;
use crate::render::{
    self, post_url, profile_url, FormState, Layout, PostDetailView, PostFormView, ProfileView,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref())
    }
}

fn parse_id(raw: &str) -> Result<i64, ServerError> {
    raw.parse().map_err(|_| ServerError::NotFound)
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// Home feed, served from the page cache while an entry is fresh.
pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Response, ServerError> {
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok());
    let key = cache_key(path_and_query, cookie);

    if let Some(cached) = state.page_cache.get(&key).await {
        debug!(path = path_and_query, "Home page served from cache");
        return Ok(Html(cached.body).into_response());
    }

    let page = {
        let db = state.db()?;
        db.posts_page(PostFilter::All, query.request(), state.config.posts_per_page)?
    };
    let body = render::index(&Layout::new(&state.config, &viewer), &page);

    state.page_cache.put(key, body.clone()).await;
    Ok(Html(body).into_response())
}

pub async fn groups(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ServerError> {
    let page = {
        let db = state.db()?;
        db.groups_page(query.request(), state.config.posts_per_page)?
    };
    Ok(Html(render::groups(&Layout::new(&state.config, &viewer), &page)))
}

pub async fn group_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ServerError> {
    let (group, page) = {
        let db = state.db()?;
        let group = db.get_group_by_slug(&slug)?;
        let page = db.posts_page(
            PostFilter::Group(group.id),
            query.request(),
            state.config.posts_per_page,
        )?;
        (group, page)
    };
    Ok(Html(render::group_list(
        &Layout::new(&state.config, &viewer),
        &group,
        &page,
    )))
}

pub async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ServerError> {
    let (author, page, following) = {
        let db = state.db()?;
        let author = db.get_user_by_username(&username)?;
        let page = db.posts_page(
            PostFilter::Author(author.id),
            query.request(),
            state.config.posts_per_page,
        )?;
        let following = match viewer.user() {
            Some(user) if user.id != author.id => db.is_following(user.id, author.id)?,
            _ => false,
        };
        (author, page, following)
    };

    let can_follow = viewer.user().is_some_and(|user| user.id != author.id);
    let view = ProfileView {
        author: &author,
        post_count: page.count,
        following,
        can_follow,
        page: &page,
    };
    Ok(Html(render::profile(&Layout::new(&state.config, &viewer), &view)))
}

pub async fn follow_index(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Response, ServerError> {
    let Access::Authorized(user) = authorize(&viewer, None) else {
        return Ok(login_redirect(uri.path()));
    };

    let page = {
        let db = state.db()?;
        db.posts_page(
            PostFilter::FollowedBy(user.id),
            query.request(),
            state.config.posts_per_page,
        )?
    };
    Ok(Html(render::follow(&Layout::new(&state.config, &viewer), &page)).into_response())
}

// ---------------------------------------------------------------------------
// Post detail and comments
// ---------------------------------------------------------------------------

/// Render a post page. `comment_form` is the state of the comment form,
/// shown only to logged-in viewers.
fn render_post_detail(
    state: &AppState,
    viewer: &Viewer,
    post_id: i64,
    comment_form: FormState,
) -> Result<String, ServerError> {
    let (post, comments, author_post_count) = {
        let db = state.db()?;
        let post = db.get_post_view(post_id)?;
        let comments = db.list_comments_for_post(post_id)?;
        let count = db.count_posts(PostFilter::Author(post.post.author_id))?;
        (post, comments, count)
    };

    let user = viewer.user();
    let view = PostDetailView {
        post: &post,
        author_post_count,
        comments: &comments,
        comment_form: user.map(|_| &comment_form),
        can_edit: user.is_some_and(|u| u.id == post.post.author_id),
    };
    Ok(render::post_detail(&Layout::new(&state.config, viewer), &view))
}

pub async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<String>,
) -> Result<Html<String>, ServerError> {
    let post_id = parse_id(&post_id)?;
    let body = render_post_detail(&state, &viewer, post_id, FormState::default())?;
    Ok(Html(body))
}

pub async fn add_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Path(post_id): Path<String>,
    form: Result<Form<CommentInput>, FormRejection>,
) -> Result<Response, ServerError> {
    let Access::Authorized(user) = authorize(&viewer, None) else {
        return Ok(login_redirect(uri.path()));
    };
    let post_id = parse_id(&post_id)?;
    let Form(input) = form.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    {
        let db = state.db()?;
        db.get_post(post_id)?;
    }

    match CommentForm::validate(&input) {
        Ok(cleaned) => {
            let comment = {
                let db = state.db()?;
                db.create_comment(&NewComment {
                    post_id,
                    author_id: user.id,
                    text: cleaned.text,
                    image: None,
                })?
            };
            info!(comment_id = comment.id, post_id, author = %user, "Comment added");
            Ok(found(&post_url(post_id)))
        }
        Err(errors) => {
            debug!(post_id, "Invalid comment, re-rendering post page");
            let form = FormState::new(errors).with(COMMENT_TEXT.name, input.text);
            let body = render_post_detail(&state, &viewer, post_id, form)?;
            Ok(Html(body).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Post create / edit
// ---------------------------------------------------------------------------

/// Pull the post form fields out of a multipart body.
async fn read_post_input(mut multipart: Multipart) -> Result<PostInput, ServerError> {
    let mut input = PostInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let read_err = |e: axum::extract::multipart::MultipartError| {
            ServerError::BadRequest(format!("Failed to read field '{}': {}", name, e))
        };

        if name == POST_TEXT.name {
            input.text = field.text().await.map_err(read_err)?;
        } else if name == POST_GROUP.name {
            input.group = field.text().await.map_err(read_err)?;
        } else if name == POST_IMAGE.name {
            let file_name = field.file_name().unwrap_or("").to_string();
            let data = field.bytes().await.map_err(read_err)?;
            // An empty file input still sends a part with no name and no data.
            if !(file_name.is_empty() && data.is_empty()) {
                input.image = Some(UploadedFile {
                    file_name,
                    data: data.to_vec(),
                });
            }
        } else if name == IMAGE_CLEAR_FIELD {
            let value = field.text().await.map_err(read_err)?;
            input.clear_image = !value.is_empty() && value != "off";
        }
    }

    Ok(input)
}

fn post_form_state(input: &PostInput, errors: FormErrors) -> FormState {
    FormState::new(errors)
        .with(POST_TEXT.name, input.text.clone())
        .with(POST_GROUP.name, input.group.clone())
}

fn render_post_form(
    state: &AppState,
    viewer: &Viewer,
    form: &FormState,
    editing: Option<i64>,
    current_image: Option<&str>,
) -> Result<Response, ServerError> {
    let groups = {
        let db = state.db()?;
        db.list_groups()?
    };
    let view = PostFormView {
        form,
        groups: &groups,
        editing,
        current_image,
    };
    let body = render::create_post(&Layout::new(&state.config, viewer), &view);
    Ok(Html(body).into_response())
}

/// Validate a post submission against the current group list.
fn validate_post(
    state: &AppState,
    input: &PostInput,
) -> Result<Result<CleanedPost, FormErrors>, ServerError> {
    let group_ids: Vec<i64> = {
        let db = state.db()?;
        db.list_groups()?.into_iter().map(|g| g.id).collect()
    };
    Ok(PostForm::new(&group_ids, state.config.max_upload_size).validate(input))
}

pub async fn post_create_form(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
) -> Result<Response, ServerError> {
    if authorize(&viewer, None) == Access::Unauthenticated {
        return Ok(login_redirect(uri.path()));
    }
    render_post_form(&state, &viewer, &FormState::default(), None, None)
}

pub async fn post_create(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let Access::Authorized(user) = authorize(&viewer, None) else {
        return Ok(login_redirect(uri.path()));
    };
    let multipart = multipart.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let input = read_post_input(multipart).await?;

    let cleaned = match validate_post(&state, &input)? {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            debug!(fields = errors.iter().count(), "Invalid post submission");
            let form = post_form_state(&input, errors);
            return render_post_form(&state, &viewer, &form, None, None);
        }
    };

    let image = match &cleaned.image {
        ImageChange::Replace(image) => Some(state.media.save_post_image(image).await?),
        ImageChange::Keep | ImageChange::Clear => None,
    };

    let created = {
        let db = state.db()?;
        db.create_post(&NewPost {
            text: cleaned.text,
            author_id: user.id,
            group_id: cleaned.group_id,
            image: image.clone(),
        })
    };

    match created {
        Ok(post) => {
            info!(post_id = post.id, author = %user, "Post created");
            Ok(found(&profile_url(&user.username)))
        }
        Err(e) => {
            discard_image(&state, image.as_deref()).await;
            Err(e.into())
        }
    }
}

/// Best-effort removal of an image no post refers to.
async fn discard_image(state: &AppState, image: Option<&str>) {
    if let Some(path) = image {
        if let Err(e) = state.media.delete(path).await {
            warn!(path, error = %e, "Failed to remove orphaned image");
        }
    }
}

/// The post being edited, or the response that replaces the edit page.
fn editable_post<'v>(
    state: &AppState,
    viewer: &'v Viewer,
    uri: &Uri,
    raw_id: &str,
) -> Result<Result<(Post, &'v User), Response>, ServerError> {
    if authorize(viewer, None) == Access::Unauthenticated {
        return Ok(Err(login_redirect(uri.path())));
    }
    let post_id = parse_id(raw_id)?;
    let post = {
        let db = state.db()?;
        db.get_post(post_id)?
    };

    match authorize(viewer, Some(post.author_id)) {
        Access::Authorized(user) => Ok(Ok((post, user))),
        Access::Forbidden => {
            debug!(post_id, "Edit refused for non-author");
            Ok(Err(found(&post_url(post_id))))
        }
        Access::Unauthenticated => Ok(Err(login_redirect(uri.path()))),
    }
}

pub async fn post_edit_form(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Path(post_id): Path<String>,
) -> Result<Response, ServerError> {
    let (post, _) = match editable_post(&state, &viewer, &uri, &post_id)? {
        Ok(editable) => editable,
        Err(response) => return Ok(response),
    };

    let form = FormState::default()
        .with(POST_TEXT.name, post.text.clone())
        .with(
            POST_GROUP.name,
            post.group_id.map(|id| id.to_string()).unwrap_or_default(),
        );
    render_post_form(&state, &viewer, &form, Some(post.id), post.image.as_deref())
}

pub async fn post_edit(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Path(post_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let (post, user) = match editable_post(&state, &viewer, &uri, &post_id)? {
        Ok(editable) => editable,
        Err(response) => return Ok(response),
    };
    let multipart = multipart.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let input = read_post_input(multipart).await?;

    let cleaned = match validate_post(&state, &input)? {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            let form = post_form_state(&input, errors);
            return render_post_form(&state, &viewer, &form, Some(post.id), post.image.as_deref());
        }
    };

    let (image, stored) = match &cleaned.image {
        ImageChange::Keep => (post.image.clone(), None),
        ImageChange::Clear => (None, None),
        ImageChange::Replace(image) => {
            let path = state.media.save_post_image(image).await?;
            (Some(path.clone()), Some(path))
        }
    };

    let updated = {
        let db = state.db()?;
        db.update_post(
            post.id,
            &PostUpdate {
                text: cleaned.text,
                group_id: cleaned.group_id,
                image,
            },
        )
    };

    match updated {
        Ok(updated) => {
            if updated.image != post.image {
                discard_image(&state, post.image.as_deref()).await;
            }
            info!(post_id = updated.id, author = %user, "Post updated");
            Ok(found(&post_url(updated.id)))
        }
        Err(e) => {
            discard_image(&state, stored.as_deref()).await;
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Follows
// ---------------------------------------------------------------------------

pub async fn profile_follow(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Path(username): Path<String>,
) -> Result<Response, ServerError> {
    let Access::Authorized(user) = authorize(&viewer, None) else {
        return Ok(login_redirect(uri.path()));
    };

    let (author, outcome) = {
        let db = state.db()?;
        let author = db.get_user_by_username(&username)?;
        let outcome = db.follow(user.id, author.id)?;
        (author, outcome)
    };

    match outcome {
        FollowOutcome::Created => info!(user = %user, author = %author, "Followed"),
        FollowOutcome::AlreadyFollowing => debug!(user = %user, author = %author, "Already following"),
        FollowOutcome::SelfFollow => debug!(user = %user, "Ignored self-follow"),
    }
    Ok(found(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Path(username): Path<String>,
) -> Result<Response, ServerError> {
    let Access::Authorized(user) = authorize(&viewer, None) else {
        return Ok(login_redirect(uri.path()));
    };

    let (author, removed) = {
        let db = state.db()?;
        let author = db.get_user_by_username(&username)?;
        let removed = db.unfollow(user.id, author.id)?;
        (author, removed)
    };

    if removed {
        info!(user = %user, author = %author, "Unfollowed");
    }
    Ok(found(&profile_url(&author.username)))
}
