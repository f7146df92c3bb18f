//! Bearer-token protected JSON API for site administration.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use yatube_shared::forms::{GroupForm, GroupInput};
use yatube_store::{Group, NewGroup, StoreError};

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ServerError;

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
        return Err(ServerError::Unauthorized("Missing admin token".into()));
    };
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

#[derive(Serialize)]
pub struct DeletedResponse {
    deleted: bool,
}

#[derive(Serialize)]
pub struct CacheClearedResponse {
    removed: usize,
}

pub async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<GroupInput>,
) -> Result<(StatusCode, Json<Group>), ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let cleaned = GroupForm::validate(&input).map_err(|errors| {
        let fields: Vec<&str> = errors.iter().map(|(field, _)| field).collect();
        ServerError::BadRequest(format!("Invalid fields: {}", fields.join(", ")))
    })?;

    let group = {
        let db = state.db()?;
        db.create_group(&NewGroup {
            title: cleaned.title,
            slug: cleaned.slug,
            description: cleaned.description,
        })
        .map_err(|e| match e {
            StoreError::Conflict(_) => ServerError::BadRequest("Slug already in use".into()),
            other => other.into(),
        })?
    };

    info!(group_id = group.id, slug = %group.slug, "Admin: group created");
    Ok((StatusCode::CREATED, Json(group)))
}

/// Posts of the group survive with no group.
pub async fn delete_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<DeletedResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let deleted = {
        let db = state.db()?;
        let group = db.get_group_by_slug(&slug)?;
        db.delete_group(group.id)?
    };

    info!(slug = %slug, "Admin: group deleted");
    Ok(Json(DeletedResponse { deleted }))
}

/// Removes the user with their posts, comments, follows and sessions.
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<DeletedResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let deleted = {
        let db = state.db()?;
        let user = db.get_user_by_username(&username)?;
        db.delete_user(user.id)?
    };

    info!(username = %username, "Admin: user deleted");
    Ok(Json(DeletedResponse { deleted }))
}

/// Removes the post, its comments and its stored image.
pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Result<Json<DeletedResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let (deleted, image) = {
        let db = state.db()?;
        let post = db.get_post(post_id)?;
        (db.delete_post(post.id)?, post.image)
    };

    if let Some(image) = image {
        if let Err(e) = state.media.delete(&image).await {
            warn!(path = %image, error = %e, "Failed to remove image of deleted post");
        }
    }

    info!(post_id, "Admin: post deleted");
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn clear_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CacheClearedResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let removed = state.page_cache.clear().await;
    info!(removed, "Admin: page cache cleared");
    Ok(Json(CacheClearedResponse { removed }))
}
