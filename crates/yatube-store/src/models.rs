//! Domain model structs persisted in the SQLite database.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use yatube_shared::constants::POST_PREVIEW_LEN;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// Unique login name, also the profile URL segment.
    pub username: String,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A topic that posts may be filed under. `slug` is the external key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub text: String,
    /// Set once at creation.
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    /// Cleared to `None` when the group is deleted.
    pub group_id: Option<i64>,
    /// Media path of the attached image, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

impl Post {
    /// Short display form: the first characters of the text.
    pub fn preview(&self) -> String {
        self.text.chars().take(POST_PREVIEW_LEN).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Editable fields of a post. Author, id and `pub_date` never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUpdate {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// A post joined with its author's username and its group.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PostView {
    pub post: Post,
    pub author: String,
    pub group: Option<Group>,
}

/// Which posts a feed shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    /// Set once at creation.
    pub created: DateTime<Utc>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommentView {
    pub comment: Comment,
    pub author: String,
}

// ---------------------------------------------------------------------------
// Follow
// ---------------------------------------------------------------------------

/// Result of a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Following yourself is refused without touching the store.
    SelfFollow,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A login session; `token` is the session cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Uuid,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}
