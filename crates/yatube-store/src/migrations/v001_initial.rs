//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `users`, `post_groups`, `posts`,
//! `comments` and `follows`. Each foreign key declares its deletion policy.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,              -- argon2 PHC string
    created_at    TEXT NOT NULL               -- RFC-3339
);

-- ----------------------------------------------------------------
-- Groups (created by administrators)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS post_groups (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    text      TEXT NOT NULL,
    pub_date  TEXT NOT NULL,                  -- set once at creation
    author_id INTEGER NOT NULL,
    group_id  INTEGER,                        -- nullable
    image     TEXT,                           -- media path, e.g. posts/a.gif

    FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (group_id) REFERENCES post_groups(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, pub_date DESC);
CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id, pub_date DESC);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id   INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    text      TEXT NOT NULL,
    created   TEXT NOT NULL,
    image     TEXT,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created DESC);

-- ----------------------------------------------------------------
-- Follows (user -> author edges)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS follows (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   INTEGER NOT NULL,
    author_id INTEGER NOT NULL,

    CHECK (user_id <> author_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_follows_unique ON follows(user_id, author_id);
CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
