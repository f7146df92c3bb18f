//! CRUD operations and feed queries for [`Post`] records.

use rusqlite::{params, params_from_iter};
use yatube_shared::{Page, PageRequest, Paginator};

use crate::database::{format_timestamp, now, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{Group, NewPost, Post, PostFilter, PostUpdate, PostView};

/// Columns shared by every joined post query, in `row_to_post_view` order.
const POST_VIEW_COLUMNS: &str = "p.id, p.text, p.pub_date, p.author_id, p.group_id, p.image,
        u.username, g.id, g.title, g.slug, g.description";

const POST_VIEW_FROM: &str = "FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN post_groups g ON g.id = p.group_id";

/// Newest first; the id breaks ties between posts stamped in the same instant.
const POST_ORDER: &str = "ORDER BY p.pub_date DESC, p.id DESC";

impl PostFilter {
    /// WHERE clause over the `p` alias plus its single bound value.
    fn clause(&self) -> (&'static str, Option<i64>) {
        match *self {
            PostFilter::All => ("", None),
            PostFilter::Group(id) => ("WHERE p.group_id = ?", Some(id)),
            PostFilter::Author(id) => ("WHERE p.author_id = ?", Some(id)),
            PostFilter::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?)",
                Some(id),
            ),
        }
    }
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new post stamped with the current time.
    pub fn create_post(&self, post: &NewPost) -> Result<Post> {
        let pub_date = now();

        self.conn()
            .execute(
                "INSERT INTO posts (text, pub_date, author_id, group_id, image)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    post.text,
                    format_timestamp(&pub_date),
                    post.author_id,
                    post.group_id,
                    post.image,
                ],
            )
            .map_err(|e| StoreError::from_write(e, "unknown author or group"))?;

        let created = Post {
            id: self.conn().last_insert_rowid(),
            text: post.text.clone(),
            pub_date,
            author_id: post.author_id,
            group_id: post.group_id,
            image: post.image.clone(),
        };

        tracing::debug!(post_id = created.id, author_id = created.author_id, "created post");
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_post(&self, id: i64) -> Result<Post> {
        self.conn()
            .query_row(
                "SELECT id, text, pub_date, author_id, group_id, image FROM posts WHERE id = ?1",
                params![id],
                row_to_post,
            )
            .map_err(StoreError::from_query)
    }

    /// A post with its author's username and group.
    pub fn get_post_view(&self, id: i64) -> Result<PostView> {
        let sql = format!("SELECT {POST_VIEW_COLUMNS} {POST_VIEW_FROM} WHERE p.id = ?1");
        self.conn()
            .query_row(&sql, params![id], row_to_post_view)
            .map_err(StoreError::from_query)
    }

    pub fn count_posts(&self, filter: PostFilter) -> Result<usize> {
        let (clause, value) = filter.clause();
        let sql = format!("SELECT COUNT(*) FROM posts p {clause}");
        let n: i64 = self
            .conn()
            .query_row(&sql, params_from_iter(value), |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Posts matching `filter`, newest first.
    pub fn list_posts(&self, filter: PostFilter, limit: usize, offset: usize) -> Result<Vec<PostView>> {
        let (clause, value) = filter.clause();
        let sql = format!(
            "SELECT {POST_VIEW_COLUMNS} {POST_VIEW_FROM} {clause} {POST_ORDER} LIMIT ? OFFSET ?"
        );

        let mut bound: Vec<i64> = value.into_iter().collect();
        bound.push(limit as i64);
        bound.push(offset as i64);

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound), row_to_post_view)?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    /// One page of a feed. Out-of-range requests are clamped, never rejected.
    pub fn posts_page(
        &self,
        filter: PostFilter,
        request: PageRequest,
        per_page: usize,
    ) -> Result<Page<PostView>> {
        let paginator = Paginator::new(self.count_posts(filter)?, per_page);
        paginator.fetch(request, |offset, limit| self.list_posts(filter, limit, offset))
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite the editable fields of a post in place.
    pub fn update_post(&self, id: i64, update: &PostUpdate) -> Result<Post> {
        let affected = self
            .conn()
            .execute(
                "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
                params![update.text, update.group_id, update.image, id],
            )
            .map_err(|e| StoreError::from_write(e, "unknown group"))?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_post(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a post and its comments.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let pub_date_str: String = row.get(2)?;
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: parse_timestamp(2, &pub_date_str)?,
        author_id: row.get(3)?,
        group_id: row.get(4)?,
        image: row.get(5)?,
    })
}

fn row_to_post_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostView> {
    let post = row_to_post(row)?;
    let author: String = row.get(6)?;

    let group_id: Option<i64> = row.get(7)?;
    let group = match group_id {
        Some(id) => Some(Group {
            id,
            title: row.get(8)?,
            slug: row.get(9)?,
            description: row.get(10)?,
        }),
        None => None,
    };

    Ok(PostView { post, author, group })
}
