use rusqlite::params;

use crate::database::{format_timestamp, now, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{Comment, CommentView, NewComment};

impl Database {
    pub fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let created = now();

        self.conn()
            .execute(
                "INSERT INTO comments (post_id, author_id, text, created, image)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    comment.post_id,
                    comment.author_id,
                    comment.text,
                    format_timestamp(&created),
                    comment.image,
                ],
            )
            .map_err(|e| StoreError::from_write(e, "unknown post or author"))?;

        Ok(Comment {
            id: self.conn().last_insert_rowid(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text.clone(),
            created,
            image: comment.image.clone(),
        })
    }

    /// Comments under a post, newest first.
    pub fn list_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentView>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.post_id, c.author_id, c.text, c.created, c.image, u.username
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.created DESC, c.id DESC",
        )?;

        let rows = stmt.query_map(params![post_id], |row| {
            let created_str: String = row.get(4)?;
            Ok(CommentView {
                comment: Comment {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_id: row.get(2)?,
                    text: row.get(3)?,
                    created: parse_timestamp(4, &created_str)?,
                    image: row.get(5)?,
                },
                author: row.get(6)?,
            })
        })?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    pub fn count_comments(&self) -> Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
