//! Follow edges between users.
//!
//! Both operations are idempotent: following twice leaves one edge,
//! unfollowing a missing edge is a no-op. Self-follows are refused here and
//! by the table's CHECK constraint.

use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::FollowOutcome;

impl Database {
    /// Get-or-create the edge `user_id -> author_id`.
    pub fn follow(&self, user_id: i64, author_id: i64) -> Result<FollowOutcome> {
        if user_id == author_id {
            tracing::debug!(user_id, "refusing self-follow");
            return Ok(FollowOutcome::SelfFollow);
        }

        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
                params![user_id, author_id],
            )
            .map_err(|e| StoreError::from_write(e, "unknown user or author"))?;

        Ok(if affected > 0 {
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        })
    }

    /// Delete the edge if it exists. Returns `true` if a row was deleted.
    pub fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user_id, author_id],
        )?;
        Ok(affected > 0)
    }

    pub fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2)",
            params![user_id, author_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn count_following(&self, user_id: i64) -> Result<usize> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM follows WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::params;
    use yatube_shared::PageRequest;

    use crate::database::tests::test_db;
    use crate::models::{FollowOutcome, PostFilter};
    use crate::posts::tests::add_post;

    #[test]
    fn follow_is_idempotent() {
        let (db, _dir) = test_db();
        let user = db.create_user("reader", "h").unwrap();
        let author = db.create_user("writer", "h").unwrap();

        assert_eq!(db.follow(user.id, author.id).unwrap(), FollowOutcome::Created);
        assert_eq!(
            db.follow(user.id, author.id).unwrap(),
            FollowOutcome::AlreadyFollowing
        );
        assert_eq!(db.count_following(user.id).unwrap(), 1);
        assert!(db.is_following(user.id, author.id).unwrap());
        assert!(!db.is_following(author.id, user.id).unwrap());
    }

    #[test]
    fn unfollow_is_idempotent() {
        let (db, _dir) = test_db();
        let user = db.create_user("reader", "h").unwrap();
        let author = db.create_user("writer", "h").unwrap();
        db.follow(user.id, author.id).unwrap();

        assert!(db.unfollow(user.id, author.id).unwrap());
        assert!(!db.unfollow(user.id, author.id).unwrap());
        assert_eq!(db.count_following(user.id).unwrap(), 0);
    }

    #[test]
    fn self_follow_never_stored() {
        let (db, _dir) = test_db();
        let user = db.create_user("narcissus", "h").unwrap();

        assert_eq!(db.follow(user.id, user.id).unwrap(), FollowOutcome::SelfFollow);
        assert_eq!(db.count_following(user.id).unwrap(), 0);

        // The CHECK constraint backs the guard for writes that bypass it.
        let raw = db.conn().execute(
            "INSERT INTO follows (user_id, author_id) VALUES (?1, ?1)",
            params![user.id],
        );
        assert!(raw.is_err());
    }

    #[test]
    fn follow_feed_shows_followed_authors_only() {
        let (db, _dir) = test_db();
        let reader = db.create_user("reader", "h").unwrap();
        let followed = db.create_user("followed", "h").unwrap();
        let other = db.create_user("other", "h").unwrap();

        let wanted = add_post(&db, followed.id, "wanted", None);
        add_post(&db, other.id, "unwanted", None);

        let empty = db
            .posts_page(PostFilter::FollowedBy(reader.id), PageRequest::first(), 10)
            .unwrap();
        assert!(empty.is_empty());

        db.follow(reader.id, followed.id).unwrap();
        let feed = db
            .posts_page(PostFilter::FollowedBy(reader.id), PageRequest::first(), 10)
            .unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.items[0].post.id, wanted.id);
    }
}
