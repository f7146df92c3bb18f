//! CRUD operations for [`User`] records.

use rusqlite::params;

use crate::database::{format_timestamp, now, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert a new user. A taken username yields [`StoreError::Conflict`].
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let created_at = now();

        self.conn()
            .execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, format_timestamp(&created_at)],
            )
            .map_err(|e| StoreError::from_write(e, "username already taken"))?;

        let user = User {
            id: self.conn().last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        };

        tracing::debug!(user_id = user.id, username = %user.username, "created user");
        Ok(user)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    /// Delete a user. Their posts, comments, follow edges and sessions go
    /// with them, as do comments left by others on their posts.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if affected > 0 {
            tracing::info!(user_id = id, "deleted user and dependent rows");
        }
        Ok(affected > 0)
    }

    pub fn count_users(&self) -> Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: parse_timestamp(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::database::tests::test_db;
    use crate::error::StoreError;

    #[test]
    fn create_and_fetch() {
        let (db, _dir) = test_db();
        let user = db.create_user("voland", "hash").unwrap();

        assert_eq!(db.get_user(user.id).unwrap(), user);
        assert_eq!(db.get_user_by_username("voland").unwrap().id, user.id);
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn duplicate_username_conflicts() {
        let (db, _dir) = test_db();
        db.create_user("voland", "hash").unwrap();
        assert!(matches!(
            db.create_user("voland", "other"),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn missing_user_not_found() {
        let (db, _dir) = test_db();
        assert!(matches!(db.get_user(42), Err(StoreError::NotFound)));
        assert!(matches!(
            db.get_user_by_username("nobody"),
            Err(StoreError::NotFound)
        ));
        assert!(!db.delete_user(42).unwrap());
    }
}
