use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::{format_timestamp, now, Database};
use crate::error::{Result, StoreError};
use crate::models::{Session, User};
use crate::users::row_to_user;

impl Database {
    /// Open a new login session for `user_id`.
    pub fn create_session(&self, user_id: i64) -> Result<Session> {
        let session = Session {
            token: Uuid::new_v4(),
            user_id,
            created_at: now(),
        };

        self.conn()
            .execute(
                "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![
                    session.token.to_string(),
                    session.user_id,
                    format_timestamp(&session.created_at),
                ],
            )
            .map_err(|e| StoreError::from_write(e, "unknown user"))?;

        Ok(session)
    }

    /// The user behind a session token, if the session exists.
    pub fn get_session_user(&self, token: Uuid) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                "SELECT u.id, u.username, u.password_hash, u.created_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1",
                params![token.to_string()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn delete_session(&self, token: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE token = ?1",
            params![token.to_string()],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::database::tests::test_db;

    #[test]
    fn session_lifecycle() {
        let (db, _dir) = test_db();
        let user = db.create_user("voland", "h").unwrap();

        let session = db.create_session(user.id).unwrap();
        assert_eq!(db.get_session_user(session.token).unwrap(), Some(user));

        assert!(db.delete_session(session.token).unwrap());
        assert_eq!(db.get_session_user(session.token).unwrap(), None);
    }

    #[test]
    fn unknown_token() {
        let (db, _dir) = test_db();
        assert_eq!(db.get_session_user(Uuid::new_v4()).unwrap(), None);
    }
}
