//! # yatube-store
//!
//! SQLite persistence for Yatube, backed by `rusqlite`.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. Relationship deletion policies live in the schema:
//!
//! | Relationship        | On delete |
//! |---------------------|-----------|
//! | post -> author      | cascade   |
//! | post -> group       | set null  |
//! | comment -> post     | cascade   |
//! | comment -> author   | cascade   |
//! | follow -> user      | cascade   |
//! | follow -> author    | cascade   |
//! | session -> user     | cascade   |

pub mod comments;
pub mod database;
pub mod follows;
pub mod groups;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod sessions;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;

#[cfg(test)]
mod deletion_policy_tests {
    use crate::database::tests::test_db;
    use crate::groups::tests::new_group;
    use crate::models::{NewComment, PostFilter};
    use crate::posts::tests::add_post;

    #[test]
    fn deleting_user_cascades() {
        let (db, _dir) = test_db();
        let author = db.create_user("author", "h").unwrap();
        let reader = db.create_user("reader", "h").unwrap();

        let own = add_post(&db, author.id, "author's post", None);
        let other = add_post(&db, reader.id, "reader's post", None);

        // Comment by the author on someone else's post, and by someone else
        // on the author's post: both must go.
        for (post_id, author_id) in [(other.id, author.id), (own.id, reader.id)] {
            db.create_comment(&NewComment {
                post_id,
                author_id,
                text: "comment".to_string(),
                image: None,
            })
            .unwrap();
        }
        db.follow(reader.id, author.id).unwrap();
        db.follow(author.id, reader.id).unwrap();
        let session = db.create_session(author.id).unwrap();

        assert!(db.delete_user(author.id).unwrap());

        assert_eq!(db.count_posts(PostFilter::All).unwrap(), 1);
        assert_eq!(db.count_posts(PostFilter::Author(author.id)).unwrap(), 0);
        assert_eq!(db.count_comments().unwrap(), 0);
        assert_eq!(db.count_following(reader.id).unwrap(), 0);
        assert!(!db.is_following(author.id, reader.id).unwrap());
        assert_eq!(db.get_session_user(session.token).unwrap(), None);
    }

    #[test]
    fn deleting_group_nulls_posts() {
        let (db, _dir) = test_db();
        let author = db.create_user("author", "h").unwrap();
        let group = db.create_group(&new_group("doomed")).unwrap();
        let post = add_post(&db, author.id, "survivor", Some(group.id));

        assert!(db.delete_group(group.id).unwrap());

        let survivor = db.get_post_view(post.id).unwrap();
        assert_eq!(survivor.post.group_id, None);
        assert_eq!(survivor.group, None);
        assert_eq!(survivor.post.text, "survivor");
    }
}
