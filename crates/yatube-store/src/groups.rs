//! CRUD operations for [`Group`] records.

use rusqlite::params;
use yatube_shared::{Page, PageRequest, Paginator};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Group, NewGroup};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new group. A taken slug yields [`StoreError::Conflict`].
    pub fn create_group(&self, group: &NewGroup) -> Result<Group> {
        self.conn()
            .execute(
                "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
                params![group.title, group.slug, group.description],
            )
            .map_err(|e| StoreError::from_write(e, "slug already taken"))?;

        Ok(Group {
            id: self.conn().last_insert_rowid(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_group_by_slug(&self, slug: &str) -> Result<Group> {
        self.conn()
            .query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
                params![slug],
                row_to_group,
            )
            .map_err(StoreError::from_query)
    }

    /// All groups, ordered by title. Feeds the post form's group select.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, slug, description FROM post_groups ORDER BY title ASC, id ASC",
        )?;

        let rows = stmt.query_map([], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    pub fn count_groups(&self) -> Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM post_groups", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// One page of the group list.
    pub fn groups_page(&self, request: PageRequest, per_page: usize) -> Result<Page<Group>> {
        let paginator = Paginator::new(self.count_groups()?, per_page);
        paginator.fetch(request, |offset, limit| {
            let mut stmt = self.conn().prepare(
                "SELECT id, title, slug, description FROM post_groups
                 ORDER BY title ASC, id ASC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![limit as i64, offset as i64], row_to_group)?;

            let mut groups = Vec::new();
            for row in rows {
                groups.push(row?);
            }
            Ok(groups)
        })
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a group. Its posts survive with `group_id` cleared.
    pub fn delete_group(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM post_groups WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

pub(crate) fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use yatube_shared::PageRequest;

    use crate::database::tests::test_db;
    use crate::error::StoreError;
    use crate::models::NewGroup;

    pub fn new_group(slug: &str) -> NewGroup {
        NewGroup {
            title: format!("Группа {slug}"),
            slug: slug.to_string(),
            description: "Тестовое описание".to_string(),
        }
    }

    #[test]
    fn create_and_lookup_by_slug() {
        let (db, _dir) = test_db();
        let group = db.create_group(&new_group("test-slug")).unwrap();

        assert_eq!(db.get_group_by_slug("test-slug").unwrap(), group);
        assert_eq!(group.to_string(), "Группа test-slug");
        assert!(matches!(
            db.get_group_by_slug("missing"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn slug_is_unique() {
        let (db, _dir) = test_db();
        db.create_group(&new_group("dup")).unwrap();
        assert!(matches!(
            db.create_group(&new_group("dup")),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn groups_are_paginated() {
        let (db, _dir) = test_db();
        for i in 0..12 {
            db.create_group(&new_group(&format!("g{i:02}"))).unwrap();
        }

        let first = db.groups_page(PageRequest::first(), 10).unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.count, 12);

        let last = db.groups_page(PageRequest::number(9), 10).unwrap();
        assert_eq!(last.number, 2);
        assert_eq!(last.len(), 2);
        assert_eq!(db.list_groups().unwrap().len(), 12);
    }
}
