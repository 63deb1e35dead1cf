//! SQLite storage backend

use super::traits::{CategoryStore, OpenStore, StorageError, StorageResult};
use crate::catalog::{AncestorPath, ArticleId, CategoryId, CategoryNode, NewCategory};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed category store
///
/// Uses a single SQLite database file with tables for categories, their
/// attribute side records, and article assignments.
/// Thread-safe via internal mutex on the connection.
///
/// Sibling uniqueness is enforced by a unique index over
/// `(parent, description)`, so concurrent writers racing to create the same
/// segment get a [`StorageError::Conflict`] instead of a duplicate row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    ///
    /// Safe to run against an existing database: every statement is
    /// `IF NOT EXISTS`, and the sibling index is added by a separate step
    /// that tolerates legacy data.
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Category tree
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent INTEGER REFERENCES categories(id),
                path TEXT,
                description TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                added TEXT NOT NULL,
                changed TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_categories_parent
                ON categories(parent);

            -- Attribute side records, one per category
            CREATE TABLE IF NOT EXISTS category_attributes (
                category_id INTEGER PRIMARY KEY,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );

            -- Article assignments
            CREATE TABLE IF NOT EXISTS article_categories (
                article_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (article_id, category_id),
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_article_categories_category
                ON article_categories(category_id);

            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Self::migrate_add_sibling_index(conn)?;

        Ok(())
    }

    /// Migration: add the unique sibling index
    ///
    /// Databases that already hold duplicate siblings cannot take the index.
    /// They stay usable; the resolver reports the duplicates when it meets them.
    fn migrate_add_sibling_index(conn: &Connection) -> StorageResult<()> {
        let result = conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_sibling ON categories(parent, description)",
            [],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                tracing::warn!("duplicate sibling categories present; unique sibling index not created");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection mutex poisoned".to_string()))
    }

    /// Create the root category if it is absent. Returns true if it was inserted.
    pub fn ensure_root(&self, root: CategoryId, description: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            r#"
            INSERT INTO categories (id, parent, path, description, active, added, changed)
            VALUES (?1, NULL, NULL, ?2, 1, ?3, ?3)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![root.get(), description, now],
        )?;
        Ok(rows > 0)
    }

    /// Insert the attribute side record for a category. Idempotent.
    pub fn insert_category_attributes(&self, id: CategoryId) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO category_attributes (category_id) VALUES (?1) ON CONFLICT(category_id) DO NOTHING",
            params![id.get()],
        )?;
        Ok(())
    }

    /// Check if a category has its attribute side record
    pub fn has_category_attributes(&self, id: CategoryId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM category_attributes WHERE category_id = ?1)",
            params![id.get()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::Corrupt(format!("timestamp '{}': {}", raw, e)))
    }

    /// Deserialize a node from database columns
    #[allow(clippy::too_many_arguments)]
    fn row_to_node(
        id: i64,
        parent: Option<i64>,
        path: Option<String>,
        description: String,
        active: bool,
        added: String,
        changed: String,
        has_children: bool,
    ) -> StorageResult<CategoryNode> {
        let path = AncestorPath::decode(path.as_deref())
            .ok_or_else(|| StorageError::Corrupt(format!("path of category {}: {:?}", id, path)))?;

        Ok(CategoryNode {
            id: CategoryId::new(id),
            parent: parent.map(CategoryId::new),
            description,
            path,
            active,
            added: Self::parse_timestamp(&added)?,
            changed: Self::parse_timestamp(&changed)?,
            leaf: !has_children,
        })
    }
}

/// Only a UNIQUE violation means another writer got there first. Foreign key
/// and NOT NULL failures are permanent and stay database errors.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CategoryStore for SqliteStore {
    // === Assignment Operations ===

    fn find_assignments(&self, article: ArticleId) -> StorageResult<BTreeSet<CategoryId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT category_id FROM article_categories WHERE article_id = ?1")?;
        let ids = stmt
            .query_map(params![article.get()], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(CategoryId::new))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }

    fn insert_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()> {
        if categories.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO article_categories (article_id, category_id)
                VALUES (?1, ?2)
                ON CONFLICT(article_id, category_id) DO NOTHING
                "#,
            )?;
            for category in categories {
                stmt.execute(params![article.get(), category.get()])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn delete_assignments(&self, article: ArticleId, categories: &BTreeSet<CategoryId>) -> StorageResult<()> {
        if categories.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("DELETE FROM article_categories WHERE article_id = ?1 AND category_id = ?2")?;
            for category in categories {
                stmt.execute(params![article.get(), category.get()])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    // === Node Operations ===

    fn find_nodes(&self, parent: CategoryId, description: &str) -> StorageResult<Vec<CategoryId>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT id FROM categories WHERE parent = ?1 AND description = ?2 ORDER BY id")?;
        let ids = stmt
            .query_map(params![parent.get(), description], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(CategoryId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn node_exists(&self, id: CategoryId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
            params![id.get()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn has_children(&self, id: CategoryId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE parent = ?1)",
            params![id.get()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn create_node(&self, node: &NewCategory) -> StorageResult<CategoryId> {
        let conn = self.conn()?;
        let added = node.added.to_rfc3339();

        let result = conn.execute(
            r#"
            INSERT INTO categories (parent, path, description, active, added, changed)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            "#,
            params![node.parent.get(), node.path.encode(), node.description, added],
        );

        match result {
            Ok(_) => Ok(CategoryId::new(conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Err(StorageError::Conflict(format!(
                "category '{}' under parent {}: {}",
                node.description, node.parent, e
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn load_node(&self, id: CategoryId) -> StorageResult<Option<CategoryNode>> {
        let conn = self.conn()?;

        #[allow(clippy::type_complexity)]
        let row: Option<(i64, Option<i64>, Option<String>, String, bool, String, String, bool)> = conn
            .query_row(
                r#"
                SELECT c.id, c.parent, c.path, c.description, c.active, c.added, c.changed,
                       EXISTS(SELECT 1 FROM categories k WHERE k.parent = c.id)
                FROM categories c WHERE c.id = ?1
                "#,
                params![id.get()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, parent, path, description, active, added, changed, has_children)) => Ok(Some(
                Self::row_to_node(id, parent, path, description, active, added, changed, has_children)?,
            )),
            None => Ok(None),
        }
    }
}
