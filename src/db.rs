use anyhow::Result;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase, Transaction};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::Bookmark;
use crate::repository::{BookmarkStore, Session};

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[("001_bookmarks.sql", include_str!("migrations/001_bookmarks.sql"))];

pub struct Database {
    _db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Arc<Mutex<()>>,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    /// Opens (creating if needed) the database file at `path` and brings the
    /// schema up to date.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Self::run_migration(&conn, filename, sql).await?;
        }

        tracing::info!(path = ?path, "[db] bookmarks database ready");

        Ok(Database {
            _db: db,
            conn,
            tx_lock: Arc::new(Mutex::new(())),
        })
    }
}

#[async_trait]
impl BookmarkStore for Database {
    async fn begin(&self) -> Result<Box<dyn Session>> {
        let guard = self.tx_lock.clone().lock_owned().await;
        let tx = self.conn.transaction().await?;
        Ok(Box::new(LibsqlSession { _guard: guard, tx }))
    }
}

/// A libsql transaction plus the lock that keeps other sessions out of the
/// shared connection until it ends.
pub struct LibsqlSession {
    tx: Transaction,
    _guard: OwnedMutexGuard<()>,
}

fn row_to_bookmark(row: &libsql::Row) -> Result<Bookmark> {
    Ok(Bookmark {
        id: Some(row.get(0)?),
        url: row.get(1)?,
        title: row.get(2)?,
        comment: row.get(3)?,
    })
}

#[async_trait]
impl Session for LibsqlSession {
    async fn get_by_id(&mut self, id: i64) -> Result<Option<Bookmark>> {
        let query = "SELECT id, url, title, comment FROM bookmarks WHERE id = ?";
        let mut rows = self.tx.query(query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_bookmark(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn list_after(&mut self, after_id: i64, limit: u32) -> Result<Vec<Bookmark>> {
        let query = r#"
            SELECT id, url, title, comment
            FROM bookmarks
            WHERE id > ?
            ORDER BY id ASC
            LIMIT ?
        "#;

        let mut rows = self
            .tx
            .query(query, libsql::params![after_id, limit as i64])
            .await?;
        let mut bookmarks = Vec::new();

        while let Some(row) = rows.next().await? {
            bookmarks.push(row_to_bookmark(&row)?);
        }

        Ok(bookmarks)
    }

    async fn insert(&mut self, bookmark: &Bookmark) -> Result<i64> {
        let query = r#"
            INSERT INTO bookmarks (url, title, comment)
            VALUES (?, ?, ?)
            RETURNING id
        "#;

        let mut rows = self
            .tx
            .query(
                query,
                libsql::params![bookmark.url.as_str(), bookmark.title.as_str(), bookmark.comment.as_str()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            anyhow::bail!("Failed to create bookmark")
        }
    }

    async fn update_by_id(&mut self, id: i64, bookmark: &Bookmark) -> Result<bool> {
        let updated = self
            .tx
            .execute(
                "UPDATE bookmarks SET url = ?, title = ?, comment = ? WHERE id = ?",
                libsql::params![bookmark.url.as_str(), bookmark.title.as_str(), bookmark.comment.as_str(), id],
            )
            .await?;
        Ok(updated > 0)
    }

    async fn delete_by_id(&mut self, id: i64) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM bookmarks WHERE id = ?", libsql::params![id])
            .await?;
        Ok(deleted > 0)
    }

    async fn count(&mut self) -> Result<u64> {
        let mut rows = self.tx.query("SELECT COUNT(*) FROM bookmarks", ()).await?;

        if let Some(row) = rows.next().await? {
            let count: i64 = row.get(0)?;
            Ok(count as u64)
        } else {
            anyhow::bail!("COUNT returned no rows")
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let LibsqlSession { tx, _guard } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let LibsqlSession { tx, _guard } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("bookmarks.db")).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("bookmarks.db");

        drop(Database::new(&path).await.unwrap());
        let db = Database::new(&path).await.unwrap();

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM _migrations", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let applied: i64 = row.get(0).unwrap();
        assert_eq!(applied as usize, SYSTEM_MIGRATIONS.len() + MIGRATIONS.len());
    }

    #[tokio::test]
    async fn crud_in_one_session() {
        let (_dir, db) = open().await;
        let mut session = db.begin().await.unwrap();

        let id = session.insert(&Bookmark::new("u", "t", "")).await.unwrap();
        assert_eq!(
            session.get_by_id(id).await.unwrap(),
            Some(Bookmark::new("u", "t", "").with_id(id))
        );

        assert!(session.update_by_id(id, &Bookmark::new("u2", "t2", "c2")).await.unwrap());
        assert_eq!(
            session.get_by_id(id).await.unwrap(),
            Some(Bookmark::new("u2", "t2", "c2").with_id(id))
        );
        assert!(!session.update_by_id(id + 100, &Bookmark::new("x", "x", "x")).await.unwrap());

        assert!(session.delete_by_id(id).await.unwrap());
        assert!(!session.delete_by_id(id).await.unwrap());
        assert_eq!(session.count().await.unwrap(), 0);

        session.commit().await.unwrap();
    }

    #[tokio::test]
    async fn list_after_is_ordered_and_limited() {
        let (_dir, db) = open().await;
        let mut session = db.begin().await.unwrap();
        let mut ids = Vec::new();
        for n in 0..5 {
            ids.push(
                session
                    .insert(&Bookmark::new(format!("url {n}"), format!("title {n}"), "c"))
                    .await
                    .unwrap(),
            );
        }
        session.commit().await.unwrap();

        let mut session = db.begin().await.unwrap();
        let page = session.list_after(ids[1], 2).await.unwrap();
        let page_ids: Vec<i64> = page.iter().filter_map(|b| b.id).collect();
        assert_eq!(page_ids, vec![ids[2], ids[3]]);
        assert_eq!(page[0].url, "url 2");
        assert_eq!(session.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn new_id_skips_existing_rows() {
        let (_dir, db) = open().await;
        db.connection()
            .execute(
                "INSERT INTO bookmarks (id, url, title, comment) VALUES (42, 'nop', 'nop', 'nop')",
                (),
            )
            .await
            .unwrap();

        let mut session = db.begin().await.unwrap();
        let id = session.insert(&Bookmark::new("u", "t", "c").with_id(42)).await.unwrap();
        assert_ne!(id, 42);
        session.commit().await.unwrap();
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let (_dir, db) = open().await;

        let mut session = db.begin().await.unwrap();
        session.insert(&Bookmark::new("a", "a", "a")).await.unwrap();
        session.rollback().await.unwrap();

        let mut session = db.begin().await.unwrap();
        assert_eq!(session.count().await.unwrap(), 0);
    }
}
