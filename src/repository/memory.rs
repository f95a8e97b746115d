use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::Bookmark;
use crate::repository::{BookmarkStore, Session};

#[derive(Debug, Clone, Default)]
struct Table {
    rows: BTreeMap<i64, Bookmark>,
    // Highest id ever handed out; ids are not reused after a delete.
    last_id: i64,
}

impl Table {
    fn put(&mut self, id: i64, bookmark: &Bookmark) {
        self.rows.insert(id, bookmark.clone().with_id(id));
        self.last_id = self.last_id.max(id);
    }
}

/// Bookmark store kept in process memory.
///
/// A session locks the whole table and edits a private copy, which replaces
/// the table on commit. Sessions are therefore fully serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    table: Arc<Mutex<Table>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `bookmark` outside of any session, keeping its id if it has one.
    pub async fn seed(&self, bookmark: Bookmark) -> i64 {
        let mut table = self.table.lock().await;
        let id = bookmark.id.unwrap_or(table.last_id + 1);
        table.put(id, &bookmark);
        id
    }

    /// Snapshot of every committed row, ascending by id.
    pub async fn all(&self) -> Vec<Bookmark> {
        self.table.lock().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl BookmarkStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Session>> {
        let guard = self.table.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemorySession { guard, working }))
    }
}

pub struct InMemorySession {
    guard: OwnedMutexGuard<Table>,
    working: Table,
}

#[async_trait]
impl Session for InMemorySession {
    async fn get_by_id(&mut self, id: i64) -> Result<Option<Bookmark>> {
        Ok(self.working.rows.get(&id).cloned())
    }

    async fn list_after(&mut self, after_id: i64, limit: u32) -> Result<Vec<Bookmark>> {
        let Some(start) = after_id.checked_add(1) else {
            return Ok(vec![]);
        };
        Ok(self
            .working
            .rows
            .range(start..)
            .take(limit as usize)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn insert(&mut self, bookmark: &Bookmark) -> Result<i64> {
        let id = self
            .working
            .last_id
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("bookmark ids exhausted"))?;
        self.working.put(id, bookmark);
        Ok(id)
    }

    async fn update_by_id(&mut self, id: i64, bookmark: &Bookmark) -> Result<bool> {
        if !self.working.rows.contains_key(&id) {
            return Ok(false);
        }
        self.working.put(id, bookmark);
        Ok(true)
    }

    async fn delete_by_id(&mut self, id: i64) -> Result<bool> {
        Ok(self.working.rows.remove(&id).is_some())
    }

    async fn count(&mut self) -> Result<u64> {
        Ok(self.working.rows.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemorySession { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
