pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::Bookmark;

/// Opens sessions against the bookmarks table.
#[async_trait]
pub trait BookmarkStore: Send + Sync + 'static {
    async fn begin(&self) -> Result<Box<dyn Session>>;
}

/// One scoped transaction over the bookmarks table.
///
/// A session that is dropped without [`Session::commit`] rolls back.
#[async_trait]
pub trait Session: Send {
    async fn get_by_id(&mut self, id: i64) -> Result<Option<Bookmark>>;

    /// Bookmarks with an id greater than `after_id`, ascending by id, at most `limit` rows.
    async fn list_after(&mut self, after_id: i64, limit: u32) -> Result<Vec<Bookmark>>;

    /// Stores `bookmark` under a new id and returns that id. `bookmark.id` is ignored.
    async fn insert(&mut self, bookmark: &Bookmark) -> Result<i64>;

    /// Overwrites url, title and comment of row `id`.
    /// Returns `false` if no such row exists.
    async fn update_by_id(&mut self, id: i64, bookmark: &Bookmark) -> Result<bool>;

    /// Returns `true` if a row was removed.
    async fn delete_by_id(&mut self, id: i64) -> Result<bool>;

    async fn count(&mut self) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Ends `session` according to `result`: commit on `Ok`, rollback on `Err`.
///
/// A failed commit turns the result into an error. A failed rollback is
/// only logged and `result` is returned unchanged.
pub async fn finish<T, E>(session: Box<dyn Session>, result: std::result::Result<T, E>) -> std::result::Result<T, E>
where
    E: From<anyhow::Error>,
{
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = session.rollback().await {
                tracing::warn!(error = %rollback_err, "failed to roll back session");
            }
            Err(e)
        }
    }
}
