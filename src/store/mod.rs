pub mod memory;
pub mod postgres;

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub use memory::MemoryContentStore;
pub use postgres::PgContentStore;

/// Errors reported by a content store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("document {0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Durable, per-document edit history.
///
/// Every document starts at version 0. Content mutations append versions;
/// undo and redo only move the current pointer and must be atomic per
/// document across concurrent callers.
pub trait ContentStore: Send + Sync {
    /// Append a new version and return its number. Anything that was undone
    /// before the append can no longer be redone.
    fn add_content<'a>(&'a self, user: &'a str, doc_id: &'a str, content: Value) -> StoreFuture<'a, u64>;

    /// Revert `version` if it is the current version and an older one exists.
    /// Returns `false` when there is nothing to undo.
    fn undo<'a>(&'a self, user: &'a str, doc_id: &'a str, version: u64) -> StoreFuture<'a, bool>;

    /// Restore `version` if it is the most recently undone version.
    /// Returns `false` when there is nothing to redo.
    fn redo<'a>(&'a self, user: &'a str, doc_id: &'a str, version: u64) -> StoreFuture<'a, bool>;

    /// Version the history pointer currently references.
    fn current_version<'a>(&'a self, doc_id: &'a str) -> StoreFuture<'a, u64>;

    /// Check that the backend can serve requests.
    fn check_ready(&self) -> StoreFuture<'_, ()>;
}
