use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::{ContentStore, StoreFuture};

/// Lifecycle of one recorded version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Active,
    /// Reverted by undo and still eligible for redo.
    Undone,
    /// Reverted, then superseded by a newer version.
    Discarded,
}

// Content and authorship are only read back by tests
#[derive(Debug, Clone)]
#[cfg_attr(not(test), allow(dead_code))]
struct ContentEntry {
    version: u64,
    content: Value,
    created_by: String,
    created_on: DateTime<Utc>,
    state: EntryState,
}

/// Append-only history of one document. Version numbers equal their index.
#[derive(Debug)]
struct History {
    entries: Vec<ContentEntry>,
}

impl History {
    fn new(user: &str) -> Self {
        Self {
            entries: vec![ContentEntry {
                version: 0,
                content: Value::Null,
                created_by: user.to_string(),
                created_on: Utc::now(),
                state: EntryState::Active,
            }],
        }
    }

    fn current(&self) -> u64 {
        self.entries
            .iter()
            .rev()
            .find(|e| e.state == EntryState::Active)
            .map(|e| e.version)
            .unwrap_or(0)
    }

    fn append(&mut self, user: &str, content: Value) -> u64 {
        for entry in self.entries.iter_mut().filter(|e| e.state == EntryState::Undone) {
            entry.state = EntryState::Discarded;
        }
        let version = self.entries.len() as u64;
        self.entries.push(ContentEntry {
            version,
            content,
            created_by: user.to_string(),
            created_on: Utc::now(),
            state: EntryState::Active,
        });
        version
    }

    fn undo(&mut self, version: u64) -> bool {
        if version != self.current() {
            return false;
        }
        let has_older = self.entries[..version as usize]
            .iter()
            .any(|e| e.state == EntryState::Active);
        if !has_older {
            return false;
        }
        self.entries[version as usize].state = EntryState::Undone;
        true
    }

    fn redo(&mut self, version: u64) -> bool {
        let next = self
            .entries
            .iter()
            .find(|e| e.state == EntryState::Undone)
            .map(|e| e.version);
        if next != Some(version) {
            return false;
        }
        self.entries[version as usize].state = EntryState::Active;
        true
    }
}

/// In-process content store. Each document's history is guarded by its own
/// lock, which serializes competing transitions on that document only.
/// Documents are created at version 0 on first access.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    documents: RwLock<HashMap<String, Arc<Mutex<History>>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn history(&self, user: &str, doc_id: &str) -> Arc<Mutex<History>> {
        if let Some(history) = self.documents.read().await.get(doc_id) {
            return history.clone();
        }
        self.documents
            .write()
            .await
            .entry(doc_id.to_string())
            .or_insert_with(|| {
                info!("Created history for document {}", doc_id);
                Arc::new(Mutex::new(History::new(user)))
            })
            .clone()
    }

    /// Content, author and creation time at the current version.
    #[cfg(test)]
    pub async fn current_content(&self, doc_id: &str) -> Option<(u64, Value, String, DateTime<Utc>)> {
        let history = self.documents.read().await.get(doc_id).cloned()?;
        let history = history.lock().await;
        let entry = &history.entries[history.current() as usize];
        Some((entry.version, entry.content.clone(), entry.created_by.clone(), entry.created_on))
    }

    #[cfg(test)]
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

impl ContentStore for MemoryContentStore {
    fn add_content<'a>(&'a self, user: &'a str, doc_id: &'a str, content: Value) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let history = self.history(user, doc_id).await;
            let version = history.lock().await.append(user, content);
            debug!("Recorded version {} of document {} for {}", version, doc_id, user);
            Ok(version)
        })
    }

    fn undo<'a>(&'a self, user: &'a str, doc_id: &'a str, version: u64) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let history = self.history(user, doc_id).await;
            let restored = history.lock().await.undo(version);
            debug!("Undo of version {} on document {} by {}: {}", version, doc_id, user, restored);
            Ok(restored)
        })
    }

    fn redo<'a>(&'a self, user: &'a str, doc_id: &'a str, version: u64) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let history = self.history(user, doc_id).await;
            let restored = history.lock().await.redo(version);
            debug!("Redo of version {} on document {} by {}: {}", version, doc_id, user, restored);
            Ok(restored)
        })
    }

    fn current_version<'a>(&'a self, doc_id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            match self.documents.read().await.get(doc_id).cloned() {
                Some(history) => Ok(history.lock().await.current()),
                None => Ok(0),
            }
        })
    }

    fn check_ready(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
