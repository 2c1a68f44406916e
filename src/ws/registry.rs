use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::connctx::{Connection, ConnectionId};
use super::docsession::{EditingSession, SessionError};

/// Owner of the document id → session mapping.
///
/// Sessions exist while at least one connection is joined. Joining and
/// leaving hold the map's write lock across the membership change, so a join
/// never lands in a session that is being released concurrently.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<EditingSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, doc_id: &str) -> Option<Arc<EditingSession>> {
        self.sessions.read().await.get(doc_id).cloned()
    }

    pub async fn get_or_create(&self, doc_id: &str) -> Arc<EditingSession> {
        if let Some(session) = self.get(doc_id).await {
            return session;
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(doc_id.to_string())
            .or_insert_with(|| {
                info!("Opening editing session for document {}", doc_id);
                Arc::new(EditingSession::new(doc_id))
            })
            .clone()
    }

    /// Join `connection` to the document's session, creating it if needed.
    pub async fn join(&self, doc_id: &str, connection: Connection, user: &str) -> Result<Arc<EditingSession>, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(doc_id.to_string())
            .or_insert_with(|| {
                info!("Opening editing session for document {}", doc_id);
                Arc::new(EditingSession::new(doc_id))
            })
            .clone();

        if let Err(e) = session.join(connection, user).await {
            if session.is_empty().await {
                sessions.remove(doc_id);
            }
            return Err(e);
        }
        Ok(session)
    }

    /// Remove the connection from the document's session and release the
    /// session if that emptied it. Returns whether the session was released.
    pub async fn leave(&self, doc_id: &str, connection_id: ConnectionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get(doc_id).cloned() else {
            debug!("No session for document {} while removing {}", doc_id, connection_id);
            return false;
        };
        if session.leave(connection_id).await {
            sessions.remove(doc_id);
            info!("Closed editing session for document {}", doc_id);
            true
        } else {
            false
        }
    }

    /// Drop the session entry if it has no members left.
    pub async fn release_if_empty(&self, doc_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let empty = match sessions.get(doc_id) {
            Some(session) => session.is_empty().await,
            None => return false,
        };
        if empty {
            sessions.remove(doc_id);
            info!("Closed editing session for document {}", doc_id);
        }
        empty
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        let sessions: Vec<Arc<EditingSession>> = self.sessions.read().await.values().cloned().collect();
        let mut total = 0;
        for session in sessions {
            total += session.member_count().await;
        }
        total
    }
}
