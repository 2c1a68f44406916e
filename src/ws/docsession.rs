use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::connctx::{Connection, ConnectionId};

/// Errors raised by session membership and outbound messaging.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection {0} already joined this session")]
    DuplicateJoin(ConnectionId),

    #[error("connection {0} is not a member of this session")]
    UnknownConnection(ConnectionId),

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug)]
struct Member {
    connection: Connection,
    user: String,
    joined_at: DateTime<Utc>,
    last_seen: Instant,
}

/// Snapshot of one member, used for presence and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub connection_id: ConnectionId,
    pub user: String,
    pub joined_at: DateTime<Utc>,
    /// Time since the last inbound sign of life.
    pub idle: std::time::Duration,
}

/// Live collaboration on one document: who is connected and how to reach them.
#[derive(Debug)]
pub struct EditingSession {
    doc_id: String,
    members: RwLock<HashMap<ConnectionId, Member>>,
}

impl EditingSession {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            members: RwLock::new(HashMap::new()),
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub async fn join(&self, connection: Connection, user: &str) -> Result<(), SessionError> {
        let mut members = self.members.write().await;
        let id = connection.id();
        if members.contains_key(&id) {
            return Err(SessionError::DuplicateJoin(id));
        }
        members.insert(
            id,
            Member {
                connection,
                user: user.to_string(),
                joined_at: Utc::now(),
                last_seen: Instant::now(),
            },
        );
        info!("User {} joined document {} on connection {} ({} members)", user, self.doc_id, id, members.len());
        Ok(())
    }

    /// Remove a member. Returns whether the session is now empty.
    pub async fn leave(&self, connection_id: ConnectionId) -> bool {
        let mut members = self.members.write().await;
        if let Some(member) = members.remove(&connection_id) {
            info!("User {} left document {} on connection {}", member.user, self.doc_id, connection_id);
        }
        members.is_empty()
    }

    /// Identity bound to the connection when it joined.
    pub async fn get_user(&self, connection_id: ConnectionId) -> Option<String> {
        self.members
            .read()
            .await
            .get(&connection_id)
            .map(|m| m.user.clone())
    }

    /// Record that the connection is alive.
    pub async fn touch(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        match self.members.write().await.get_mut(&connection_id) {
            Some(member) => {
                member.last_seen = Instant::now();
                Ok(())
            }
            None => Err(SessionError::UnknownConnection(connection_id)),
        }
    }

    /// Time since the member last showed a sign of life.
    #[cfg(test)]
    pub async fn idle_for(&self, connection_id: ConnectionId) -> Option<std::time::Duration> {
        self.members
            .read()
            .await
            .get(&connection_id)
            .map(|m| m.last_seen.elapsed())
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn members(&self) -> Vec<MemberInfo> {
        self.members
            .read()
            .await
            .iter()
            .map(|(id, m)| MemberInfo {
                connection_id: *id,
                user: m.user.clone(),
                joined_at: m.joined_at,
                idle: m.last_seen.elapsed(),
            })
            .collect()
    }

    /// Send a message to exactly one member.
    ///
    /// Transport failures are logged and the member is dropped from the
    /// session; only encoding failures reach the caller.
    pub async fn send_ack_to<T: Serialize>(&self, connection_id: ConnectionId, payload: &T) -> Result<(), SessionError> {
        let text = encode(&self.doc_id, payload)?;
        let connection = self
            .members
            .read()
            .await
            .get(&connection_id)
            .map(|m| m.connection.clone());

        match connection {
            Some(connection) => {
                if let Err(e) = connection.send(text) {
                    warn!("Failed to send to connection {} on document {}: {}", connection_id, self.doc_id, e);
                    self.drop_members(&[connection_id]).await;
                }
            }
            None => debug!("Connection {} left document {} before delivery", connection_id, self.doc_id),
        }
        Ok(())
    }

    /// Send a message to every member except `from`.
    ///
    /// The payload is encoded once. Each peer is delivered to independently; a
    /// failed peer is logged and dropped without affecting the others.
    pub async fn send_to_others<T: Serialize>(&self, from: ConnectionId, user: &str, payload: &T) -> Result<(), SessionError> {
        let text = encode(&self.doc_id, payload)?;
        let peers: Vec<Connection> = self
            .members
            .read()
            .await
            .iter()
            .filter(|(id, _)| **id != from)
            .map(|(_, m)| m.connection.clone())
            .collect();

        let mut failed = Vec::new();
        for peer in &peers {
            if let Err(e) = peer.send(text.clone()) {
                warn!("Failed to deliver message from {} to connection {} on document {}: {}", user, peer.id(), self.doc_id, e);
                failed.push(peer.id());
            }
        }
        debug!("Broadcast from {} delivered to {}/{} peers on document {}", user, peers.len() - failed.len(), peers.len(), self.doc_id);

        if !failed.is_empty() {
            self.drop_members(&failed).await;
        }
        Ok(())
    }

    async fn drop_members(&self, ids: &[ConnectionId]) {
        let mut members = self.members.write().await;
        for id in ids {
            if let Some(member) = members.remove(id) {
                info!("Dropped unreachable user {} from document {} (connection {})", member.user, self.doc_id, id);
            }
        }
    }
}

fn encode<T: Serialize>(doc_id: &str, payload: &T) -> Result<String, SessionError> {
    serde_json::to_string(payload).map_err(|e| {
        error!("Failed to encode message for document {}: {}", doc_id, e);
        SessionError::Encode(e)
    })
}
