use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::connctx::{Connection, ConnectionId};
use super::docsession::{EditingSession, SessionError};
use super::registry::SessionRegistry;
use crate::models::{MembershipMessage, SendMessage};
use crate::processors::{DispatchError, ProcessorRegistry};

/// Entry point for the hosting layer: routes connection lifecycle events and
/// inbound frames to the right session and processor.
pub struct EditingEngine {
    sessions: SessionRegistry,
    processors: Arc<ProcessorRegistry>,
    connections: RwLock<HashMap<ConnectionId, Joined>>,
}

/// Where a connection joined and as whom. Outlives session membership, which
/// is dropped as soon as a send to the connection fails.
#[derive(Debug)]
struct Joined {
    doc_id: String,
    user: String,
}

impl EditingEngine {
    pub fn new(processors: ProcessorRegistry) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            processors: Arc::new(processors),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    /// Join `connection` as `user` to the document's session and exchange
    /// presence with the members already there. A failed exchange undoes the
    /// join.
    pub async fn on_connect(&self, connection: Connection, user: &str, doc_id: &str) -> Result<Arc<EditingSession>, SessionError> {
        let connection_id = connection.id();
        let session = self.sessions.join(doc_id, connection, user).await?;
        self.connections.write().await.insert(
            connection_id,
            Joined {
                doc_id: doc_id.to_string(),
                user: user.to_string(),
            },
        );

        if let Err(e) = Self::exchange_presence(&session, connection_id, user).await {
            error!("Presence exchange failed for connection {} on document {}: {}", connection_id, doc_id, e);
            self.on_disconnect(connection_id).await;
            return Err(e);
        }
        Ok(session)
    }

    async fn exchange_presence(session: &EditingSession, connection_id: ConnectionId, user: &str) -> Result<(), SessionError> {
        let joined = SendMessage::Join(MembershipMessage {
            user: user.to_string(),
            id: connection_id.to_string(),
        });
        session.send_to_others(connection_id, user, &joined).await?;

        for member in session.members().await {
            if member.connection_id == connection_id {
                continue;
            }
            let existing = SendMessage::Join(MembershipMessage {
                user: member.user,
                id: member.connection_id.to_string(),
            });
            session.send_ack_to(connection_id, &existing).await?;
        }
        Ok(())
    }

    /// Handle one inbound text frame. Every failure is logged and the frame
    /// dropped; the connection stays open.
    pub async fn on_message(&self, connection_id: ConnectionId, raw: &str) {
        let Some(doc_id) = self.connections.read().await.get(&connection_id).map(|j| j.doc_id.clone()) else {
            warn!("Dropping message from unknown connection {}", connection_id);
            return;
        };
        let Some(session) = self.sessions.get(&doc_id).await else {
            warn!("Dropping message from connection {}: no session for document {}", connection_id, doc_id);
            return;
        };

        match self.processors.dispatch(&session, connection_id, raw).await {
            Ok(()) => {}
            Err(DispatchError::Session(e)) => {
                error!("Failed to process message from connection {} on document {}: {}", connection_id, doc_id, e)
            }
            Err(e) => warn!("Dropped message from connection {} on document {}: {}", connection_id, doc_id, e),
        }
    }

    /// Remove the connection from its session and tell the remaining members.
    /// The departure is announced even when the member was already dropped
    /// for being unreachable.
    pub async fn on_disconnect(&self, connection_id: ConnectionId) {
        let Some(Joined { doc_id, user }) = self.connections.write().await.remove(&connection_id) else {
            debug!("Connection {} was not joined to any document", connection_id);
            return;
        };
        let Some(session) = self.sessions.get(&doc_id).await else {
            return;
        };

        if self.sessions.leave(&doc_id, connection_id).await {
            return;
        }
        let left = SendMessage::Leave(MembershipMessage {
            user: user.clone(),
            id: connection_id.to_string(),
        });
        if let Err(e) = session.send_to_others(connection_id, &user, &left).await {
            error!("Failed to announce departure of {} from document {}: {}", user, doc_id, e);
        }
    }
}
