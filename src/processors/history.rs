use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::metrics::EditingMetrics;
use crate::models::{AckMessage, AckType, SendMessage, UndoRedoMessage, VersionedOperation};
use crate::store::ContentStore;
use crate::ws::connctx::ConnectionId;
use crate::ws::docsession::{EditingSession, SessionError};

/// Direction of a history pointer move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMove {
    Undo,
    Redo,
}

impl HistoryMove {
    fn label(self) -> &'static str {
        match self {
            HistoryMove::Undo => "undo",
            HistoryMove::Redo => "redo",
        }
    }

    fn ack(self, content_version: u64) -> SendMessage {
        let ack_type = match self {
            HistoryMove::Undo => AckType::Undo,
            HistoryMove::Redo => AckType::Redo,
        };
        SendMessage::Ack(AckMessage::history(ack_type, content_version))
    }

    fn command(self, content_version: u64) -> SendMessage {
        let msg = UndoRedoMessage { content_version };
        match self {
            HistoryMove::Undo => SendMessage::Undo(msg),
            HistoryMove::Redo => SendMessage::Redo(msg),
        }
    }
}

/// Apply an undo or redo requested by `connection_id`.
///
/// The store decides whether the move happens. Only an accepted move is
/// acknowledged to the requester and then replayed to the other members;
/// rejected moves and storage failures produce no outbound traffic.
pub async fn apply(
    direction: HistoryMove,
    store: &Arc<dyn ContentStore>,
    metrics: &Arc<dyn EditingMetrics>,
    session: &EditingSession,
    connection_id: ConnectionId,
    operation: VersionedOperation,
) -> Result<(), SessionError> {
    let label = direction.label();
    let Some(user) = session.get_user(connection_id).await else {
        warn!("Ignoring {} from connection {} which is not in document {}", label, connection_id, session.doc_id());
        return Ok(());
    };

    let doc_id = session.doc_id();
    let version = operation.content_version;
    match direction {
        HistoryMove::Undo => metrics.on_undo(doc_id, version),
        HistoryMove::Redo => metrics.on_redo(doc_id, version),
    }

    debug!("{} of version {} on document {} requested by {}", label, version, doc_id, user);
    let result = match direction {
        HistoryMove::Undo => store.undo(&user, doc_id, version).await,
        HistoryMove::Redo => store.redo(&user, doc_id, version).await,
    };
    let restored = match result {
        Ok(restored) => restored,
        Err(e) => {
            error!("Error applying {} of version {} on document {}: {}", label, version, doc_id, e);
            return Ok(());
        }
    };

    if !restored {
        debug!("Nothing to {} at version {} on document {}", label, version, doc_id);
        return Ok(());
    }

    session.send_ack_to(connection_id, &direction.ack(version)).await?;
    debug!("{} ack sent back to {}", label, user);

    session.send_to_others(connection_id, &user, &direction.command(version)).await?;
    debug!("{} sent to other clients of document {}", label, doc_id);
    Ok(())
}
