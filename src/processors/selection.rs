use tracing::{debug, warn};

use super::{OperationProcessor, PayloadKind, ProcessFuture};
use crate::models::{Operation, SelectionMessage, SendMessage};
use crate::ws::connctx::ConnectionId;
use crate::ws::docsession::EditingSession;

/// Handle `{"type":"selection","selection":"/paths/~1pets"}`. Selections are
/// presence only and never touch the store.
pub struct SelectionProcessor;

impl OperationProcessor for SelectionProcessor {
    fn operation_name(&self) -> &'static str {
        "selection"
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Selection
    }

    fn process<'a>(&'a self, session: &'a EditingSession, connection_id: ConnectionId, operation: Operation) -> ProcessFuture<'a> {
        Box::pin(async move {
            let op = match operation {
                Operation::Selection(op) => op,
                other => {
                    warn!("selection processor received a '{}' payload", other.op_type());
                    return Ok(());
                }
            };
            let Some(user) = session.get_user(connection_id).await else {
                warn!("Ignoring selection from connection {} which is not in document {}", connection_id, session.doc_id());
                return Ok(());
            };

            debug!("Selection of {} on document {}: {:?}", user, session.doc_id(), op.selection);
            let msg = SendMessage::Selection(SelectionMessage {
                user: user.clone(),
                id: connection_id.to_string(),
                selection: op.selection,
            });
            session.send_to_others(connection_id, &user, &msg).await
        })
    }
}
