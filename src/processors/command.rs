use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{OperationProcessor, PayloadKind, ProcessFuture};
use crate::metrics::EditingMetrics;
use crate::models::{AckMessage, CommandMessage, Operation, SendMessage};
use crate::store::ContentStore;
use crate::ws::connctx::ConnectionId;
use crate::ws::docsession::EditingSession;

/// Handle `{"type":"command","commandId":N,"command":{...}}`.
///
/// Each command is stored as a new content version. The requester gets the
/// assigned version in its ack and every other member receives the command
/// to apply locally.
pub struct CommandProcessor {
    store: Arc<dyn ContentStore>,
    metrics: Arc<dyn EditingMetrics>,
}

impl CommandProcessor {
    pub fn new(store: Arc<dyn ContentStore>, metrics: Arc<dyn EditingMetrics>) -> Self {
        Self { store, metrics }
    }
}

impl OperationProcessor for CommandProcessor {
    fn operation_name(&self) -> &'static str {
        "command"
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Command
    }

    fn process<'a>(&'a self, session: &'a EditingSession, connection_id: ConnectionId, operation: Operation) -> ProcessFuture<'a> {
        Box::pin(async move {
            let op = match operation {
                Operation::Command(op) => op,
                other => {
                    warn!("command processor received a '{}' payload", other.op_type());
                    return Ok(());
                }
            };
            let Some(user) = session.get_user(connection_id).await else {
                warn!("Ignoring command from connection {} which is not in document {}", connection_id, session.doc_id());
                return Ok(());
            };
            let doc_id = session.doc_id();
            self.metrics.on_command(doc_id);

            let version = match self.store.add_content(&user, doc_id, op.command.clone()).await {
                Ok(version) => version,
                Err(e) => {
                    error!("Error storing command {} from {} on document {}: {}", op.command_id, user, doc_id, e);
                    return Ok(());
                }
            };

            session
                .send_ack_to(connection_id, &SendMessage::Ack(AckMessage::command(op.command_id, version)))
                .await?;
            debug!("Command {} stored as version {} of document {}", op.command_id, version, doc_id);

            let command = SendMessage::Command(CommandMessage {
                command: op.command,
                user: user.clone(),
                content_version: version,
            });
            session.send_to_others(connection_id, &user, &command).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CacheMetrics;
    use crate::models::CommandOperation;
    use crate::store::testing::ScriptedStore;
    use crate::store::MemoryContentStore;
    use crate::ws::connctx::Connection;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn command_op(id: u64, command: Value) -> Operation {
        Operation::Command(CommandOperation {
            op_type: "command".to_string(),
            command_id: id,
            command,
        })
    }

    #[tokio::test]
    async fn test_command_is_stored_acked_and_broadcast() {
        let store = Arc::new(MemoryContentStore::new());
        let metrics = Arc::new(CacheMetrics::new(Duration::from_secs(60)));
        let processor = CommandProcessor::new(store.clone(), metrics.clone());
        let session = EditingSession::new("D1");
        let (u1, mut r1) = Connection::channel();
        let (u2, mut r2) = Connection::channel();
        session.join(u1.clone(), "alice").await.unwrap();
        session.join(u2.clone(), "bob").await.unwrap();

        let cmd = json!({"__type": "ChangeTitleCommand", "_newTitle": "Pets"});
        processor.process(&session, u1.id(), command_op(11, cmd.clone())).await.unwrap();

        let ack: Value = serde_json::from_str(&r1.try_recv().unwrap()).unwrap();
        let broadcast: Value = serde_json::from_str(&r2.try_recv().unwrap()).unwrap();
        assert_eq!(ack, json!({"type": "ack", "ackType": "command", "commandId": 11, "contentVersion": 1}));
        assert_eq!(broadcast, json!({"type": "command", "command": cmd, "user": "alice", "contentVersion": 1}));
        assert!(r1.try_recv().is_err());
        assert_eq!(store.current_version("D1").await.unwrap(), 1);
        assert_eq!(metrics.totals().command, 1);
    }

    #[tokio::test]
    async fn test_failed_store_is_silent() {
        let store = Arc::new(ScriptedStore::new().answer("alice", Err("read-only")));
        let processor = CommandProcessor::new(store, Arc::new(CacheMetrics::new(Duration::from_secs(60))));
        let session = EditingSession::new("D1");
        let (u1, mut r1) = Connection::channel();
        let (u2, mut r2) = Connection::channel();
        session.join(u1.clone(), "alice").await.unwrap();
        session.join(u2.clone(), "bob").await.unwrap();

        processor.process(&session, u1.id(), command_op(1, json!({}))).await.unwrap();

        assert!(r1.try_recv().is_err());
        assert!(r2.try_recv().is_err());
    }
}
