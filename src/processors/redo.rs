use std::sync::Arc;
use tracing::warn;

use super::history::{self, HistoryMove};
use super::{OperationProcessor, PayloadKind, ProcessFuture};
use crate::metrics::EditingMetrics;
use crate::models::Operation;
use crate::store::ContentStore;
use crate::ws::connctx::ConnectionId;
use crate::ws::docsession::EditingSession;

/// Handle `{"type":"redo","contentVersion":N}`.
pub struct RedoProcessor {
    store: Arc<dyn ContentStore>,
    metrics: Arc<dyn EditingMetrics>,
}

impl RedoProcessor {
    pub fn new(store: Arc<dyn ContentStore>, metrics: Arc<dyn EditingMetrics>) -> Self {
        Self { store, metrics }
    }
}

impl OperationProcessor for RedoProcessor {
    fn operation_name(&self) -> &'static str {
        "redo"
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Versioned
    }

    fn process<'a>(&'a self, session: &'a EditingSession, connection_id: ConnectionId, operation: Operation) -> ProcessFuture<'a> {
        Box::pin(async move {
            let op = match operation {
                Operation::Versioned(op) => op,
                other => {
                    warn!("redo processor received a '{}' payload", other.op_type());
                    return Ok(());
                }
            };
            history::apply(HistoryMove::Redo, &self.store, &self.metrics, session, connection_id, op).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CacheMetrics;
    use crate::models::VersionedOperation;
    use crate::store::testing::ScriptedStore;
    use crate::store::MemoryContentStore;
    use crate::ws::connctx::Connection;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn redo_op(version: u64) -> Operation {
        Operation::Versioned(VersionedOperation {
            op_type: "redo".to_string(),
            content_version: version,
        })
    }

    #[tokio::test]
    async fn test_rejected_redo_sends_nothing() {
        let store = Arc::new(ScriptedStore::new().answer("u1", Ok(false)));
        let metrics = Arc::new(CacheMetrics::new(Duration::from_secs(60)));
        let processor = RedoProcessor::new(store.clone(), metrics.clone());
        let session = EditingSession::new("D1");
        let (u1, mut r1) = Connection::channel();
        let (u2, mut r2) = Connection::channel();
        session.join(u1.clone(), "u1").await.unwrap();
        session.join(u2.clone(), "u2").await.unwrap();

        processor.process(&session, u1.id(), redo_op(7)).await.unwrap();

        assert!(r1.try_recv().is_err());
        assert!(r2.try_recv().is_err());
        assert_eq!(store.calls.lock().unwrap().len(), 1);
        assert_eq!(metrics.for_document("D1").unwrap().redo, 1);
    }

    #[tokio::test]
    async fn test_redo_after_undo_round_trip() {
        let store = Arc::new(MemoryContentStore::new());
        store.add_content("u1", "D1", json!({"op": "add-path"})).await.unwrap();
        store.undo("u1", "D1", 1).await.unwrap();

        let processor = RedoProcessor::new(store.clone(), Arc::new(CacheMetrics::new(Duration::from_secs(60))));
        let session = EditingSession::new("D1");
        let (u1, mut r1) = Connection::channel();
        let (u2, mut r2) = Connection::channel();
        session.join(u1.clone(), "u1").await.unwrap();
        session.join(u2.clone(), "u2").await.unwrap();

        processor.process(&session, u2.id(), redo_op(1)).await.unwrap();
        processor.process(&session, u2.id(), redo_op(1)).await.unwrap();

        let ack: Value = serde_json::from_str(&r2.try_recv().unwrap()).unwrap();
        let broadcast: Value = serde_json::from_str(&r1.try_recv().unwrap()).unwrap();
        assert_eq!(ack, json!({"type": "ack", "ackType": "redo", "contentVersion": 1}));
        assert_eq!(broadcast, json!({"type": "redo", "contentVersion": 1}));
        assert!(r1.try_recv().is_err());
        assert!(r2.try_recv().is_err());
        assert_eq!(store.current_version("D1").await.unwrap(), 1);
    }
}
