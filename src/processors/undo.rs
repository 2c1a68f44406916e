use std::sync::Arc;
use tracing::warn;

use super::history::{self, HistoryMove};
use super::{OperationProcessor, PayloadKind, ProcessFuture};
use crate::metrics::EditingMetrics;
use crate::models::Operation;
use crate::store::ContentStore;
use crate::ws::connctx::ConnectionId;
use crate::ws::docsession::EditingSession;

/// Handle `{"type":"undo","contentVersion":N}`.
pub struct UndoProcessor {
    store: Arc<dyn ContentStore>,
    metrics: Arc<dyn EditingMetrics>,
}

impl UndoProcessor {
    pub fn new(store: Arc<dyn ContentStore>, metrics: Arc<dyn EditingMetrics>) -> Self {
        Self { store, metrics }
    }
}

impl OperationProcessor for UndoProcessor {
    fn operation_name(&self) -> &'static str {
        "undo"
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Versioned
    }

    fn process<'a>(&'a self, session: &'a EditingSession, connection_id: ConnectionId, operation: Operation) -> ProcessFuture<'a> {
        Box::pin(async move {
            let op = match operation {
                Operation::Versioned(op) => op,
                other => {
                    warn!("undo processor received a '{}' payload", other.op_type());
                    return Ok(());
                }
            };
            history::apply(HistoryMove::Undo, &self.store, &self.metrics, session, connection_id, op).await
        })
    }
}
