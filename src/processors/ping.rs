use tracing::{debug, warn};

use super::{OperationProcessor, PayloadKind, ProcessFuture};
use crate::models::Operation;
use crate::ws::connctx::ConnectionId;
use crate::ws::docsession::EditingSession;

/// Handle `{"type":"ping"}`: keeps the connection marked alive, nothing is
/// sent back.
pub struct PingProcessor;

impl OperationProcessor for PingProcessor {
    fn operation_name(&self) -> &'static str {
        "ping"
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Bare
    }

    fn process<'a>(&'a self, session: &'a EditingSession, connection_id: ConnectionId, _operation: Operation) -> ProcessFuture<'a> {
        Box::pin(async move {
            debug!("Ping message received for document {}", session.doc_id());
            if let Err(e) = session.touch(connection_id).await {
                warn!("Ping on document {}: {}", session.doc_id(), e);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BaseOperation;
    use crate::ws::connctx::Connection;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ping_sends_nothing_and_refreshes_liveness() {
        let session = EditingSession::new("D1");
        let (u1, mut r1) = Connection::channel();
        let (u2, mut r2) = Connection::channel();
        session.join(u1.clone(), "u1").await.unwrap();
        session.join(u2.clone(), "u2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let before = session.idle_for(u1.id()).await.unwrap();

        let ping = Operation::Bare(BaseOperation { op_type: "ping".to_string() });
        PingProcessor.process(&session, u1.id(), ping).await.unwrap();

        assert!(session.idle_for(u1.id()).await.unwrap() < before);
        assert!(r1.try_recv().is_err());
        assert!(r2.try_recv().is_err());
    }
}
