pub mod command;
pub mod history;
pub mod ping;
pub mod redo;
pub mod selection;
pub mod undo;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics::EditingMetrics;
use crate::models::{Envelope, Operation};
use crate::store::ContentStore;
use crate::ws::connctx::ConnectionId;
use crate::ws::docsession::{EditingSession, SessionError};

pub use command::CommandProcessor;
pub use ping::PingProcessor;
pub use redo::RedoProcessor;
pub use selection::SelectionProcessor;
pub use undo::UndoProcessor;

pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'a>>;

/// Shape a processor expects its payload to decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Bare,
    Versioned,
    Command,
    Selection,
}

impl PayloadKind {
    pub fn decode(self, raw: &str) -> Result<Operation, serde_json::Error> {
        Ok(match self {
            PayloadKind::Bare => Operation::Bare(serde_json::from_str(raw)?),
            PayloadKind::Versioned => Operation::Versioned(serde_json::from_str(raw)?),
            PayloadKind::Command => Operation::Command(serde_json::from_str(raw)?),
            PayloadKind::Selection => Operation::Selection(serde_json::from_str(raw)?),
        })
    }
}

/// Handler for one inbound operation type.
///
/// Processors hold no per-connection state; membership and identity come
/// from the session passed to `process`.
pub trait OperationProcessor: Send + Sync {
    fn operation_name(&self) -> &'static str;

    fn payload_kind(&self) -> PayloadKind;

    fn process<'a>(&'a self, session: &'a EditingSession, connection_id: ConnectionId, operation: Operation) -> ProcessFuture<'a>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a processor is already registered for operation '{0}'")]
    DuplicateProcessor(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("malformed message envelope: {0}")]
    Malformed(serde_json::Error),

    #[error("unknown operation type '{0}'")]
    UnknownType(String),

    #[error("invalid payload for operation '{op_type}': {source}")]
    Decode {
        op_type: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Routing table from operation type to processor. Built at startup and
/// shared read-only afterwards.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<&'static str, Box<dyn OperationProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in processor.
    pub fn with_defaults(store: Arc<dyn ContentStore>, metrics: Arc<dyn EditingMetrics>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Box::new(PingProcessor))?;
        registry.register(Box::new(UndoProcessor::new(store.clone(), metrics.clone())))?;
        registry.register(Box::new(RedoProcessor::new(store.clone(), metrics.clone())))?;
        registry.register(Box::new(CommandProcessor::new(store, metrics)))?;
        registry.register(Box::new(SelectionProcessor))?;
        Ok(registry)
    }

    pub fn register(&mut self, processor: Box<dyn OperationProcessor>) -> Result<(), RegistryError> {
        let name = processor.operation_name();
        if self.processors.contains_key(name) {
            return Err(RegistryError::DuplicateProcessor(name.to_string()));
        }
        info!("Registered processor for operation '{}'", name);
        self.processors.insert(name, processor);
        Ok(())
    }

    pub fn operation_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.processors.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Decode `raw` in two phases (discriminator, then the processor's
    /// payload shape) and run the matching processor.
    pub async fn dispatch(&self, session: &EditingSession, connection_id: ConnectionId, raw: &str) -> Result<(), DispatchError> {
        let envelope: Envelope = serde_json::from_str(raw).map_err(DispatchError::Malformed)?;
        let processor = self
            .processors
            .get(envelope.op_type.as_str())
            .ok_or_else(|| DispatchError::UnknownType(envelope.op_type.clone()))?;

        let operation = processor
            .payload_kind()
            .decode(raw)
            .map_err(|source| DispatchError::Decode {
                op_type: envelope.op_type.clone(),
                source,
            })?;

        debug!("Dispatching '{}' from connection {} on document {}", envelope.op_type, connection_id, session.doc_id());
        processor.process(session, connection_id, operation).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CacheMetrics;
    use crate::store::testing::ScriptedStore;
    use crate::ws::connctx::Connection;
    use std::time::Duration;

    fn registry_with(store: ScriptedStore) -> ProcessorRegistry {
        ProcessorRegistry::with_defaults(Arc::new(store), Arc::new(CacheMetrics::new(Duration::from_secs(60)))).unwrap()
    }

    #[test]
    fn test_defaults_register_all_operations() {
        let registry = registry_with(ScriptedStore::new());
        assert_eq!(registry.operation_names(), vec!["command", "ping", "redo", "selection", "undo"]);
    }

    #[test]
    fn test_duplicate_registration_is_refused() {
        let mut registry = registry_with(ScriptedStore::new());
        let result = registry.register(Box::new(PingProcessor));
        assert!(matches!(result, Err(RegistryError::DuplicateProcessor(name)) if name == "ping"));
    }

    #[test]
    fn test_payload_kind_decodes_matching_shape() {
        let op = PayloadKind::Versioned.decode(r#"{"type":"undo","contentVersion":5}"#).unwrap();
        assert_eq!(op.op_type(), "undo");
        assert!(matches!(op, Operation::Versioned(v) if v.content_version == 5));
        assert!(PayloadKind::Versioned.decode(r#"{"type":"undo"}"#).is_err());
    }

    #[tokio::test]
    async fn test_unknown_type_is_dropped_and_next_message_works() {
        let registry = registry_with(ScriptedStore::new().answer("alice", Ok(true)));
        let session = EditingSession::new("D1");
        let (a, mut ra) = Connection::channel();
        session.join(a.clone(), "alice").await.unwrap();

        let result = registry.dispatch(&session, a.id(), r#"{"type":"rename","name":"x"}"#).await;
        assert!(matches!(result, Err(DispatchError::UnknownType(t)) if t == "rename"));
        assert!(ra.try_recv().is_err());

        registry.dispatch(&session, a.id(), r#"{"type":"undo","contentVersion":2}"#).await.unwrap();
        assert!(ra.try_recv().unwrap().contains(r#""contentVersion":2"#));
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_dropped() {
        let store = Arc::new(ScriptedStore::new().answer("alice", Ok(true)));
        let registry = ProcessorRegistry::with_defaults(store.clone(), Arc::new(CacheMetrics::new(Duration::from_secs(60)))).unwrap();
        let session = EditingSession::new("D1");
        let (a, mut ra) = Connection::channel();
        session.join(a.clone(), "alice").await.unwrap();

        let result = registry.dispatch(&session, a.id(), r#"{"type":"undo","contentVersion":"five"}"#).await;
        assert!(matches!(result, Err(DispatchError::Decode { ref op_type, .. }) if op_type == "undo"));
        assert!(ra.try_recv().is_err());
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_discriminator_is_malformed() {
        let registry = registry_with(ScriptedStore::new());
        let session = EditingSession::new("D1");
        let (a, _ra) = Connection::channel();
        session.join(a.clone(), "alice").await.unwrap();

        for raw in [r#"{"contentVersion":1}"#, "not json", r#"{"type":7}"#] {
            let result = registry.dispatch(&session, a.id(), raw).await;
            assert!(matches!(result, Err(DispatchError::Malformed(_))), "{}", raw);
        }
    }
}
