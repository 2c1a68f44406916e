use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Error raised when a frame can no longer be handed to a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Outbound half of a client connection.
///
/// Frames are queued on an unbounded channel that a writer task drains into
/// the socket, so a send never waits on the network. Once the writer is gone
/// every send fails with [`TransportError::Closed`].
#[derive(Clone, Debug)]
pub struct Connection {
    id: ConnectionId,
    outbox: UnboundedSender<String>,
}

impl Connection {
    pub fn new(outbox: UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbox,
        }
    }

    /// Create a connection together with the receiving end of its outbox.
    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbox
            .send(text)
            .map_err(|_| TransportError::Closed(self.id))
    }

    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }
}
