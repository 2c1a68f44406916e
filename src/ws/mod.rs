pub mod connctx;
pub mod docsession;
pub mod engine;
pub mod handler;
pub mod registry;

pub use connctx::{Connection, ConnectionId, TransportError};
pub use docsession::{EditingSession, MemberInfo, SessionError};
pub use engine::EditingEngine;
pub use handler::websocket_handler;
pub use registry::SessionRegistry;
