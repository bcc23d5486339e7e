//! WebSocket-backed messaging channel and P2P session lifecycle for an
//! online `AgentID` (spec §4.9, §4.10): [`MessageClient`] owns the single
//! reconnecting connection, [`SessionManager`] owns the sessions multiplexed
//! over it.

pub mod error;
pub mod message_client;
pub mod session_manager;

pub use error::{MessageClientError, SessionError};
pub use message_client::{ConnectionState, MessageClient, MessageHandler, ReconnectHandler};
pub use session_manager::{Member, Role, Session, SessionInfo, SessionManager};
