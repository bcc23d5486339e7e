//! Group-messaging correlation engine, typed operations, and cursor store
//! for an online `AgentID` (spec §4.11-§4.13).

pub mod client;
pub mod cursor;
pub mod error;
pub mod operations;

pub use client::{dispatch_event, ACPGroupEventHandler, EventProcessor, GroupClient, GroupResponse, GroupTransport};
pub use cursor::{Cursor, CursorStore, LocalCursorStore};
pub use error::GroupClientError;
pub use operations::{GroupOperations, RequestJoinResponse, SyncHandler, DEFAULT_PULL_LIMIT};

pub use acp_protocol::url::{parse_group_url, GroupUrl, GroupUrlError};
