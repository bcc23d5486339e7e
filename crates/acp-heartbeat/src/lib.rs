//! UDP keep-alive loop owned exclusively by an online `AgentID`: sends
//! `HEARTBEAT_REQ` on a clamped interval, re-authenticates on a 401
//! `next_beat`, and forwards session invites (spec §4.8).

pub mod client;
pub mod error;

pub use client::{HeartbeatClient, InviteCallback, InviteReceived};
pub use error::HeartbeatError;
