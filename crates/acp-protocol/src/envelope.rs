//! WebSocket JSON envelope (spec §4.9): every text frame is
//! `{"cmd": "<verb>", "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub cmd: String,
    pub data: Value,
}

impl Envelope {
    #[must_use]
    pub fn new(cmd: impl Into<String>, data: Value) -> Self {
        Self { cmd: cmd.into(), data }
    }

    /// `data.request_id`, if present and a string.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.data.get("request_id").and_then(Value::as_str)
    }
}

/// Command verbs exchanged over the session WebSocket (spec §4.9).
pub mod cmd {
    pub const SESSION_MESSAGE: &str = "session_message";
    pub const CREATE_SESSION_REQ: &str = "create_session_req";
    pub const CREATE_SESSION_ACK: &str = "create_session_ack";
    pub const JOIN_SESSION_REQ: &str = "join_session_req";
    pub const LEAVE_SESSION_REQ: &str = "leave_session_req";
    pub const CLOSE_SESSION_REQ: &str = "close_session_req";
    pub const INVITE_AGENT_REQ: &str = "invite_agent_req";
    pub const INVITE_AGENT_ACK: &str = "invite_agent_ack";
    pub const EJECT_AGENT_REQ: &str = "eject_agent_req";
    pub const GET_MEMBER_LIST: &str = "get_member_list";
    pub const SESSION_CREATE_STREAM_REQ: &str = "session_create_stream_req";
    pub const SESSION_CREATE_STREAM_ACK: &str = "session_create_stream_ack";
    pub const PUSH_TEXT_STREAM_REQ: &str = "push_text_stream_req";
    pub const CLOSE_STREAM_REQ: &str = "close_stream_req";
    /// Wraps a group-module payload (spec §4.11) so it can ride the same
    /// session WebSocket as P2P traffic.
    pub const GROUP: &str = "group";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_cmd_data_shape() {
        let raw = r#"{"cmd":"create_session_ack","data":{"request_id":"r1","session_id":"s1"}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.cmd, "create_session_ack");
        assert_eq!(env.request_id(), Some("r1"));
    }

    #[test]
    fn serializes_back_to_cmd_data_shape() {
        let env = Envelope::new("session_message", json!({"message": "hi"}));
        let out = serde_json::to_value(&env).unwrap();
        assert_eq!(out["cmd"], "session_message");
        assert_eq!(out["data"]["message"], "hi");
    }
}
