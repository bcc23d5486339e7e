//! Group wire payloads (spec §4.11, §6.1): messages, events, batch push,
//! notifications, and the `pull_messages` response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub msg_id: i64,
    pub sender: String,
    pub content: String,
    pub content_type: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEvent {
    pub event_id: i64,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// `data` payload of a `message_batch_push` action (spec §6.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessageBatch {
    pub messages: Vec<GroupMessage>,
    pub start_msg_id: i64,
    pub latest_msg_id: i64,
    pub count: i64,
}

impl GroupMessageBatch {
    /// Sort `messages` ascending by `msg_id`, as the spec requires before
    /// delivery to a handler (§5 ordering guarantees).
    pub fn sorted(mut self) -> Self {
        self.messages.sort_by_key(|m| m.msg_id);
        self
    }
}

/// `pull_messages` response shape (spec §6.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullMessagesResponse {
    pub messages: Vec<GroupMessage>,
    pub has_more: bool,
    pub latest_msg_id: i64,
}

/// `pull_events` response shape, mirroring [`PullMessagesResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullEventsResponse {
    pub events: Vec<GroupEvent>,
    pub has_more: bool,
    pub latest_event_id: i64,
}

/// Server→client notification envelope: `{action:"group_notify", group_id,
/// event, data, timestamp}` (spec §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupNotification {
    pub action: String,
    pub group_id: String,
    pub event: String,
    pub data: Value,
    pub timestamp: i64,
}

/// A parsed `send_request`/response frame, as seen by [`crate::envelope`]
/// dispatch (spec §4.11 `handle_incoming`).
#[derive(Debug, Clone, Deserialize)]
pub struct GroupResponseWire {
    pub action: String,
    pub request_id: Option<String>,
    pub code: i64,
    #[serde(default)]
    pub error: String,
    pub group_id: String,
    #[serde(default)]
    pub data: Value,
}

/// Recognized `event` values in a [`GroupNotification`] (spec §4.11.1).
pub mod notify_event {
    pub const NEW_MESSAGE: &str = "new_message";
    pub const NEW_EVENT: &str = "new_event";
    pub const GROUP_INVITE: &str = "group_invite";
    pub const JOIN_APPROVED: &str = "join_approved";
    pub const JOIN_REJECTED: &str = "join_rejected";
    pub const JOIN_REQUEST_RECEIVED: &str = "join_request_received";
    pub const GROUP_EVENT: &str = "group_event";
    /// Kept for back-compat; not emitted by the current server contract.
    pub const GROUP_MESSAGE: &str = "group_message";
}

/// Structured group-event `event_type` values dispatched via
/// `DispatchEvent` to `EventProcessor` callbacks (spec §4.11.1).
pub mod event_type {
    pub const MEMBER_JOINED: &str = "member_joined";
    pub const MEMBER_REMOVED: &str = "member_removed";
    pub const MEMBER_LEFT: &str = "member_left";
    pub const MEMBER_BANNED: &str = "member_banned";
    pub const MEMBER_UNBANNED: &str = "member_unbanned";
    pub const META_UPDATED: &str = "meta_updated";
    pub const RULES_UPDATED: &str = "rules_updated";
    pub const ANNOUNCEMENT_UPDATED: &str = "announcement_updated";
    pub const GROUP_DISSOLVED: &str = "group_dissolved";
    pub const MASTER_TRANSFERRED: &str = "master_transferred";
    pub const GROUP_SUSPENDED: &str = "group_suspended";
    pub const GROUP_RESUMED: &str = "group_resumed";
    pub const JOIN_REQUIREMENTS_UPDATED: &str = "join_requirements_updated";
    pub const INVITE_CODE_CREATED: &str = "invite_code_created";
    pub const INVITE_CODE_REVOKED: &str = "invite_code_revoked";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_is_sorted_ascending_by_msg_id() {
        let batch = GroupMessageBatch {
            messages: vec![
                GroupMessage { msg_id: 3, sender: "x".into(), content: "c".into(), content_type: "text/plain".into(), timestamp: 1, metadata: None },
                GroupMessage { msg_id: 2, sender: "y".into(), content: "b".into(), content_type: "text/plain".into(), timestamp: 1, metadata: None },
                GroupMessage { msg_id: 4, sender: "z".into(), content: "d".into(), content_type: "text/plain".into(), timestamp: 1, metadata: None },
            ],
            start_msg_id: 2,
            latest_msg_id: 4,
            count: 3,
        };
        let sorted = batch.sorted();
        let ids: Vec<i64> = sorted.messages.iter().map(|m| m.msg_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn parses_group_notify_shape() {
        let raw = json!({
            "action": "group_notify",
            "group_id": "g1",
            "event": "new_message",
            "data": {"latest_msg_id": 10, "sender": "bob.aid.pub", "preview": "hi"},
            "timestamp": 12345
        });
        let notify: GroupNotification = serde_json::from_value(raw).unwrap();
        assert_eq!(notify.event, notify_event::NEW_MESSAGE);
    }
}
