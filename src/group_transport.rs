//! Adapts `acp-session`'s [`MessageClient`] to `acp-group`'s `GroupTransport`
//! (spec §4.11): every group request rides the same session WebSocket as
//! P2P traffic, wrapped in a `cmd::GROUP` envelope with `target_aid` folded
//! into the payload so the access point knows where to route it.

use std::sync::Arc;

use acp_group::GroupTransport;
use acp_protocol::envelope::{cmd, Envelope};
use acp_session::MessageClient;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct MessageClientGroupTransport {
    message_client: Arc<MessageClient>,
}

impl MessageClientGroupTransport {
    #[must_use]
    pub fn new(message_client: Arc<MessageClient>) -> Self {
        Self { message_client }
    }
}

#[async_trait]
impl GroupTransport for MessageClientGroupTransport {
    async fn send(&self, target_aid: &str, payload: Value) -> Result<(), String> {
        let mut data = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        };
        data.insert("target_aid".to_string(), Value::String(target_aid.to_string()));

        let envelope = serde_json::to_value(Envelope::new(cmd::GROUP, Value::Object(data)))
            .map_err(|e| format!("failed to serialize group envelope: {e}"))?;

        if self.message_client.send(envelope) {
            Ok(())
        } else {
            Err(format!("not connected: could not deliver group frame to {target_aid}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acp_session::WsConfig;

    #[tokio::test]
    async fn send_fails_when_message_client_is_not_connected() {
        let client = Arc::new(MessageClient::new("https://ap.example/session", WsConfig::default()));
        let transport = MessageClientGroupTransport::new(client);
        let result = transport.send("group.aid.pub", serde_json::json!({"action": "get_cursor"})).await;
        assert!(result.is_err());
    }
}
