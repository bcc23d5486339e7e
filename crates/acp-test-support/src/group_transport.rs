//! A [`GroupTransport`] that records every outbound payload and, when given a
//! responder, feeds a scripted reply straight back into the owning
//! [`GroupClient`] — letting integration tests drive `send_request`/
//! `handle_incoming` round trips without a real socket.

use std::sync::{Arc, OnceLock, Weak};

use acp_group::{GroupClient, GroupTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

type Responder = Box<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

pub struct ScriptedGroupTransport {
    sent: Mutex<Vec<(String, Value)>>,
    client: OnceLock<Weak<GroupClient>>,
    responder: Option<Responder>,
}

impl ScriptedGroupTransport {
    /// A transport that only records sends and never replies.
    #[must_use]
    pub fn silent() -> Arc<Self> {
        Arc::new(Self { sent: Mutex::new(Vec::new()), client: OnceLock::new(), responder: None })
    }

    /// A transport that, for each sent payload, asks `responder(action, payload)`
    /// for a reply and — if one is returned — hands it to the bound
    /// [`GroupClient::handle_incoming`] on a spawned task.
    pub fn scripted<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        Arc::new(Self { sent: Mutex::new(Vec::new()), client: OnceLock::new(), responder: Some(Box::new(responder)) })
    }

    /// Must be called once the owning `GroupClient` exists, before any
    /// `send_request` that expects an automatic reply.
    pub fn bind(self: &Arc<Self>, client: &Arc<GroupClient>) {
        let _ = self.client.set(Arc::downgrade(client));
    }

    #[must_use]
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl GroupTransport for ScriptedGroupTransport {
    async fn send(&self, target_aid: &str, payload: Value) -> Result<(), String> {
        self.sent.lock().push((target_aid.to_string(), payload.clone()));

        let Some(responder) = &self.responder else { return Ok(()) };
        let action = payload.get("action").and_then(Value::as_str).unwrap_or_default();
        let Some(reply) = responder(action, &payload) else { return Ok(()) };
        let Some(weak) = self.client.get() else { return Ok(()) };
        let Some(client) = weak.upgrade() else { return Ok(()) };

        tokio::spawn(async move {
            client.handle_incoming(&reply).await;
        });
        Ok(())
    }
}
