//! Request/response correlation over a user-supplied transport (spec §4.11):
//! `send_request` registers a pending entry keyed by a monotonic request id,
//! hands the framed payload to [`GroupTransport::send`], and waits on a
//! oneshot for the matching response. `handle_incoming` is the single
//! dispatch point for everything the transport delivers back: responses,
//! notifications, and batch pushes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acp_protocol::group::{notify_event, event_type, GroupMessageBatch, GroupNotification, GroupResponseWire};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::GroupClientError;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Outbound half of [`GroupClient`]: hands a framed request payload to
/// whatever carries it to `target_aid` (the session WebSocket, in practice).
#[async_trait]
pub trait GroupTransport: Send + Sync {
    async fn send(&self, target_aid: &str, payload: Value) -> Result<(), String>;
}

/// A completed (or cancelled) `send_request` result.
#[derive(Debug, Clone)]
pub struct GroupResponse {
    pub action: String,
    pub code: i64,
    pub error: String,
    pub group_id: String,
    pub data: Value,
    pub cancelled: bool,
}

impl GroupResponse {
    /// `code == 0` and not cancelled.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !self.cancelled && self.code == 0
    }
}

/// Capability-set callbacks for [`acp_protocol::group::notify_event`] values
/// (spec §4.11.1). Every method defaults to a no-op so a handler only
/// overrides what it cares about.
#[async_trait]
pub trait ACPGroupEventHandler: Send + Sync {
    async fn on_new_message(&self, _group_id: &str, _latest_msg_id: i64, _sender: &str, _preview: &str) {}
    async fn on_new_event(&self, _group_id: &str, _latest_event_id: i64, _event_type: &str, _summary: &str) {}
    async fn on_group_invite(&self, _group_id: &str, _group_address: &str, _invited_by: &str) {}
    async fn on_join_approved(&self, _group_id: &str) {}
    async fn on_join_rejected(&self, _group_id: &str) {}
    async fn on_join_request_received(&self, _group_id: &str) {}
    async fn on_group_event(&self, _group_id: &str, _event: &Value) {}
    async fn on_group_message_batch(&self, _group_id: &str, _batch: GroupMessageBatch) {}
}

/// Capability-set callbacks for structured group events dispatched via
/// `DispatchEvent` (spec §4.11.1). `payload` is the raw event body; callers
/// needing typed fields parse it themselves.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn member_joined(&self, _group_id: &str, _payload: &Value) {}
    async fn member_removed(&self, _group_id: &str, _payload: &Value) {}
    async fn member_left(&self, _group_id: &str, _payload: &Value) {}
    async fn member_banned(&self, _group_id: &str, _payload: &Value) {}
    async fn member_unbanned(&self, _group_id: &str, _payload: &Value) {}
    async fn meta_updated(&self, _group_id: &str, _payload: &Value) {}
    async fn rules_updated(&self, _group_id: &str, _payload: &Value) {}
    async fn announcement_updated(&self, _group_id: &str, _payload: &Value) {}
    async fn group_dissolved(&self, _group_id: &str, _payload: &Value) {}
    async fn master_transferred(&self, _group_id: &str, _payload: &Value) {}
    async fn group_suspended(&self, _group_id: &str, _payload: &Value) {}
    async fn group_resumed(&self, _group_id: &str, _payload: &Value) {}
    async fn join_requirements_updated(&self, _group_id: &str, _payload: &Value) {}
    async fn invite_code_created(&self, _group_id: &str, _payload: &Value) {}
    async fn invite_code_revoked(&self, _group_id: &str, _payload: &Value) {}
}

/// Dispatch a structured group event (`msg_type`, `payload`) to the matching
/// [`EventProcessor`] method; unrecognized types are dropped with a `warn!`.
pub async fn dispatch_event(processor: &dyn EventProcessor, group_id: &str, msg_type: &str, payload: &Value) {
    match msg_type {
        event_type::MEMBER_JOINED => processor.member_joined(group_id, payload).await,
        event_type::MEMBER_REMOVED => processor.member_removed(group_id, payload).await,
        event_type::MEMBER_LEFT => processor.member_left(group_id, payload).await,
        event_type::MEMBER_BANNED => processor.member_banned(group_id, payload).await,
        event_type::MEMBER_UNBANNED => processor.member_unbanned(group_id, payload).await,
        event_type::META_UPDATED => processor.meta_updated(group_id, payload).await,
        event_type::RULES_UPDATED => processor.rules_updated(group_id, payload).await,
        event_type::ANNOUNCEMENT_UPDATED => processor.announcement_updated(group_id, payload).await,
        event_type::GROUP_DISSOLVED => processor.group_dissolved(group_id, payload).await,
        event_type::MASTER_TRANSFERRED => processor.master_transferred(group_id, payload).await,
        event_type::GROUP_SUSPENDED => processor.group_suspended(group_id, payload).await,
        event_type::GROUP_RESUMED => processor.group_resumed(group_id, payload).await,
        event_type::JOIN_REQUIREMENTS_UPDATED => processor.join_requirements_updated(group_id, payload).await,
        event_type::INVITE_CODE_CREATED => processor.invite_code_created(group_id, payload).await,
        event_type::INVITE_CODE_REVOKED => processor.invite_code_revoked(group_id, payload).await,
        other => warn!(msg_type = other, "unrecognized group event type, dropping"),
    }
}

struct PendingEntry {
    action: String,
    group_id: String,
    tx: oneshot::Sender<GroupResponse>,
}

/// Correlation engine described above (spec §4.11); generic over the
/// transport so `acp-session`'s [`MessageClient`] or a test fake can both
/// implement [`GroupTransport`].
pub struct GroupClient {
    transport: Arc<dyn GroupTransport>,
    pending: Mutex<HashMap<String, PendingEntry>>,
    next_seq: AtomicU64,
    closed: AtomicBool,
    event_handler: Mutex<Option<Arc<dyn ACPGroupEventHandler>>>,
    event_processor: Mutex<Option<Arc<dyn EventProcessor>>>,
}

impl GroupClient {
    #[must_use]
    pub fn new(transport: Arc<dyn GroupTransport>) -> Self {
        Self {
            transport,
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            event_handler: Mutex::new(None),
            event_processor: Mutex::new(None),
        }
    }

    pub fn set_event_handler(&self, handler: Arc<dyn ACPGroupEventHandler>) {
        *self.event_handler.lock() = Some(handler);
    }

    pub fn set_event_processor(&self, processor: Arc<dyn EventProcessor>) {
        *self.event_processor.lock() = Some(processor);
    }

    /// Monotonic `seq_id` rendered as a lowercase 16-hex-digit id prefixed
    /// `"r"` (spec §4.11).
    fn next_request_id(&self) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        format!("r{seq:016x}")
    }

    /// Build `{action, request_id, group_id, ...params}`, register a pending
    /// waiter, hand it to the transport, and await the matching response or
    /// `timeout_ms` (default 30000).
    pub async fn send_request(
        &self,
        target_aid: &str,
        group_id: &str,
        action: &str,
        params: Value,
        timeout_ms: Option<u64>,
    ) -> Result<GroupResponse, GroupClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GroupClientError::Closed);
        }
        let request_id = self.next_request_id();
        let mut payload = Map::new();
        payload.insert("action".to_string(), json!(action));
        payload.insert("request_id".to_string(), json!(request_id));
        payload.insert("group_id".to_string(), json!(group_id));
        if let Value::Object(extra) = params {
            payload.extend(extra);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            request_id.clone(),
            PendingEntry { action: action.to_string(), group_id: group_id.to_string(), tx },
        );

        if let Err(e) = self.transport.send(target_aid, Value::Object(payload)).await {
            self.pending.lock().remove(&request_id);
            return Err(GroupClientError::SendFailed(e));
        }

        let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) | Err(_) => {
                self.pending.lock().remove(&request_id);
                return Err(GroupClientError::Timeout);
            }
        };

        if response.cancelled {
            return Err(GroupClientError::Closed);
        }
        if response.code != 0 {
            return Err(GroupClientError::Remote {
                action: response.action,
                code: response.code,
                error: response.error,
                group_id: response.group_id,
            });
        }
        Ok(response)
    }

    /// Single dispatch point for everything the transport delivers back
    /// (spec §4.11): response, notification, or batch push, checked in that
    /// order.
    pub async fn handle_incoming(&self, payload_json: &Value) {
        if let Some(request_id) = payload_json.get("request_id").and_then(Value::as_str) {
            if let Some(entry) = self.pending.lock().remove(request_id) {
                let wire: Option<GroupResponseWire> = serde_json::from_value(payload_json.clone()).ok();
                let response = match wire {
                    Some(w) => GroupResponse {
                        action: w.action,
                        code: w.code,
                        error: w.error,
                        group_id: w.group_id,
                        data: w.data,
                        cancelled: false,
                    },
                    None => GroupResponse {
                        action: entry.action,
                        code: -1,
                        error: "malformed response".to_string(),
                        group_id: entry.group_id,
                        data: Value::Null,
                        cancelled: false,
                    },
                };
                let _ = entry.tx.send(response);
                return;
            }
        }

        if let Some(event) = payload_json.get("event").and_then(Value::as_str) {
            let notification: Result<GroupNotification, _> = serde_json::from_value(payload_json.clone());
            if let Ok(notification) = notification {
                self.dispatch_notify(event, &notification).await;
            } else {
                warn!(event, "malformed group notification, dropping");
            }
            return;
        }

        if payload_json.get("action").and_then(Value::as_str) == Some("message_batch_push") {
            let Some(data) = payload_json.get("data").filter(|d| !d.is_null()) else {
                return;
            };
            let Some(group_id) = payload_json.get("group_id").and_then(Value::as_str) else {
                return;
            };
            match serde_json::from_value::<GroupMessageBatch>(data.clone()) {
                Ok(batch) => {
                    let handler = self.event_handler.lock().clone();
                    if let Some(handler) = handler {
                        handler.on_group_message_batch(group_id, batch.sorted()).await;
                    }
                }
                Err(e) => warn!(error = %e, "malformed message_batch_push, dropping"),
            }
        }
    }

    async fn dispatch_notify(&self, event: &str, notification: &GroupNotification) {
        let Some(handler) = self.event_handler.lock().clone() else {
            trace!(event, "no event handler registered, dropping notification");
            return;
        };
        let group_id = notification.group_id.as_str();
        match event {
            notify_event::NEW_MESSAGE => {
                let latest_msg_id = notification.data.get("latest_msg_id").and_then(Value::as_i64).unwrap_or(0);
                let sender = notification.data.get("sender").and_then(Value::as_str).unwrap_or_default();
                let preview = notification.data.get("preview").and_then(Value::as_str).unwrap_or_default();
                handler.on_new_message(group_id, latest_msg_id, sender, preview).await;
            }
            notify_event::NEW_EVENT => {
                let latest_event_id = notification.data.get("latest_event_id").and_then(Value::as_i64).unwrap_or(0);
                let event_type = notification.data.get("event_type").and_then(Value::as_str).unwrap_or_default();
                let summary = notification.data.get("summary").and_then(Value::as_str).unwrap_or_default();
                handler.on_new_event(group_id, latest_event_id, event_type, summary).await;
            }
            notify_event::GROUP_INVITE => {
                let group_address = notification.data.get("group_address").and_then(Value::as_str).unwrap_or_default();
                let invited_by = notification.data.get("invited_by").and_then(Value::as_str).unwrap_or_default();
                handler.on_group_invite(group_id, group_address, invited_by).await;
            }
            notify_event::JOIN_APPROVED => handler.on_join_approved(group_id).await,
            notify_event::JOIN_REJECTED => handler.on_join_rejected(group_id).await,
            notify_event::JOIN_REQUEST_RECEIVED => handler.on_join_request_received(group_id).await,
            notify_event::GROUP_EVENT => {
                handler.on_group_event(group_id, &notification.data).await;
                let processor = self.event_processor.lock().clone();
                if let Some(processor) = processor {
                    if let Some(msg_type) = notification.data.get("event_type").and_then(Value::as_str) {
                        dispatch_event(processor.as_ref(), group_id, msg_type, &notification.data).await;
                    }
                }
            }
            notify_event::GROUP_MESSAGE => debug!(group_id, "back-compat group_message event ignored"),
            other => warn!(event = other, "unrecognized notify event, dropping"),
        }
    }

    /// Mark cancelled and wake every pending waiter, then clear the map.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut pending = self.pending.lock();
        for (_, entry) in pending.drain() {
            let _ = entry.tx.send(GroupResponse {
                action: entry.action,
                code: -1,
                error: "client closed".to_string(),
                group_id: entry.group_id,
                data: Value::Null,
                cancelled: true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as AsyncMutex;

    struct RecordingTransport {
        sent: AsyncMutex<Vec<(String, Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl GroupTransport for RecordingTransport {
        async fn send(&self, target_aid: &str, payload: Value) -> Result<(), String> {
            if self.fail {
                return Err("boom".to_string());
            }
            self.sent.lock().await.push((target_aid.to_string(), payload));
            Ok(())
        }
    }

    #[tokio::test]
    async fn request_id_is_monotonic_and_well_formed() {
        let client = GroupClient::new(Arc::new(RecordingTransport { sent: AsyncMutex::new(vec![]), fail: true }));
        let a = client.next_request_id();
        let b = client.next_request_id();
        assert_ne!(a, b);
        assert!(a.starts_with('r'));
        assert_eq!(a.len(), 17);
    }

    #[tokio::test]
    async fn send_failure_removes_pending_and_surfaces_error() {
        let client = GroupClient::new(Arc::new(RecordingTransport { sent: AsyncMutex::new(vec![]), fail: true }));
        let result = client.send_request("bob.aid.pub", "g1", "get_cursor", json!({}), Some(50)).await;
        assert!(matches!(result, Err(GroupClientError::SendFailed(_))));
        assert!(client.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn timeout_removes_pending_entry() {
        let client = GroupClient::new(Arc::new(RecordingTransport { sent: AsyncMutex::new(vec![]), fail: false }));
        let result = client.send_request("bob.aid.pub", "g1", "get_cursor", json!({}), Some(20)).await;
        assert!(matches!(result, Err(GroupClientError::Timeout)));
        assert!(client.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn handle_incoming_completes_matching_request() {
        let client = Arc::new(GroupClient::new(Arc::new(RecordingTransport { sent: AsyncMutex::new(vec![]), fail: false })));
        let client2 = client.clone();
        let handle = tokio::spawn(async move { client2.send_request("bob.aid.pub", "g1", "get_cursor", json!({}), Some(1_000)).await });

        // Allow the request to register before replying.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let request_id = client.pending.lock().keys().next().unwrap().clone();
        client
            .handle_incoming(&json!({"action": "get_cursor", "request_id": request_id, "code": 0, "group_id": "g1", "data": {"msg_cursor": 5}}))
            .await;

        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.data["msg_cursor"], 5);
    }

    #[tokio::test]
    async fn batch_push_sorts_before_dispatch() {
        struct Recorder(AtomicUsize, Mutex<Vec<i64>>);
        #[async_trait]
        impl ACPGroupEventHandler for Recorder {
            async fn on_group_message_batch(&self, _group_id: &str, batch: GroupMessageBatch) {
                self.0.fetch_add(1, Ordering::SeqCst);
                *self.1.lock() = batch.messages.iter().map(|m| m.msg_id).collect();
            }
        }

        let client = GroupClient::new(Arc::new(RecordingTransport { sent: AsyncMutex::new(vec![]), fail: false }));
        let recorder = Arc::new(Recorder(AtomicUsize::new(0), Mutex::new(vec![])));
        client.set_event_handler(recorder.clone());

        client
            .handle_incoming(&json!({
                "action": "message_batch_push",
                "group_id": "g1",
                "data": {
                    "messages": [
                        {"msg_id": 3, "sender": "x", "content": "c", "content_type": "text/plain", "timestamp": 1},
                        {"msg_id": 2, "sender": "y", "content": "b", "content_type": "text/plain", "timestamp": 1},
                    ],
                    "start_msg_id": 2, "latest_msg_id": 3, "count": 2
                }
            }))
            .await;

        assert_eq!(recorder.0.load(Ordering::SeqCst), 1);
        assert_eq!(*recorder.1.lock(), vec![2, 3]);
    }

    #[tokio::test]
    async fn close_wakes_pending_with_cancelled() {
        let client = Arc::new(GroupClient::new(Arc::new(RecordingTransport { sent: AsyncMutex::new(vec![]), fail: false })));
        let client2 = client.clone();
        let handle = tokio::spawn(async move { client2.send_request("bob.aid.pub", "g1", "get_cursor", json!({}), Some(5_000)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.close();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(GroupClientError::Closed)));
    }
}
