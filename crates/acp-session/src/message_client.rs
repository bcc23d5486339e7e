//! WebSocket session channel (spec §4.9): a single connection to
//! `<base>/session?agent_id=...&signature=...` carrying JSON `{cmd, data}`
//! envelopes, with explicit ack correlation and an auto-reconnect loop.
//!
//! The connection/state lock, the send queue, and the ack-waiter map are
//! three separate `parking_lot` locks (spec §5); the waiter map is never
//! held while a callback runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acp_protocol::envelope::Envelope;
use acp_transport::{WsClient, WsConfig, WsEvent};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::MessageClientError;

const RECONNECT_BASE_INTERVAL: Duration = Duration::from_millis(500);
const RECONNECT_MAX_INTERVAL: Duration = Duration::from_secs(10);
const RECONNECT_BACKOFF_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

pub type MessageHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;
pub type ReconnectHandler = Arc<dyn Fn() + Send + Sync>;

struct Waiter {
    expected_cmd: String,
    tx: oneshot::Sender<Option<Value>>,
}

struct Shared {
    base_http_url: String,
    ws_config: WsConfig,
    state: RwLock<ConnectionState>,
    ws: RwLock<Option<WsClient>>,
    send_queue: Mutex<VecDeque<Value>>,
    waiters: Mutex<HashMap<String, Waiter>>,
    shutdown_requested: AtomicBool,
    reconnect_loop_running: AtomicBool,
    reconnect_interval: Mutex<Duration>,
    message_handler: RwLock<Option<MessageHandler>>,
    reconnect_handler: RwLock<Option<ReconnectHandler>>,
    shutdown_notify: Notify,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

/// WebSocket session client: `cmd`/`data` envelopes over a single connection
/// to an Access Point, with best-effort reconnection (spec §4.9).
pub struct MessageClient {
    shared: Arc<Shared>,
}

impl MessageClient {
    /// `base_http_url` is the `http(s)://` session endpoint, e.g.
    /// `https://ap.example/session?agent_id=alice.aid.pub&signature=...`;
    /// it is rewritten to `ws(s)://` on connect (spec §4.9).
    #[must_use]
    pub fn new(base_http_url: impl Into<String>, ws_config: WsConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                base_http_url: base_http_url.into(),
                ws_config,
                state: RwLock::new(ConnectionState::Disconnected),
                ws: RwLock::new(None),
                send_queue: Mutex::new(VecDeque::new()),
                waiters: Mutex::new(HashMap::new()),
                shutdown_requested: AtomicBool::new(false),
                reconnect_loop_running: AtomicBool::new(false),
                reconnect_interval: Mutex::new(RECONNECT_BASE_INTERVAL),
                message_handler: RwLock::new(None),
                reconnect_handler: RwLock::new(None),
                shutdown_notify: Notify::new(),
                reader_task: Mutex::new(None),
                reconnect_task: Mutex::new(None),
            }),
        }
    }

    pub fn set_message_handler(&self, handler: MessageHandler) {
        *self.shared.message_handler.write() = Some(handler);
    }

    pub fn set_reconnect_handler(&self, handler: ReconnectHandler) {
        *self.shared.reconnect_handler.write() = Some(handler);
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub async fn connect(&self) -> Result<(), MessageClientError> {
        self.shared.shutdown_requested.store(false, Ordering::SeqCst);
        *self.shared.reconnect_interval.lock() = RECONNECT_BASE_INTERVAL;
        *self.shared.state.write() = ConnectionState::Connecting;
        let handle = open_socket(&self.shared).await?;
        *self.shared.reader_task.lock() = Some(handle);
        Ok(())
    }

    /// Non-blocking: succeeds iff currently `Connected`; never queues
    /// (spec §4.9). Callers that want delivery across a reconnect should
    /// use [`Self::queue_send`] instead.
    #[must_use]
    pub fn send(&self, envelope: Value) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        let Ok(text) = serde_json::to_string(&envelope) else { return false };
        match self.shared.ws.read().as_ref() {
            Some(client) => client.send_text(text).is_ok(),
            None => false,
        }
    }

    /// Explicit buffered enqueue: delivered immediately if connected,
    /// otherwise held in the send queue and flushed on the next successful
    /// reconnect (spec §4.9's "queueing is explicit via the buffered queue").
    pub fn queue_send(&self, envelope: Value) {
        if self.send(envelope.clone()) {
            return;
        }
        self.shared.send_queue.lock().push_back(envelope);
    }

    /// Register a waiter on `request_id`, send the envelope, and block until
    /// a matching `(cmd, request_id)` response arrives or `timeout_ms`
    /// elapses.
    pub async fn send_and_wait_ack(
        &self,
        envelope: Value,
        expected_cmd: &str,
        request_id: &str,
        timeout_ms: u64,
    ) -> Option<Value> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .waiters
            .lock()
            .insert(request_id.to_string(), Waiter { expected_cmd: expected_cmd.to_string(), tx });

        if !self.send(envelope) {
            self.shared.waiters.lock().remove(request_id);
            return None;
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) | Err(_) => {
                self.shared.waiters.lock().remove(request_id);
                None
            }
        }
    }

    /// Set `shutdown_requested`, close the socket, wake every waiter with
    /// `None`, and join the reader/reconnect tasks (spec §4.9).
    pub async fn shutdown(&self) {
        self.shared.shutdown_requested.store(true, Ordering::SeqCst);
        self.shared.shutdown_notify.notify_waiters();
        if let Some(ws) = self.shared.ws.read().as_ref() {
            let _ = ws.close();
        }
        *self.shared.state.write() = ConnectionState::Disconnected;

        for (_, waiter) in self.shared.waiters.lock().drain() {
            let _ = waiter.tx.send(None);
        }

        let reader_handle = self.shared.reader_task.lock().take();
        if let Some(handle) = reader_handle {
            let _ = handle.await;
        }
        let reconnect_handle = self.shared.reconnect_task.lock().take();
        if let Some(handle) = reconnect_handle {
            let _ = handle.await;
        }
    }
}

fn ws_url(base_http_url: &str) -> String {
    if let Some(rest) = base_http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_http_url.to_string()
    }
}

async fn open_socket(shared: &Arc<Shared>) -> Result<JoinHandle<()>, MessageClientError> {
    let url = ws_url(&shared.base_http_url);
    let (client, events) = WsClient::connect(&url, shared.ws_config.clone())
        .await
        .map_err(|e| MessageClientError::Connect(e.to_string()))?;
    *shared.ws.write() = Some(client);
    Ok(tokio::spawn(reader_loop(shared.clone(), events)))
}

async fn reader_loop(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<WsEvent>) {
    loop {
        tokio::select! {
            _ = shared.shutdown_notify.notified() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    spawn_reconnect_if_needed(&shared);
                    break;
                };
                match event {
                    WsEvent::Open => {
                        *shared.state.write() = ConnectionState::Connected;
                        info!("session websocket connected");
                        flush_send_queue(&shared);
                        if let Some(cb) = shared.reconnect_handler.read().clone() {
                            cb();
                        }
                    }
                    WsEvent::Text(text) => handle_inbound_text(&shared, &text),
                    WsEvent::Binary(_data) => {
                        debug!("binary stream frame received on session channel");
                    }
                    WsEvent::Close { code, reason } => {
                        warn!(code, reason = %reason, "session websocket closed");
                        spawn_reconnect_if_needed(&shared);
                        break;
                    }
                    WsEvent::Error(err) => {
                        warn!(error = %err, "session websocket error");
                        spawn_reconnect_if_needed(&shared);
                        break;
                    }
                }
            }
        }
    }
}

fn handle_inbound_text(shared: &Arc<Shared>, text: &str) {
    let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
        debug!("dropping unparseable session frame");
        return;
    };

    let matched = envelope.request_id().and_then(|request_id| {
        let mut waiters = shared.waiters.lock();
        if waiters.get(request_id).is_some_and(|w| w.expected_cmd == envelope.cmd) {
            waiters.remove(request_id)
        } else {
            None
        }
    });

    if let Some(waiter) = matched {
        let _ = waiter.tx.send(Some(envelope.data));
        return;
    }

    if let Some(handler) = shared.message_handler.read().clone() {
        handler(&envelope.cmd, envelope.data);
    }
}

fn flush_send_queue(shared: &Arc<Shared>) {
    let mut queue = shared.send_queue.lock();
    let ws = shared.ws.read();
    let Some(client) = ws.as_ref() else { return };
    while let Some(pending) = queue.pop_front() {
        if let Ok(text) = serde_json::to_string(&pending) {
            let _ = client.send_text(text);
        }
    }
}

/// CAS guard so at most one reconnect loop is ever live (spec §4.9, §9).
fn spawn_reconnect_if_needed(shared: &Arc<Shared>) {
    if shared.shutdown_requested.load(Ordering::SeqCst) {
        return;
    }
    if shared.reconnect_loop_running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
        return;
    }
    *shared.state.write() = ConnectionState::Reconnecting;
    let task_shared = shared.clone();
    let handle = tokio::spawn(async move {
        reconnect_loop(task_shared).await;
    });
    *shared.reconnect_task.lock() = Some(handle);
}

async fn reconnect_loop(shared: Arc<Shared>) {
    loop {
        if shared.shutdown_requested.load(Ordering::SeqCst) {
            break;
        }
        let interval = *shared.reconnect_interval.lock();
        tokio::select! {
            _ = shared.shutdown_notify.notified() => break,
            () = tokio::time::sleep(interval) => {}
        }
        if shared.shutdown_requested.load(Ordering::SeqCst) {
            break;
        }

        match open_socket(&shared).await {
            Ok(handle) => {
                *shared.reader_task.lock() = Some(handle);
                *shared.reconnect_interval.lock() = RECONNECT_BASE_INTERVAL;
                info!("session websocket reconnected");
                break;
            }
            Err(e) => {
                warn!(error = %e, "reconnect attempt failed");
                let mut backoff = shared.reconnect_interval.lock();
                let next_ms = (backoff.as_secs_f64() * RECONNECT_BACKOFF_FACTOR * 1000.0) as u64;
                *backoff = Duration::from_millis(next_ms).min(RECONNECT_MAX_INTERVAL);
            }
        }
    }
    shared.reconnect_loop_running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_to_ws_rewrite() {
        assert_eq!(ws_url("https://ap.example/session"), "wss://ap.example/session");
        assert_eq!(ws_url("http://ap.example/session"), "ws://ap.example/session");
    }

    #[tokio::test]
    async fn send_fails_when_not_connected() {
        let client = MessageClient::new("https://ap.example/session", WsConfig::default());
        assert!(!client.send(serde_json::json!({"cmd": "x"})));
    }

    #[tokio::test]
    async fn send_and_wait_ack_returns_none_on_send_failure() {
        let client = MessageClient::new("https://ap.example/session", WsConfig::default());
        let result = client.send_and_wait_ack(serde_json::json!({}), "ack", "r1", 50).await;
        assert!(result.is_none());
        assert!(client.shared.waiters.lock().is_empty());
    }
}
