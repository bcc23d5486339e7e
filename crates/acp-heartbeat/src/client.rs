//! UDP keep-alive loop, re-auth on 401, and invite forwarding (spec §4.8).
//!
//! The sender and receiver loops run as cooperative tokio tasks rather than
//! OS threads; a `Notify` takes the place of closing the socket to unblock
//! a pending `recv_from` on `offline()`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acp_auth::AuthClient;
use acp_protocol::udp::{decode_udp_frame, encode_udp_frame, UdpMessage};
use acp_transport::{HttpBackend, UdpTransport};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::HeartbeatError;

const SENDER_TICK: Duration = Duration::from_secs(1);
const DEFAULT_INTERVAL_MS: u64 = 5000;
const MIN_INTERVAL_MS: u64 = 5000;
const REAUTH_NEXT_BEAT: u64 = 401;

pub type InviteCallback = Arc<dyn Fn(InviteReceived) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct InviteReceived {
    pub inviter_aid: String,
    pub invite_code: String,
    pub expires_at: i64,
    pub session_id: String,
    pub message_server: String,
}

struct Shared {
    socket: UdpTransport,
    peer_addr: RwLock<SocketAddr>,
    agent_id: String,
    sign_cookie: AtomicU64,
    message_seq: AtomicU64,
    last_send_ms: AtomicU64,
    heartbeat_interval_ms: AtomicU64,
    is_running: AtomicBool,
    is_sending: AtomicBool,
    shutdown: Notify,
    invite_callback: RwLock<Option<InviteCallback>>,
    auth: Arc<AuthClient>,
    http: Arc<dyn HttpBackend>,
}

pub struct HeartbeatClient {
    shared: Arc<Shared>,
    sender_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    receiver_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatClient {
    pub async fn bind(
        bind_addr: SocketAddr,
        agent_id: impl Into<String>,
        auth: Arc<AuthClient>,
        http: Arc<dyn HttpBackend>,
    ) -> Result<Self, HeartbeatError> {
        let socket = UdpTransport::bind(bind_addr)
            .await
            .map_err(|e| HeartbeatError::Bind(e.to_string()))?;

        Ok(Self {
            shared: Arc::new(Shared {
                socket,
                peer_addr: RwLock::new(bind_addr),
                agent_id: agent_id.into(),
                sign_cookie: AtomicU64::new(0),
                message_seq: AtomicU64::new(0),
                last_send_ms: AtomicU64::new(0),
                heartbeat_interval_ms: AtomicU64::new(DEFAULT_INTERVAL_MS),
                is_running: AtomicBool::new(false),
                is_sending: AtomicBool::new(false),
                shutdown: Notify::new(),
                invite_callback: RwLock::new(None),
                auth,
                http,
            }),
            sender_task: parking_lot::Mutex::new(None),
            receiver_task: parking_lot::Mutex::new(None),
        })
    }

    pub fn set_invite_callback(&self, callback: InviteCallback) {
        *self.shared.invite_callback.write() = Some(callback);
    }

    /// Start the sender/receiver loops. Requires a prior successful
    /// `AuthClient::sign_in` so the peer address and sign cookie are known.
    pub fn start(&self, peer_addr: SocketAddr) -> Result<(), HeartbeatError> {
        if self.shared.is_running.swap(true, Ordering::SeqCst) {
            return Err(HeartbeatError::AlreadyRunning);
        }
        let session = self.shared.auth.session();
        let sign_cookie = session
            .sign_cookie
            .ok_or_else(|| HeartbeatError::NotSignedIn(self.shared.agent_id.clone()))?;

        *self.shared.peer_addr.write() = peer_addr;
        self.shared.sign_cookie.store(sign_cookie, Ordering::SeqCst);
        self.shared.is_sending.store(true, Ordering::SeqCst);

        *self.sender_task.lock() = Some(tokio::spawn(sender_loop(self.shared.clone())));
        *self.receiver_task.lock() = Some(tokio::spawn(receiver_loop(self.shared.clone())));
        Ok(())
    }

    /// Stop both loops and close the socket's reader. Joins both tasks
    /// before returning, mirroring the thread-join semantics of §4.8.
    pub async fn offline(&self) {
        self.shared.is_sending.store(false, Ordering::SeqCst);
        self.shared.is_running.store(false, Ordering::SeqCst);
        self.shared.shutdown.notify_waiters();

        if let Some(handle) = self.sender_task.lock().take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.receiver_task.lock().take() {
            let _ = handle.await;
        }
    }

    #[must_use]
    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.shared.heartbeat_interval_ms.load(Ordering::SeqCst)
    }
}

async fn sender_loop(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(SENDER_TICK);
    loop {
        tokio::select! {
            _ = shared.shutdown.notified() => break,
            _ = ticker.tick() => {
                if !shared.is_sending.load(Ordering::SeqCst) {
                    break;
                }
                let interval = shared.heartbeat_interval_ms.load(Ordering::SeqCst);
                let now = now_ms();
                let last = shared.last_send_ms.load(Ordering::SeqCst);
                if now.saturating_sub(last) < interval {
                    continue;
                }
                let seq = shared.message_seq.fetch_add(1, Ordering::SeqCst);
                let msg = UdpMessage::HeartbeatReq {
                    agent_id: shared.agent_id.clone(),
                    sign_cookie: shared.sign_cookie.load(Ordering::SeqCst),
                };
                let frame = encode_udp_frame(&msg, 0, seq);
                let peer = *shared.peer_addr.read();
                if let Err(e) = shared.socket.send_to(&frame, peer).await {
                    warn!(error = %e, "heartbeat send failed");
                } else {
                    shared.last_send_ms.store(now, Ordering::SeqCst);
                }
            }
        }
    }
}

async fn receiver_loop(shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shared.shutdown.notified() => break,
            result = shared.socket.recv_from() => {
                let Ok((buf, _from)) = result else { break };
                let Ok((_, _, msg)) = decode_udp_frame(&buf) else { continue };
                handle_inbound(&shared, msg).await;
            }
        }
    }
}

async fn handle_inbound(shared: &Arc<Shared>, msg: UdpMessage) {
    match msg {
        UdpMessage::HeartbeatResp { next_beat_ms } => {
            if next_beat_ms == REAUTH_NEXT_BEAT {
                info!(agent_id = %shared.agent_id, "heartbeat server requested re-auth");
                match shared.auth.sign_in(shared.http.as_ref(), &shared.agent_id).await {
                    Ok(session) => {
                        if let Some(cookie) = session.sign_cookie {
                            shared.sign_cookie.store(cookie, Ordering::SeqCst);
                        }
                    }
                    Err(e) => warn!(error = %e, "re-auth after 401 failed"),
                }
            } else {
                shared
                    .heartbeat_interval_ms
                    .store(clamp_interval(next_beat_ms), Ordering::SeqCst);
            }
        }
        UdpMessage::InviteReq { inviter_aid, invite_code, expires_at, session_id, message_server } => {
            debug!(session_id = %session_id, inviter = %inviter_aid, "invite received over heartbeat channel");
            if let Some(cb) = shared.invite_callback.read().clone() {
                cb(InviteReceived {
                    inviter_aid: inviter_aid.clone(),
                    invite_code,
                    expires_at,
                    session_id: session_id.clone(),
                    message_server,
                });
            }
            let resp = UdpMessage::InviteResp {
                agent_id: shared.agent_id.clone(),
                inviter_agent_id: inviter_aid,
                session_id,
                sign_cookie: shared.sign_cookie.load(Ordering::SeqCst),
            };
            let seq = shared.message_seq.fetch_add(1, Ordering::SeqCst);
            let frame = encode_udp_frame(&resp, 0, seq);
            let peer = *shared.peer_addr.read();
            if let Err(e) = shared.socket.send_to(&frame, peer).await {
                warn!(error = %e, "invite_resp send failed");
            }
        }
        other => {
            debug!(message_type = other.message_type(), "ignoring unexpected heartbeat message");
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Server-supplied intervals are clamped to at least [`MIN_INTERVAL_MS`]
/// (spec §4.8 "clamped to ≥ 5000 ms after a server update").
fn clamp_interval(next_beat_ms: u64) -> u64 {
    next_beat_ms.max(MIN_INTERVAL_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_interval_below_the_floor_is_clamped() {
        assert_eq!(clamp_interval(1000), MIN_INTERVAL_MS);
        assert_eq!(clamp_interval(7000), 7000);
    }

    #[tokio::test]
    async fn bind_succeeds_on_an_ephemeral_port() {
        let socket = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert!(socket.local_addr().unwrap().port() > 0);
    }
}

