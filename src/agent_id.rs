//! An online (or about-to-be-online) identity (spec §4.14, §3.5): owns its
//! `AuthClient`, `HeartbeatClient`, `MessageClient`, `SessionManager`,
//! `GroupClient` and `GroupOperations` exclusively, and drives the
//! `AgentState` machine that fires on every transition.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acp_auth::AuthClient;
use acp_group::{CursorStore, GroupClient, GroupOperations, GroupTransport};
use acp_heartbeat::{HeartbeatClient, InviteCallback, InviteReceived};
use acp_session::{ConnectionState, MessageClient, SessionManager, WsConfig};
use acp_transport::HttpBackend;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, ErrorCode, Result};
use crate::group_transport::MessageClientGroupTransport;

/// `AgentState` machine (spec §4.14, §3.4): every transition goes through
/// [`AgentID::set_state`], which fires the registered handler with
/// `(old, new)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Offline,
    Connecting,
    Authenticating,
    Online,
    Reconnecting,
    Error,
}

pub type StateChangeHandler = Arc<dyn Fn(AgentState, AgentState) + Send + Sync>;

/// Dispatches a raw `(cmd, data)` envelope the session WebSocket delivered
/// that wasn't an ack match and wasn't routed to the group client — mirrors
/// `acp_session::MessageHandler`'s shape one layer up (spec §6.3
/// `message_handler(msg)`).
pub type MessageHandler = Arc<dyn Fn(String, Value) + Send + Sync>;

const WATCHDOG_TICK: Duration = Duration::from_millis(500);

struct Shared {
    aid: String,
    invalidated: Arc<AtomicBool>,
    state: Mutex<AgentState>,
    state_handler: RwLock<Option<StateChangeHandler>>,
    message_handler: RwLock<Option<MessageHandler>>,
    invite_handler: RwLock<Option<InviteCallback>>,
    http: Arc<dyn HttpBackend>,
    auth: Arc<AuthClient>,
    message_client: Arc<MessageClient>,
    session_manager: Arc<SessionManager>,
    group_client: Arc<GroupClient>,
    group_operations: Arc<GroupOperations>,
    heartbeat: Mutex<Option<Arc<HeartbeatClient>>>,
}

/// An identity composed of its own C7–C12 subsystems (spec §3.5). Always
/// held behind an `Arc` — `online`/`offline` spawn background tasks that
/// need their own handle to the agent.
pub struct AgentID(Arc<Shared>);

impl AgentID {
    pub(crate) fn new(
        aid: String,
        http: Arc<dyn HttpBackend>,
        key_pem: String,
        cert_pem: String,
        ap_base: String,
        cursor_store: Arc<dyn CursorStore>,
    ) -> Arc<Self> {
        let session_url = format!("{}/session?agent_id={}", ap_base.trim_end_matches('/'), aid);
        let message_client = Arc::new(MessageClient::new(session_url, WsConfig::default()));
        let invalidated = Arc::new(AtomicBool::new(false));
        let session_manager = Arc::new(SessionManager::new(message_client.clone(), aid.clone(), invalidated.clone()));

        let group_transport: Arc<dyn GroupTransport> = Arc::new(MessageClientGroupTransport::new(message_client.clone()));
        let group_client = Arc::new(GroupClient::new(group_transport));
        let group_operations = Arc::new(GroupOperations::new(group_client.clone(), cursor_store));

        let auth = Arc::new(AuthClient::new(ap_base, key_pem, cert_pem));

        let shared = Arc::new(Shared {
            aid,
            invalidated,
            state: Mutex::new(AgentState::Offline),
            state_handler: RwLock::new(None),
            message_handler: RwLock::new(None),
            invite_handler: RwLock::new(None),
            http,
            auth,
            message_client,
            session_manager,
            group_client,
            group_operations,
            heartbeat: Mutex::new(None),
        });

        let dispatch_target = shared.clone();
        shared.message_client.set_message_handler(Arc::new(move |cmd, data| {
            dispatch_inbound(&dispatch_target, cmd, data);
        }));

        Arc::new(Self(shared))
    }

    #[must_use]
    pub fn get_aid(&self) -> &str {
        &self.0.aid
    }

    #[must_use]
    pub fn state(&self) -> AgentState {
        *self.0.state.lock()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.invalidated.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.is_valid() && self.state() == AgentState::Online
    }

    pub fn set_state_change_handler(&self, handler: StateChangeHandler) {
        *self.0.state_handler.write() = Some(handler);
    }

    /// `message_handler(cmd, data)` for every inbound envelope that is not
    /// an ack match and not a `cmd::GROUP` frame (spec §6.3).
    pub fn set_message_handler(&self, handler: MessageHandler) {
        *self.0.message_handler.write() = Some(handler);
    }

    /// `invite_handler(session_id, inviter)` forwarded from the heartbeat
    /// channel's `INVITE_REQ` (spec §6.3).
    pub fn set_invite_handler(&self, handler: Arc<dyn Fn(InviteReceived) + Send + Sync>) {
        *self.0.invite_handler.write() = Some(handler);
    }

    pub fn session_manager(&self) -> Result<Arc<SessionManager>> {
        self.check_alive()?;
        Ok(self.0.session_manager.clone())
    }

    pub fn group_operations(&self) -> Result<Arc<GroupOperations>> {
        self.check_alive()?;
        Ok(self.0.group_operations.clone())
    }

    pub fn group_client(&self) -> Result<Arc<GroupClient>> {
        self.check_alive()?;
        Ok(self.0.group_client.clone())
    }

    fn check_alive(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::new(ErrorCode::AidInvalid, format!("AgentID {} has been invalidated", self.0.aid)));
        }
        Ok(())
    }

    fn set_state(&self, new: AgentState) {
        let old = {
            let mut state = self.0.state.lock();
            let old = *state;
            *state = new;
            old
        };
        if old != new {
            info!(aid = %self.0.aid, ?old, ?new, "agent state transition");
            if let Some(handler) = self.0.state_handler.read().clone() {
                handler(old, new);
            }
        }
    }

    /// `Offline|Error → Connecting → Authenticating → Online` (spec §4.14).
    /// A second call while already `Connecting`/`Authenticating`/`Online`/
    /// `Reconnecting` returns `INVALID_ARGUMENT` rather than erroring as
    /// `AID_INVALID` or silently succeeding (spec §9 Open Questions, F.2).
    pub async fn online(self: &Arc<Self>) -> Result<()> {
        self.check_alive()?;
        {
            let state = *self.0.state.lock();
            if state != AgentState::Offline && state != AgentState::Error {
                return Err(Error::new(ErrorCode::InvalidArgument, "AgentID is already online or connecting"));
            }
        }
        self.set_state(AgentState::Connecting);
        self.set_state(AgentState::Authenticating);

        let session = match self.0.auth.sign_in(self.0.http.as_ref(), &self.0.aid).await {
            Ok(session) => session,
            Err(e) => {
                self.set_state(AgentState::Error);
                return Err(Error::new(ErrorCode::AuthFailed, e.to_string()));
            }
        };

        let server_ip = session.server_ip.clone().unwrap_or_default();
        let port = session.port.unwrap_or(0);
        let peer_addr: SocketAddr = match format!("{server_ip}:{port}").parse() {
            Ok(addr) => addr,
            Err(e) => {
                self.set_state(AgentState::Error);
                return Err(Error::new(ErrorCode::NetworkError, format!("invalid heartbeat peer address: {e}")));
            }
        };

        let heartbeat = match HeartbeatClient::bind(
            "0.0.0.0:0".parse().unwrap(),
            self.0.aid.clone(),
            self.0.auth.clone(),
            self.0.http.clone(),
        )
        .await
        {
            Ok(hb) => Arc::new(hb),
            Err(e) => {
                self.set_state(AgentState::Error);
                return Err(Error::new(ErrorCode::HbAuthFailed, e.to_string()));
            }
        };

        let invite_target = self.0.clone();
        heartbeat.set_invite_callback(Arc::new(move |invite: InviteReceived| {
            if let Some(handler) = invite_target.invite_handler.read().clone() {
                handler(invite);
            }
        }));

        if let Err(e) = heartbeat.start(peer_addr) {
            self.set_state(AgentState::Error);
            return Err(Error::new(ErrorCode::HbAuthFailed, e.to_string()));
        }
        *self.0.heartbeat.lock() = Some(heartbeat);

        if let Err(e) = self.0.message_client.connect().await {
            self.set_state(AgentState::Error);
            if let Some(heartbeat) = self.0.heartbeat.lock().take() {
                heartbeat.offline().await;
            }
            return Err(Error::new(ErrorCode::WsConnectFailed, e.to_string()));
        }

        self.set_state(AgentState::Online);
        self.spawn_state_watchdog();
        Ok(())
    }

    /// Mirrors `MessageClient`'s connection state into `Online ⇄
    /// Reconnecting` while this agent is online (spec §4.14 "`Online →
    /// Reconnecting` on WS/UDP loss; `Reconnecting → Online` on recovery").
    fn spawn_state_watchdog(self: &Arc<Self>) {
        let agent = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(WATCHDOG_TICK).await;
                if !agent.is_valid() {
                    break;
                }
                let current = agent.state();
                if current != AgentState::Online && current != AgentState::Reconnecting {
                    break;
                }
                match (current, agent.0.message_client.state()) {
                    (AgentState::Online, ConnectionState::Reconnecting | ConnectionState::Disconnected) => {
                        agent.set_state(AgentState::Reconnecting);
                    }
                    (AgentState::Reconnecting, ConnectionState::Connected) => {
                        agent.set_state(AgentState::Online);
                    }
                    _ => {}
                }
            }
        });
    }

    /// Idempotent from any state, including `Offline` (spec §9 F.2): tears
    /// down the heartbeat loop, the session WebSocket, and the group
    /// client's pending requests in reverse creation order (spec §3.5).
    pub async fn offline(self: &Arc<Self>) {
        if let Some(heartbeat) = self.0.heartbeat.lock().take() {
            heartbeat.offline().await;
        }
        self.0.message_client.shutdown().await;
        self.0.group_client.close();
        self.set_state(AgentState::Offline);
    }

    /// Marks this handle permanently invalid; every subsequent call through
    /// it (or a session/group call already in flight) surfaces `AID_INVALID`
    /// (spec §8 testable properties).
    pub(crate) fn invalidate(&self) {
        self.0.invalidated.store(true, Ordering::SeqCst);
    }
}

fn dispatch_inbound(shared: &Arc<Shared>, cmd: &str, data: Value) {
    if cmd == acp_protocol::envelope::cmd::GROUP {
        let group_client = shared.group_client.clone();
        tokio::spawn(async move {
            group_client.handle_incoming(&data).await;
        });
        return;
    }
    if let Some(handler) = shared.message_handler.read().clone() {
        handler(cmd.to_string(), data);
    } else {
        warn!(aid = %shared.aid, cmd, "no message handler registered, dropping envelope");
    }
}
