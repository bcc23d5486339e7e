//! Peer-to-peer session lifecycle over a [`MessageClient`] (spec §4.10):
//! create/invite/join/leave/close/eject, member lists, and message sends.
//!
//! Only `create_session` and `invite_agent` have a defined `_ack` verb
//! (spec §4.9's command list); `join_session_req`/`leave_session_req`/
//! `close_session_req`/`eject_agent_req` are fire-and-forget sends that
//! update local state optimistically, matching the verbs the spec actually
//! names. `get_member_list` is a request that the server is expected to
//! echo back with the same `cmd`, so it goes through `send_and_wait_ack`
//! with `expected_cmd` equal to the request's own `cmd`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use acp_protocol::envelope::{cmd, Envelope};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SessionError;
use crate::message_client::MessageClient;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn envelope_value(cmd: &str, data: Value) -> Value {
    serde_json::to_value(Envelope::new(cmd, data)).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub agent_id: String,
    pub role: Role,
}

pub struct Session {
    pub session_id: String,
    members: RwLock<Vec<Member>>,
    created_at: i64,
    updated_at: AtomicI64,
    closed: AtomicBool,
    last_msg_id: AtomicI64,
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub members: Vec<Member>,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed: bool,
}

impl Session {
    fn new(session_id: String, members: Vec<Member>, now_ms: i64) -> Self {
        Self {
            session_id,
            members: RwLock::new(members),
            created_at: now_ms,
            updated_at: AtomicI64::new(now_ms),
            closed: AtomicBool::new(false),
            last_msg_id: AtomicI64::new(0),
        }
    }

    fn touch(&self) {
        self.updated_at.store(now_ms(), Ordering::SeqCst);
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            members: self.members.read().clone(),
            created_at: self.created_at,
            updated_at: self.updated_at.load(Ordering::SeqCst),
            closed: self.closed.load(Ordering::SeqCst),
        }
    }
}

/// Owns every P2P [`Session`] created by its `AgentID` (spec §3.5).
pub struct SessionManager {
    client: Arc<MessageClient>,
    self_agent_id: String,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    invalidated: Arc<AtomicBool>,
    timeout_ms: u64,
}

impl SessionManager {
    #[must_use]
    pub fn new(client: Arc<MessageClient>, self_agent_id: impl Into<String>, invalidated: Arc<AtomicBool>) -> Self {
        Self {
            client,
            self_agent_id: self_agent_id.into(),
            sessions: RwLock::new(HashMap::new()),
            invalidated,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    fn check_alive(&self) -> Result<(), SessionError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(SessionError::AidInvalid);
        }
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    fn check_open(&self, session_id: &str) -> Result<Arc<Session>, SessionError> {
        let session = self.get_session(session_id)?;
        if session.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed(session_id.to_string()));
        }
        Ok(session)
    }

    /// Issue `create_session_req`, await `create_session_ack`, and register
    /// the resulting session with `{self} ∪ members` (self as owner, others
    /// as members, duplicates collapsed).
    pub async fn create_session(&self, members: &[String]) -> Result<String, SessionError> {
        self.check_alive()?;
        let request_id = Uuid::new_v4().simple().to_string();
        let data = json!({ "request_id": request_id, "members": members });

        let ack = self
            .client
            .send_and_wait_ack(envelope_value(cmd::CREATE_SESSION_REQ, data), cmd::CREATE_SESSION_ACK, &request_id, self.timeout_ms)
            .await
            .ok_or(SessionError::Timeout)?;

        let session_id = ack
            .get("session_id")
            .and_then(Value::as_str)
            .ok_or(SessionError::SendFailed)?
            .to_string();

        let mut roster = vec![Member { agent_id: self.self_agent_id.clone(), role: Role::Owner }];
        for m in members {
            if m != &self.self_agent_id && !roster.iter().any(|existing| &existing.agent_id == m) {
                roster.push(Member { agent_id: m.clone(), role: Role::Member });
            }
        }

        let session = Arc::new(Session::new(session_id.clone(), roster, now_ms()));
        self.sessions.write().insert(session_id.clone(), session);
        info!(session_id = %session_id, "session created");
        Ok(session_id)
    }

    pub async fn invite_agent(&self, session_id: &str, agent_id: &str) -> Result<(), SessionError> {
        self.check_alive()?;
        let session = self.check_open(session_id)?;
        let request_id = Uuid::new_v4().simple().to_string();
        let data = json!({ "request_id": request_id, "session_id": session_id, "agent_id": agent_id });

        self.client
            .send_and_wait_ack(envelope_value(cmd::INVITE_AGENT_REQ, data), cmd::INVITE_AGENT_ACK, &request_id, self.timeout_ms)
            .await
            .ok_or(SessionError::Timeout)?;

        let mut members = session.members.write();
        if !members.iter().any(|m| m.agent_id == agent_id) {
            members.push(Member { agent_id: agent_id.to_string(), role: Role::Member });
        }
        drop(members);
        session.touch();
        Ok(())
    }

    pub fn join_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.check_alive()?;
        let data = json!({ "session_id": session_id, "agent_id": self.self_agent_id });
        if !self.client.send(envelope_value(cmd::JOIN_SESSION_REQ, data)) {
            return Err(SessionError::SendFailed);
        }
        Ok(())
    }

    pub fn leave_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.check_alive()?;
        let session = self.check_open(session_id)?;
        let data = json!({ "session_id": session_id, "agent_id": self.self_agent_id });
        if !self.client.send(envelope_value(cmd::LEAVE_SESSION_REQ, data)) {
            return Err(SessionError::SendFailed);
        }
        session.members.write().retain(|m| m.agent_id != self.self_agent_id);
        session.touch();
        Ok(())
    }

    pub fn close_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.check_alive()?;
        let session = self.check_open(session_id)?;
        let data = json!({ "session_id": session_id });
        if !self.client.send(envelope_value(cmd::CLOSE_SESSION_REQ, data)) {
            return Err(SessionError::SendFailed);
        }
        session.closed.store(true, Ordering::SeqCst);
        session.touch();
        Ok(())
    }

    /// Ejecting an agent that is not a member is a no-op success (spec §4.10).
    pub fn eject_agent(&self, session_id: &str, agent_id: &str) -> Result<(), SessionError> {
        self.check_alive()?;
        let session = self.check_open(session_id)?;
        let data = json!({ "session_id": session_id, "agent_id": agent_id });
        if !self.client.send(envelope_value(cmd::EJECT_AGENT_REQ, data)) {
            return Err(SessionError::SendFailed);
        }
        session.members.write().retain(|m| m.agent_id != agent_id);
        session.touch();
        Ok(())
    }

    pub async fn get_member_list(&self, session_id: &str) -> Result<Vec<Member>, SessionError> {
        self.check_alive()?;
        let session = self.get_session(session_id)?;
        let request_id = Uuid::new_v4().simple().to_string();
        let data = json!({ "request_id": request_id, "session_id": session_id });

        match self
            .client
            .send_and_wait_ack(envelope_value(cmd::GET_MEMBER_LIST, data), cmd::GET_MEMBER_LIST, &request_id, self.timeout_ms)
            .await
        {
            Some(resp) => Ok(parse_member_list(&resp)),
            None => {
                debug!(session_id, "get_member_list falling back to local roster");
                Ok(session.members.read().clone())
            }
        }
    }

    #[must_use]
    pub fn get_active_sessions(&self) -> Vec<String> {
        self.sessions
            .read()
            .values()
            .filter(|s| !s.closed.load(Ordering::SeqCst))
            .map(|s| s.session_id.clone())
            .collect()
    }

    pub fn get_session_info(&self, session_id: &str) -> Result<SessionInfo, SessionError> {
        self.check_alive()?;
        Ok(self.get_session(session_id)?.info())
    }

    /// Serialize `blocks` as a URL-encoded JSON array inside
    /// `session_message.message`, with a millisecond-epoch timestamp
    /// (spec §4.10).
    pub fn send_message(&self, session_id: &str, blocks: &[Value]) -> Result<(), SessionError> {
        self.check_alive()?;
        let session = self.check_open(session_id)?;
        let encoded = acp_codec::url_encode(&serde_json::to_string(blocks).unwrap_or_default());
        let data = json!({
            "session_id": session_id,
            "sender": self.self_agent_id,
            "message": encoded,
            "timestamp": now_ms(),
        });
        if !self.client.send(envelope_value(cmd::SESSION_MESSAGE, data)) {
            return Err(SessionError::SendFailed);
        }
        session.last_msg_id.fetch_add(1, Ordering::SeqCst);
        session.touch();
        Ok(())
    }
}

fn parse_member_list(data: &Value) -> Vec<Member> {
    data.get("members")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|m| {
                    let agent_id = m.get("agent_id")?.as_str()?.to_string();
                    let role = match m.get("role").and_then(Value::as_str) {
                        Some("owner") => Role::Owner,
                        _ => Role::Member,
                    };
                    Some(Member { agent_id, role })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_list_parses_roles() {
        let data = json!({"members": [
            {"agent_id": "alice.aid.pub", "role": "owner"},
            {"agent_id": "bob.aid.pub", "role": "member"},
        ]});
        let members = parse_member_list(&data);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].role, Role::Owner);
        assert_eq!(members[1].role, Role::Member);
    }
}
