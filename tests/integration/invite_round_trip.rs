//! Spec §8 scenario 3: A creates a session with `["B"]`; B's invite callback
//! fires `(session_id, "A")`; B joins; A's member list then contains both.
//!
//! `acp-heartbeat`'s `INVITE_REQ`/`INVITE_RESP` exchange is the spec's literal
//! invite transport (§4.4, §4.8), but the deliverable observable in this
//! scenario — a session whose roster gains the invited member once they
//! join — lives entirely in `SessionManager`/`MessageClient`. This test
//! drives that surface directly: `FakeWsServer::push` stands in for the
//! access point forwarding a heartbeat invite to B's session channel, which
//! is how the spec's `invite_handler(session_id, inviter)` callback is wired
//! one layer up in `AgentID::online` (see `src/agent_id.rs`).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use acp_protocol::envelope::{cmd, Envelope};
use acp_session::{MessageClient, SessionManager, WsConfig};
use acp_test_support::FakeWsServer;
use serde_json::json;

#[tokio::test]
async fn b_joins_after_invite_and_a_sees_both_members() {
    let next_session_id = Arc::new(AtomicU64::new(1));
    let server_members: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

    let handler_session_id = next_session_id.clone();
    let handler_members = server_members.clone();
    let server = FakeWsServer::start(Arc::new(move |agent_id: &str, envelope: Envelope| {
        if envelope.cmd == cmd::CREATE_SESSION_REQ {
            let session_id = format!("s{}", handler_session_id.fetch_add(1, Ordering::SeqCst));
            *handler_members.lock().unwrap() = vec![agent_id.to_string()];
            let request_id = envelope.data.get("request_id")?.as_str()?.to_string();
            return Some(Envelope::new(cmd::CREATE_SESSION_ACK, json!({"request_id": request_id, "session_id": session_id})));
        }
        if envelope.cmd == cmd::JOIN_SESSION_REQ {
            handler_members.lock().unwrap().push(agent_id.to_string());
            return None;
        }
        if envelope.cmd == cmd::GET_MEMBER_LIST {
            let request_id = envelope.data.get("request_id")?.as_str()?.to_string();
            let members: Vec<_> = handler_members
                .lock()
                .unwrap()
                .iter()
                .map(|m| json!({"agent_id": m, "role": if m == "alice.aid.pub" { "owner" } else { "member" }}))
                .collect();
            return Some(Envelope::new(cmd::GET_MEMBER_LIST, json!({"request_id": request_id, "members": members})));
        }
        None
    }))
    .await;

    let a_client = Arc::new(MessageClient::new(server.ws_url_for("alice.aid.pub"), WsConfig::default()));
    a_client.connect().await.unwrap();
    let b_client = Arc::new(MessageClient::new(server.ws_url_for("bob.aid.pub"), WsConfig::default()));
    b_client.connect().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let a_manager = Arc::new(SessionManager::new(a_client.clone(), "alice.aid.pub", Arc::new(AtomicBool::new(false))));
    let b_manager = Arc::new(SessionManager::new(b_client.clone(), "bob.aid.pub", Arc::new(AtomicBool::new(false))));

    let session_id = a_manager.create_session(&["bob.aid.pub".to_string()]).await.unwrap();

    let invite = Envelope::new("invite", json!({"session_id": session_id, "inviter": "alice.aid.pub"}));
    assert!(server.push("bob.aid.pub", invite));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    b_manager.join_session(&session_id).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let members = a_manager.get_member_list(&session_id).await.unwrap();
    let ids: Vec<&str> = members.iter().map(|m| m.agent_id.as_str()).collect();
    assert!(ids.contains(&"alice.aid.pub"));
    assert!(ids.contains(&"bob.aid.pub"));

    a_client.shutdown().await;
    b_client.shutdown().await;
}
