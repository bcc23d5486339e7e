//! Spec §8 scenario 2: 10 concurrent `create_session` calls on one online
//! agent each get a distinct `session_id`, and `get_active_sessions()` ends
//! up holding exactly that set.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use acp_protocol::envelope::{cmd, Envelope};
use acp_session::{MessageClient, SessionManager, WsConfig};
use acp_test_support::FakeWsServer;
use serde_json::json;

#[tokio::test]
async fn ten_concurrent_create_session_calls_all_succeed_distinctly() {
    let next_session_id = Arc::new(AtomicU64::new(1));
    let server = FakeWsServer::start(Arc::new(move |_agent_id, envelope: Envelope| {
        if envelope.cmd != cmd::CREATE_SESSION_REQ {
            return None;
        }
        let session_id = next_session_id.fetch_add(1, Ordering::SeqCst);
        let request_id = envelope.data.get("request_id")?.as_str()?.to_string();
        Some(Envelope::new(cmd::CREATE_SESSION_ACK, json!({"request_id": request_id, "session_id": format!("s{session_id}")})))
    }))
    .await;

    let client = Arc::new(MessageClient::new(server.ws_url_for("alice.aid.pub"), WsConfig::default()));
    client.connect().await.unwrap();
    // Give the fake server's accept loop a moment to register the connection.
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let invalidated = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let manager = Arc::new(SessionManager::new(client.clone(), "alice.aid.pub", invalidated));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move { manager.create_session(&[]).await }));
    }

    let mut session_ids = HashSet::new();
    for handle in handles {
        let session_id = handle.await.unwrap().expect("create_session should succeed");
        session_ids.insert(session_id);
    }

    assert_eq!(session_ids.len(), 10, "all 10 session ids must be distinct");

    let active: HashSet<String> = manager.get_active_sessions().into_iter().collect();
    assert_eq!(active, session_ids);

    client.shutdown().await;
}
