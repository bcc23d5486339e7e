//! Spec §8 scenario 5: starting from local cursor 5, a server stream of
//! `[6,7,8]` then `[9,10]` then empty drives `sync_group` to call
//! `on_messages` twice, save cursor 10, and stop once `has_more == false`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use acp_group::{GroupOperations, LocalCursorStore, SyncHandler};
use acp_protocol::group::GroupMessage;
use acp_test_support::ScriptedGroupTransport;
use parking_lot::Mutex;
use serde_json::json;

fn message(msg_id: i64) -> serde_json::Value {
    json!({"msg_id": msg_id, "sender": "bob.aid.pub", "content": "hi", "content_type": "text/plain", "timestamp": 1})
}

struct Collector {
    batches: Mutex<Vec<Vec<i64>>>,
}

impl SyncHandler for Collector {
    fn on_messages(&self, _group_id: &str, messages: &[GroupMessage]) {
        self.batches.lock().push(messages.iter().map(|m| m.msg_id).collect());
    }
}

#[tokio::test]
async fn sync_group_drains_messages_then_stops_on_no_progress() {
    let pull_call = Arc::new(AtomicUsize::new(0));
    let ack_calls: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));

    let pull_call_handler = pull_call.clone();
    let ack_calls_handler = ack_calls.clone();
    let transport = ScriptedGroupTransport::scripted(move |action, payload| {
        let request_id = payload["request_id"].clone();
        match action {
            "pull_messages" => {
                let call = pull_call_handler.fetch_add(1, Ordering::SeqCst);
                let data = match call {
                    0 => json!({"messages": [message(6), message(7), message(8)], "has_more": true, "latest_msg_id": 10}),
                    1 => json!({"messages": [message(9), message(10)], "has_more": false, "latest_msg_id": 10}),
                    _ => json!({"messages": [], "has_more": false, "latest_msg_id": 10}),
                };
                Some(json!({"action": "pull_messages", "request_id": request_id, "code": 0, "group_id": "g1", "data": data}))
            }
            "ack_messages" => {
                ack_calls_handler.lock().push(payload["msg_id"].as_i64().unwrap());
                Some(json!({"action": "ack_messages", "request_id": request_id, "code": 0, "group_id": "g1", "data": {}}))
            }
            "pull_events" => {
                let data = json!({"events": [], "has_more": false, "latest_event_id": 0});
                Some(json!({"action": "pull_events", "request_id": request_id, "code": 0, "group_id": "g1", "data": data}))
            }
            _ => Some(json!({"action": action, "request_id": request_id, "code": 0, "group_id": "g1", "data": {}})),
        }
    });

    let client = Arc::new(acp_group::GroupClient::new(transport.clone()));
    transport.bind(&client);

    let cursor_store = Arc::new(LocalCursorStore::in_memory());
    cursor_store.save_msg_cursor("g1", 5).await;

    let ops = GroupOperations::new(client, cursor_store.clone());
    let collector = Collector { batches: Mutex::new(Vec::new()) };

    ops.sync_group("bob.aid.pub", "g1", &collector).await.unwrap();

    assert_eq!(*collector.batches.lock(), vec![vec![6, 7, 8], vec![9, 10]]);
    assert_eq!(*ack_calls.lock(), vec![8, 10]);
    assert_eq!(cursor_store.load_cursor("g1").await.msg_cursor, 10);
}
