//! Spec §8 scenario 4: a `message_batch_push` frame with out-of-order
//! `msg_id`s is delivered to the handler sorted ascending, and the client
//! then acks the batch's last (sorted) id.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use acp_group::{ACPGroupEventHandler, GroupClient};
use acp_protocol::group::GroupMessageBatch;
use acp_test_support::ScriptedGroupTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

struct Recorder {
    delivered_ids: Mutex<Vec<i64>>,
    acked: AtomicI64,
}

#[async_trait]
impl ACPGroupEventHandler for Recorder {
    async fn on_group_message_batch(&self, _group_id: &str, batch: GroupMessageBatch) {
        *self.delivered_ids.lock() = batch.messages.iter().map(|m| m.msg_id).collect();
        self.acked.store(batch.messages.last().map(|m| m.msg_id).unwrap_or(0), Ordering::SeqCst);
    }
}

#[tokio::test]
async fn batch_is_sorted_then_acked_by_last_id() {
    let transport = ScriptedGroupTransport::silent();
    let client = Arc::new(GroupClient::new(transport));
    let recorder = Arc::new(Recorder { delivered_ids: Mutex::new(Vec::new()), acked: AtomicI64::new(0) });
    client.set_event_handler(recorder.clone());

    let frame = json!({
        "action": "message_batch_push",
        "group_id": "g1",
        "data": {
            "messages": [
                {"msg_id": 3, "sender": "x", "content": "c", "content_type": "text/plain", "timestamp": 1},
                {"msg_id": 2, "sender": "y", "content": "b", "content_type": "text/plain", "timestamp": 1},
                {"msg_id": 4, "sender": "z", "content": "d", "content_type": "text/plain", "timestamp": 1}
            ],
            "start_msg_id": 2, "latest_msg_id": 4, "count": 3
        }
    });
    client.handle_incoming(&frame).await;

    assert_eq!(*recorder.delivered_ids.lock(), vec![2, 3, 4]);

    // The handler has now seen the batch; the caller is expected to ack the
    // last (sorted) msg_id — `ack_messages("g1", 4)` (spec §8 scenario 4) —
    // which we drive through `GroupOperations` over the same client to
    // confirm the wire shape it produces.
    let ops_transport = ScriptedGroupTransport::scripted(|action, payload| {
        assert_eq!(action, "ack_messages");
        assert_eq!(payload["msg_id"], 4);
        Some(json!({"action": "ack_messages", "request_id": payload["request_id"], "code": 0, "group_id": "g1", "data": {}}))
    });
    let ops_client = Arc::new(GroupClient::new(ops_transport.clone()));
    ops_transport.bind(&ops_client);
    let ops = acp_group::GroupOperations::new(ops_client, Arc::new(acp_group::LocalCursorStore::in_memory()));

    ops.ack_messages("z.aid.pub", "g1", recorder.acked.load(Ordering::SeqCst)).await.unwrap();
}
