//! Spec §8 scenario 6: `send_request` against a sink that never replies
//! times out within its configured window and leaves no pending entry
//! behind for a later, late response to land on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use acp_group::GroupClient;
use acp_test_support::ScriptedGroupTransport;
use serde_json::json;

#[tokio::test]
async fn timeout_fires_within_window_and_clears_pending_state() {
    let transport = ScriptedGroupTransport::silent();
    let client = Arc::new(GroupClient::new(transport));

    let start = Instant::now();
    let result = client.send_request("bob.aid.pub", "g1", "get_cursor", json!({}), Some(50)).await;
    let elapsed = start.elapsed();

    assert!(result.is_err(), "a sink that never replies must time out");
    assert!(elapsed >= Duration::from_millis(50), "must not fire before the configured timeout");
    assert!(elapsed < Duration::from_millis(500), "must fire close to the configured timeout, not hang");

    // A late reply for a request_id that's already been timed out and
    // removed must be silently discardable rather than panicking or
    // resurrecting a dropped waiter.
    client.handle_incoming(&json!({"action": "get_cursor", "request_id": "stale", "code": 0, "group_id": "g1", "data": {}})).await;
}
