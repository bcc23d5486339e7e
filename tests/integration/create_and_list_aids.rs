//! Spec §8 scenario 1: `initialize()` -> `create_aid` -> `list_aids()` ->
//! re-`create_aid` on the same AID surfaces `AID_ALREADY_EXISTS`.

use std::sync::Arc;

use acp_test_support::FakeHttpBackend;
use agentcp::{AgentCp, ErrorCode};
use serde_json::json;

fn issued_cert_response() -> serde_json::Value {
    json!({
        "cert": "-----BEGIN CERTIFICATE-----\nMIIBfakefakefakefakefakefakefakefakefakefakefakefakefake==\n-----END CERTIFICATE-----\n"
    })
}

#[tokio::test]
async fn create_then_list_then_duplicate_rejected() {
    let storage = tempfile::tempdir().unwrap();

    let http = Arc::new(FakeHttpBackend::new());
    http.push_json(issued_cert_response());

    let cp = AgentCp::new();
    cp.set_http_backend(http.clone());
    cp.set_storage_path(storage.path());
    cp.set_base_urls("https://ca.example", "https://ap.example");
    cp.initialize().unwrap();

    let agent = cp.create_aid("alice.aid.pub", "pw").await.unwrap();
    assert_eq!(agent.get_aid(), "alice.aid.pub");
    assert_eq!(cp.list_aids(), vec!["alice.aid.pub".to_string()]);

    let key_path = storage.path().join("alice.aid.pub").join("alice.aid.pub.key");
    let cert_path = storage.path().join("alice.aid.pub").join("alice.aid.pub.crt");
    assert!(key_path.exists());
    assert!(cert_path.exists());

    let err = cp.create_aid("alice.aid.pub", "pw").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AidAlreadyExists);
}

#[tokio::test]
async fn load_aid_round_trips_with_same_password() {
    let storage = tempfile::tempdir().unwrap();

    let http = Arc::new(FakeHttpBackend::new());
    http.push_json(issued_cert_response());

    let cp = AgentCp::new();
    cp.set_http_backend(http);
    cp.set_storage_path(storage.path());
    cp.set_base_urls("https://ca.example", "https://ap.example");
    cp.initialize().unwrap();
    cp.create_aid("alice.aid.pub", "correct horse").await.unwrap();

    // A second `AgentCp` over the same storage path stands in for a fresh
    // process picking the persisted AID back up from disk.
    let cp2 = AgentCp::new();
    cp2.set_storage_path(storage.path());
    cp2.initialize().unwrap();
    let loaded = cp2.load_aid("alice.aid.pub", "correct horse").await.unwrap();
    assert_eq!(loaded.get_aid(), "alice.aid.pub");

    // A third, still-unloaded `AgentCp` must hit the on-disk key file fresh;
    // the wrong password surfaces as `CERT_ERROR` rather than succeeding.
    let cp3 = AgentCp::new();
    cp3.set_storage_path(storage.path());
    cp3.initialize().unwrap();
    let err = cp3.load_aid("alice.aid.pub", "wrong password").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CertError);
}

#[tokio::test]
async fn operations_require_initialize_first() {
    let cp = AgentCp::new();
    let err = cp.create_aid("alice.aid.pub", "pw").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotInitialized);
}
