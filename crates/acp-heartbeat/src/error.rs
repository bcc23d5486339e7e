#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("heartbeat socket bind failed: {0}")]
    Bind(String),
    #[error("heartbeat loop is already running")]
    AlreadyRunning,
    #[error("sign-in required before the heartbeat loop can start: {0}")]
    NotSignedIn(String),
}
