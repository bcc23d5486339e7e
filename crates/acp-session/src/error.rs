#[derive(Debug, thiserror::Error)]
pub enum MessageClientError {
    #[error("websocket connect failed: {0}")]
    Connect(String),
    #[error("not connected")]
    NotConnected,
    #[error("shutdown requested")]
    ShutdownRequested,
    #[error("request timed out")]
    Timeout,
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session {0} is closed")]
    Closed(String),
    #[error("agent id has been invalidated")]
    AidInvalid,
    #[error("websocket send failed")]
    SendFailed,
    #[error("request timed out waiting for an ack")]
    Timeout,
}
