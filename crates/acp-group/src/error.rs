#[derive(Debug, thiserror::Error)]
pub enum GroupClientError {
    #[error("send_func failed: {0}")]
    SendFailed(String),
    #[error("request timed out")]
    Timeout,
    #[error("client closed")]
    Closed,
    #[error("group action {action} failed on {group_id}: code {code} ({error})")]
    Remote { action: String, code: i64, error: String, group_id: String },
}
