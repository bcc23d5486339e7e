#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("http request failed after retries: {0}")]
    Http(String),
    #[error("malformed sign-in response: {0}")]
    Parse(String),
    #[error("signing/crypto failure: {0}")]
    Crypto(String),
    #[error("sign-in denied by server: {0}")]
    Denied(String),
}
