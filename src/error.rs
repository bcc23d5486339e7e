//! Cross-cutting public error type (spec §7): every SDK operation returns
//! `(code, message, context)` rather than letting a subsystem-specific error
//! type cross the SDK boundary.

pub use acp_protocol::{AcpError as Error, ErrorCode};

pub type Result<T> = std::result::Result<T, Error>;

/// Maps a subsystem `Result` onto the public error type under an explicit
/// `ErrorCode`.
///
/// A blanket `impl From<SubsystemError> for Error` can't pick the right code
/// bucket for every call site — the same `TransportError` means
/// `WS_CONNECT_FAILED` during `online()` but `NETWORK_ERROR` during CSR
/// submission — so the code is chosen at the call site instead. (A plain
/// `From` impl is otherwise legal here since `Error` is local to this crate,
/// but would still only support one fixed mapping per source type.)
pub trait MapError<T> {
    fn map_acp_err(self, code: ErrorCode) -> Result<T>;
}

impl<T, E: std::fmt::Display> MapError<T> for std::result::Result<T, E> {
    fn map_acp_err(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| Error::new(code, e.to_string()))
    }
}

/// Unwraps `acp_group::GroupClientError::Remote` into the `(action, code,
/// error, group_id)` carrier the spec calls for (§7 "Group-server error
/// codes ... tunnelled to callers via a dedicated error type"); every other
/// variant becomes a plain `Error` under `code`.
#[must_use]
pub fn map_group_err(err: acp_group::GroupClientError, code: ErrorCode) -> Error {
    match err {
        acp_group::GroupClientError::Remote { action, code: remote_code, error, group_id } => {
            Error::new(code, error)
                .with_context(format!("action={action} group_id={group_id} remote_code={remote_code}"))
        }
        other => Error::new(code, other.to_string()),
    }
}
