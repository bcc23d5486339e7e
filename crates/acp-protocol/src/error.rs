//! Numeric error codes are part of the cross-language contract (spec §7):
//! every public operation returns `(code, message, context)` rather than
//! letting an exception cross the SDK boundary.

use std::fmt;

/// A flat numeric error code matching the families in spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    Unknown = 1,
    InvalidArgument = 2,
    NotInitialized = 3,
    NotImplemented = 4,

    AuthFailed = 1000,
    InvalidSignature = 1001,
    TokenExpired = 1002,
    CertError = 1003,

    HbAuthFailed = 2000,
    HbTimeout = 2001,
    HbReauthRequired = 2002,

    WsConnectFailed = 3000,
    WsDisconnected = 3001,
    WsSendFailed = 3002,
    WsTimeout = 3003,

    AidNotFound = 4000,
    AidAlreadyExists = 4001,
    AidInvalid = 4002,

    SessionNotFound = 4100,
    SessionNotMember = 4101,
    SessionPermissionDenied = 4102,
    SessionClosed = 4103,

    StreamNotConnected = 5000,
    StreamSendFailed = 5001,
    StreamClosed = 5002,

    FileNotFound = 6000,
    FileTooLarge = 6001,
    FileUploadFailed = 6002,
    FileDownloadFailed = 6003,

    DbOpenFailed = 7000,
    DbQueryFailed = 7001,
    DbMigrationFailed = 7002,

    NetworkError = 8000,
    NetworkTimeout = 8001,
    DnsFailed = 8002,
    TlsError = 8003,
}

impl ErrorCode {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.code())
    }
}

/// A public-API error: code, human message, and free-form context.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AcpError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<String>,
}

impl AcpError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), context: None }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// `GroupResponse.code` from the remote group server is preserved verbatim
/// and tunnelled through a dedicated error carrying `(action, code, error,
/// group_id)` per spec §7.
#[derive(Debug, Clone, thiserror::Error)]
#[error("group action {action} failed on {group_id}: code {code} ({error})")]
pub struct GroupError {
    pub action: String,
    pub code: i64,
    pub error: String,
    pub group_id: String,
}
