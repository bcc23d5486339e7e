//! Wire types and framing shared by the ACP transport, session and group
//! layers: UDP heartbeat frames, the WSS binary stream envelope, the
//! WebSocket JSON command envelope, and group message/event shapes.

pub mod envelope;
pub mod error;
pub mod group;
pub mod udp;
pub mod url;
pub mod wss;

pub use envelope::Envelope;
pub use error::{AcpError, ErrorCode, GroupError};
pub use group::{GroupEvent, GroupMessage, GroupMessageBatch, GroupNotification, PullMessagesResponse};
pub use udp::{decode_udp_frame, encode_udp_frame, UdpFrameError, UdpMessage};
pub use url::{parse_group_url, GroupUrl, GroupUrlError};
pub use wss::{decode_wss_frame, encode_wss_frame, WssFrameError, WssHeader};
