//! HTTP, UDP and WebSocket transport backends the ACP SDK builds its
//! authenticated session on top of (spec §4.3-§4.6).

pub mod error;
pub mod http;
pub mod udp;
pub mod ws;

pub use error::TransportError;
pub use http::{HttpBackend, HttpClientConfig, MultipartFile, ProgressCallback, ReqwestHttpBackend};
pub use udp::UdpTransport;
pub use ws::{WsClient, WsConfig, WsEvent};
