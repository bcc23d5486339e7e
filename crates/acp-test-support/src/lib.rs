//! In-memory/local fakes for the ACP SDK's HTTP, UDP, WebSocket, and group
//! transports, shared by every crate's integration tests.

pub mod fake_http;
pub mod fake_udp_peer;
pub mod fake_ws_server;
pub mod group_transport;

pub use fake_http::FakeHttpBackend;
pub use fake_udp_peer::FakeUdpPeer;
pub use fake_ws_server::{FakeWsHandler, FakeWsServer};
pub use group_transport::ScriptedGroupTransport;
