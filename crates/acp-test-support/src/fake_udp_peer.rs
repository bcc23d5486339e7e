//! A UDP peer that stands in for the access point's heartbeat listener:
//! answers every `HeartbeatReq` with a scripted `next_beat_ms`, and can push
//! an unsolicited `InviteReq` on demand, driving `acp-heartbeat`'s client
//! loop without a live network.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use acp_protocol::udp::{decode_udp_frame, encode_udp_frame, UdpMessage};
use acp_transport::UdpTransport;

pub struct FakeUdpPeer {
    socket: Arc<UdpTransport>,
    next_beat_ms: AtomicU64,
}

impl FakeUdpPeer {
    pub async fn bind() -> Self {
        let socket = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.expect("bind fake udp peer");
        Self { socket: Arc::new(socket), next_beat_ms: AtomicU64::new(5_000) }
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr().expect("fake udp peer has a local address")
    }

    pub fn set_next_beat_ms(&self, ms: u64) {
        self.next_beat_ms.store(ms, Ordering::SeqCst);
    }

    /// Runs until the socket is closed: answers every inbound `HeartbeatReq`
    /// with `HeartbeatResp { next_beat_ms }`, echoing the request's mask and a
    /// bumped sequence number.
    pub fn spawn_responder(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let Ok((buf, from)) = this.socket.recv_from().await else { break };
                let Ok((mask, seq, UdpMessage::HeartbeatReq { .. })) = decode_udp_frame(&buf) else { continue };
                let resp = UdpMessage::HeartbeatResp { next_beat_ms: this.next_beat_ms.load(Ordering::SeqCst) };
                let frame = encode_udp_frame(&resp, mask, seq + 1);
                let _ = this.socket.send_to(&frame, from).await;
            }
        });
    }

    /// Push an unsolicited `InviteReq` to `peer`, as the access point does
    /// when forwarding a pending session invite.
    pub async fn send_invite(&self, peer: SocketAddr, invite: UdpMessage) {
        let frame = encode_udp_frame(&invite, 0, 1);
        let _ = self.socket.send_to(&frame, peer).await;
    }
}
