//! UDP datagram socket (spec §4.4): `bind`, `recv_from`, `send_to`. Owned
//! exclusively by the heartbeat client; closing it unblocks a pending
//! `recv_from`.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::error::TransportError;

const MAX_DATAGRAM: usize = 2048;

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub async fn connect(&self, peer: SocketAddr) -> Result<(), TransportError> {
        self.socket.connect(peer).await.map_err(Into::into)
    }

    pub async fn send_to(&self, buf: &[u8], peer: SocketAddr) -> Result<(), TransportError> {
        self.socket.send_to(buf, peer).await?;
        Ok(())
    }

    /// Blocks until a datagram arrives or the socket is closed (dropped or
    /// connection reset), returning `(payload, sender_addr)`.
    pub async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, from))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_and_receive_a_datagram() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"ping", b_addr).await.unwrap();
        let (payload, _from) = b.recv_from().await.unwrap();
        assert_eq!(payload, b"ping");
    }
}
