//! A mock WebSocket server for testing `acp-session`'s [`MessageClient`] end
//! to end: `acp_transport::WsClient` is a concrete struct, not a trait, so a
//! fake backend for it has to be a real local server a real client connects
//! to, not a swapped trait impl.
//!
//! Binds to `127.0.0.1:0`, accepts every connection, and for each inbound
//! `{"cmd", "data"}` envelope calls a user-supplied handler; any envelope it
//! returns is written back as the reply. One handler instance is shared
//! across every connection the server accepts. Connections are additionally
//! keyed by the `agent_id` query parameter of the connect URL (the same
//! parameter `MessageClient` puts there, spec §4.9), so a test can push an
//! unsolicited envelope to a specific connected agent via [`FakeWsServer::push`]
//! — the only way to exercise server-initiated delivery (e.g. an invite)
//! without a real access point relaying between two clients.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use acp_protocol::envelope::Envelope;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;

pub type FakeWsHandler = Arc<dyn Fn(&str, Envelope) -> Option<Envelope> + Send + Sync>;

/// A mock session WebSocket server for integration testing.
pub struct FakeWsServer {
    addr: SocketAddr,
    connections: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Message>>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl FakeWsServer {
    /// Start the server, binding to a random available port. Client
    /// connections are handled in a background task, one per connection.
    pub async fn start(handler: FakeWsHandler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake ws server");
        let addr = listener.local_addr().expect("fake ws server has a local address");
        let connections = Arc::new(Mutex::new(HashMap::new()));

        let task_connections = connections.clone();
        let task = tokio::spawn(async move {
            Self::accept_loop(listener, handler, task_connections).await;
        });

        Self { addr, connections, _task: task }
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// `ws://<addr>` the server is reachable at, matching the `ws(s)://`
    /// rewrite [`MessageClient`](acp_session) performs on its base url.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// `ws://<addr>/session?agent_id=<agent_id>`, the per-agent connect URL a
    /// [`MessageClient`](acp_session) is constructed with.
    #[must_use]
    pub fn ws_url_for(&self, agent_id: &str) -> String {
        format!("ws://{}/session?agent_id={agent_id}", self.addr)
    }

    /// Push an unsolicited envelope to whichever connection registered as
    /// `agent_id`. Returns `false` if no such connection is currently open.
    #[must_use]
    pub fn push(&self, agent_id: &str, envelope: Envelope) -> bool {
        let Some(tx) = self.connections.lock().get(agent_id).cloned() else { return false };
        let Ok(text) = serde_json::to_string(&envelope) else { return false };
        tx.send(Message::Text(text.into())).is_ok()
    }

    async fn accept_loop(listener: TcpListener, handler: FakeWsHandler, connections: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Message>>>>) {
        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let handler = handler.clone();
                    let connections = connections.clone();
                    tokio::spawn(async move {
                        let _ = Self::handle_connection(stream, handler, connections).await;
                    });
                }
                Err(_) => break,
            }
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        handler: FakeWsHandler,
        connections: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Message>>>>,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let captured_path = Arc::new(Mutex::new(String::new()));
        let capture = captured_path.clone();
        let callback = move |req: &Request, resp: Response| {
            *capture.lock() = req.uri().to_string();
            Ok(resp)
        };
        let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
        let agent_id = agent_id_from_path(&captured_path.lock());

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let self_tx = tx.clone();
        if let Some(agent_id) = &agent_id {
            connections.lock().insert(agent_id.clone(), tx);
        }

        let (mut write, mut read) = ws_stream.split();
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        while let Some(msg_result) = read.next().await {
            let msg = msg_result?;
            let text = match msg {
                Message::Text(t) => t,
                Message::Close(_) => break,
                Message::Ping(_) => continue,
                _ => continue,
            };

            let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else { continue };
            if let Some(reply) = handler(agent_id.as_deref().unwrap_or_default(), envelope) {
                let json = serde_json::to_string(&reply).expect("envelope always serializes");
                let _ = self_tx.send(Message::Text(json.into()));
            }
        }

        if let Some(agent_id) = &agent_id {
            connections.lock().remove(agent_id);
        }
        writer.abort();
        Ok(())
    }
}

fn agent_id_from_path(path: &str) -> Option<String> {
    let query = path.split_once('?')?.1;
    query.split('&').find_map(|pair| pair.strip_prefix("agent_id=").map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::agent_id_from_path;

    #[test]
    fn extracts_agent_id_from_query() {
        assert_eq!(agent_id_from_path("/session?agent_id=alice.aid.pub&signature=x"), Some("alice.aid.pub".to_string()));
        assert_eq!(agent_id_from_path("/session"), None);
    }
}
