//! WebSocket client (spec §4.5): text/binary channel with ping and
//! event-driven callbacks. `connect` blocks (with a bounded timeout) for the
//! open event; all later traffic arrives as [`WsEvent`]s on the returned
//! channel. Automatic reconnection is deliberately **not** implemented here
//! — that policy belongs to the session layer above.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;

/// Accepts any server certificate; used only when the caller explicitly
/// disables TLS verification via `WsConfig::verify_tls = false`.
#[derive(Debug)]
struct NoCertVerification;

impl rustls::client::danger::ServerCertVerifier for NoCertVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider().signature_verification_algorithms.supported_schemes()
    }
}

fn insecure_rustls_connector() -> Connector {
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoCertVerification))
        .with_no_client_auth();
    Connector::Rustls(Arc::new(config))
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub enum WsEvent {
    Open,
    Text(String),
    Binary(Vec<u8>),
    Close { code: u16, reason: String },
    Error(String),
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub ping_interval: Option<Duration>,
    pub verify_tls: bool,
    pub connect_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval: Some(Duration::from_secs(30)),
            verify_tls: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

type Stream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A live WebSocket connection. Outbound sends go through this handle;
/// inbound traffic is delivered on the [`WsEvent`] receiver handed back by
/// [`WsClient::connect`].
pub struct WsClient {
    outbound: mpsc::UnboundedSender<Message>,
}

impl WsClient {
    /// Connect to `url`, waiting up to `config.connect_timeout` for the
    /// handshake to complete. Returns the client handle and a channel that
    /// receives [`WsEvent::Open`] first, then all subsequent frames.
    pub async fn connect(url: &str, config: WsConfig) -> Result<(Self, mpsc::UnboundedReceiver<WsEvent>), TransportError> {
        let connector = if config.verify_tls { None } else { Some(insecure_rustls_connector()) };

        let connect_fut = connect_async_tls_with_config(url, None, false, connector);
        let (stream, _response) = timeout(config.connect_timeout, connect_fut)
            .await
            .map_err(|_| TransportError::ConnectTimeout)?
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        events_tx.send(WsEvent::Open).map_err(|_| TransportError::Closed)?;

        spawn_pump(stream, events_tx, outbound_rx, config.ping_interval);

        Ok((Self { outbound: outbound_tx }, events_rx))
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| TransportError::Closed)
    }

    pub fn send_binary(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.outbound.send(Message::Binary(data)).map_err(|_| TransportError::Closed)
    }

    pub fn close(&self) -> Result<(), TransportError> {
        self.outbound
            .send(Message::Close(Some(CloseFrame { code: CloseCode::Normal, reason: "".into() })))
            .map_err(|_| TransportError::Closed)
    }
}

fn spawn_pump(
    stream: Stream,
    events_tx: mpsc::UnboundedSender<WsEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    ping_interval: Option<Duration>,
) {
    tokio::spawn(async move {
        let (mut sink, mut source) = stream.split();
        let mut ping_ticker = ping_interval.map(tokio::time::interval);

        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            let is_close = matches!(msg, Message::Close(_));
                            if let Err(e) = sink.send(msg).await {
                                let _ = events_tx.send(WsEvent::Error(e.to_string()));
                                break;
                            }
                            if is_close {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                inbound = source.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            if events_tx.send(WsEvent::Text(text)).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if events_tx.send(WsEvent::Binary(data)).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, String::new()));
                            let _ = events_tx.send(WsEvent::Close { code, reason });
                            break;
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            let _ = events_tx.send(WsEvent::Error(e.to_string()));
                            break;
                        }
                        None => {
                            let _ = events_tx.send(WsEvent::Close { code: 1006, reason: "stream ended".to_string() });
                            break;
                        }
                    }
                }
                _ = async {
                    match &mut ping_ticker {
                        Some(ticker) => { ticker.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}
