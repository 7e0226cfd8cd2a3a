//! WebSocket Transport
//!
//! Production [`Transport`] for the Deribit API: DNS via the Tokio
//! resolver, TCP, TLS through `tokio-rustls`, then a WebSocket upgrade via
//! `tokio-tungstenite` on top of the already encrypted stream.
//!
//! Each stage consumes what the previous one produced, so the connection
//! is held as a [`Link`] that only moves forward. Calling a stage before
//! its prerequisite returns [`TransportError::NotReady`].
//!
//! After the upgrade the [`FramedChannel`] owns liveness: the WebSocket
//! handshake runs under its own timeout and the receive loop interleaves
//! heartbeat pings with reads.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatEvent};
use crate::application::ports::{Transport, TransportError};
use crate::infrastructure::metrics;

impl From<WsError> for TransportError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::Io(e) => Self::Io(e),
            err @ (WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                Self::Closed(err.to_string())
            }
            other => Self::Protocol(other.to_string()),
        }
    }
}

// =============================================================================
// Protocol Settings
// =============================================================================

/// WebSocket layer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSettings {
    /// Limit on the WebSocket handshake.
    pub handshake_timeout: Duration,
    /// Ping/pong liveness.
    pub heartbeat: HeartbeatConfig,
    /// Largest inbound message accepted.
    pub max_message_size: usize,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            heartbeat: HeartbeatConfig::default(),
            max_message_size: 16 << 20,
        }
    }
}

impl ProtocolSettings {
    /// Create settings from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &crate::WebSocketSettings) -> Self {
        Self {
            handshake_timeout: settings.handshake_timeout,
            heartbeat: HeartbeatConfig::from_websocket_settings(settings),
            max_message_size: settings.max_message_size,
        }
    }

    fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

// =============================================================================
// Framed Channel
// =============================================================================

/// A WebSocket over any byte stream, with heartbeat-guarded receive.
pub struct FramedChannel<S> {
    ws: WebSocketStream<S>,
    heartbeat: Heartbeat,
}

enum Step {
    Heartbeat(HeartbeatEvent),
    Inbound(Option<Result<Message, WsError>>),
}

impl<S> FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Perform the WebSocket upgrade over `stream`.
    ///
    /// `host` becomes the Host header and may carry a port.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is malformed, the server rejects
    /// the upgrade, or the handshake exceeds its timeout.
    pub async fn handshake(
        stream: S,
        host: &str,
        path: &str,
        settings: &ProtocolSettings,
    ) -> Result<Self, TransportError> {
        let request = format!("wss://{host}{path}").into_client_request()?;

        let (ws, response) = tokio::time::timeout(
            settings.handshake_timeout,
            tokio_tungstenite::client_async_with_config(
                request,
                stream,
                Some(settings.websocket_config()),
            ),
        )
        .await
        .map_err(|_| TransportError::HandshakeTimedOut(settings.handshake_timeout))??;

        tracing::debug!(status = %response.status(), "WebSocket upgrade accepted");

        Ok(Self::new(ws, settings.heartbeat.clone()))
    }

    /// Wrap an established WebSocket.
    #[must_use]
    pub fn new(ws: WebSocketStream<S>, heartbeat: HeartbeatConfig) -> Self {
        Self {
            ws,
            heartbeat: Heartbeat::new(heartbeat),
        }
    }

    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    pub async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Wait for the next data frame and append its payload to `buffer`.
    ///
    /// Pings are sent while waiting; pings and pongs from the peer count
    /// as activity. Pong replies to peer pings are queued by tungstenite
    /// and flushed on the next read.
    ///
    /// # Errors
    ///
    /// Returns an error on close, end of stream, protocol errors, or when
    /// the heartbeat declares the peer dead.
    pub async fn receive(&mut self, buffer: &mut Vec<u8>) -> Result<usize, TransportError> {
        loop {
            let step = tokio::select! {
                event = self.heartbeat.next_event() => Step::Heartbeat(event),
                message = self.ws.next() => Step::Inbound(message),
            };

            match step {
                Step::Heartbeat(HeartbeatEvent::SendPing) => {
                    // A peer that stops reading must not stall the ping write.
                    let limit = self.heartbeat.pong_timeout();
                    tokio::time::timeout(limit, self.ws.send(Message::Ping(Vec::new().into())))
                        .await
                        .map_err(|_| TransportError::LivenessTimeout(limit))??;
                    self.heartbeat.mark_ping_sent();
                    metrics::record_heartbeat_ping();
                    tracing::trace!("Ping sent");
                }
                Step::Heartbeat(HeartbeatEvent::Timeout(elapsed)) => {
                    return Err(TransportError::LivenessTimeout(elapsed));
                }
                Step::Inbound(Some(Ok(Message::Text(text)))) => {
                    self.heartbeat.record_activity();
                    buffer.extend_from_slice(text.as_str().as_bytes());
                    return Ok(text.len());
                }
                Step::Inbound(Some(Ok(Message::Binary(data)))) => {
                    self.heartbeat.record_activity();
                    buffer.extend_from_slice(&data);
                    return Ok(data.len());
                }
                Step::Inbound(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {
                    self.heartbeat.record_activity();
                }
                Step::Inbound(Some(Ok(Message::Close(frame)))) => {
                    let reason = frame.map_or_else(
                        || "close frame".to_string(),
                        |f| format!("close frame {} {}", u16::from(f.code), f.reason.as_str()),
                    );
                    tracing::info!(%reason, "Server sent close frame");
                    return Err(TransportError::Closed(reason));
                }
                Step::Inbound(Some(Ok(Message::Frame(_)))) => {}
                Step::Inbound(Some(Err(e))) => return Err(e.into()),
                Step::Inbound(None) => {
                    return Err(TransportError::Closed("stream ended".to_string()));
                }
            }
        }
    }
}

// =============================================================================
// WebSocket Transport
// =============================================================================

type SecureStream = TlsStream<TcpStream>;

/// What the connection has reached so far.
enum Link {
    Idle,
    Tcp(TcpStream),
    Tls(Box<SecureStream>),
    Ws(Box<FramedChannel<SecureStream>>),
    Closed,
}

impl Link {
    const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Tcp(_) => "tcp",
            Self::Tls(_) => "tls",
            Self::Ws(_) => "websocket",
            Self::Closed => "closed",
        }
    }
}

/// TLS WebSocket transport.
pub struct WsTransport {
    tls: TlsConnector,
    protocol: ProtocolSettings,
    link: Link,
}

impl WsTransport {
    /// Create an unconnected transport.
    #[must_use]
    pub const fn new(tls: TlsConnector, protocol: ProtocolSettings) -> Self {
        Self {
            tls,
            protocol,
            link: Link::Idle,
        }
    }

    /// Name of the layer reached so far.
    #[must_use]
    pub const fn link_state(&self) -> &'static str {
        self.link.name()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn resolve(&mut self, host: &str, port: &str) -> Result<Vec<SocketAddr>, TransportError> {
        let port_number: u16 = port.parse().map_err(|_| {
            TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid port: {port}"),
            ))
        })?;

        let endpoints: Vec<SocketAddr> = tokio::net::lookup_host((host, port_number))
            .await?
            .collect();

        if endpoints.is_empty() {
            return Err(TransportError::NoEndpoints(format!("{host}:{port}")));
        }

        Ok(endpoints)
    }

    async fn connect(&mut self, endpoints: &[SocketAddr]) -> Result<SocketAddr, TransportError> {
        if !matches!(self.link, Link::Idle) {
            return Err(TransportError::NotReady("connect"));
        }

        let mut last_error = None;
        for endpoint in endpoints {
            match TcpStream::connect(endpoint).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    self.link = Link::Tcp(stream);
                    return Ok(*endpoint);
                }
                Err(e) => {
                    tracing::debug!(%endpoint, error = %e, "Endpoint unreachable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map_or_else(
            || TransportError::NoEndpoints("empty endpoint list".to_string()),
            TransportError::Io,
        ))
    }

    async fn secure_handshake(&mut self, host: &str) -> Result<(), TransportError> {
        let Link::Tcp(stream) = std::mem::replace(&mut self.link, Link::Closed) else {
            return Err(TransportError::NotReady("secure_handshake"));
        };

        let server_name = ServerName::try_from(host)
            .map_err(|_| TransportError::InvalidServerName(host.to_string()))?
            .to_owned();

        let secure = self.tls.connect(server_name, stream).await?;
        self.link = Link::Tls(Box::new(secure));
        Ok(())
    }

    async fn protocol_handshake(&mut self, host: &str, path: &str) -> Result<(), TransportError> {
        let Link::Tls(stream) = std::mem::replace(&mut self.link, Link::Closed) else {
            return Err(TransportError::NotReady("protocol_handshake"));
        };

        let channel = FramedChannel::handshake(*stream, host, path, &self.protocol).await?;
        self.link = Link::Ws(Box::new(channel));
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        match &mut self.link {
            Link::Ws(channel) => channel.send_text(text).await,
            _ => Err(TransportError::NotReady("send")),
        }
    }

    async fn receive(&mut self, buffer: &mut Vec<u8>) -> Result<usize, TransportError> {
        match &mut self.link {
            Link::Ws(channel) => channel.receive(buffer).await,
            _ => Err(TransportError::NotReady("receive")),
        }
    }
}
