//! Session Service
//!
//! Drives one [`Transport`] through the lifecycle defined in
//! [`crate::domain::session`]: resolve, connect, secure handshake, protocol
//! handshake, subscribe, then receive forever.
//!
//! # Timeouts
//!
//! The connect timeout bounds resolve, connect and the secure handshake,
//! each stage getting the full budget. It is disarmed as soon as the secure
//! handshake completes and never re-armed; from then on the transport's
//! WebSocket layer owns liveness (handshake timeout, then heartbeat).
//!
//! # Failures
//!
//! Every stage failure is handled where it happens: logged with the stage
//! name, recorded as the terminal state and returned as a [`Failure`]. No
//! stage is retried and nothing after the failed stage runs.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::application::ports::{FrameSink, NoMetrics, SessionMetrics, Transport, TransportError};
use crate::domain::frame::{InboundFrame, JsonCodec};
use crate::domain::session::{Failure, SessionEvent, SessionState, Stage};
use crate::domain::subscription::{
    BookChannel, Instrument, SUBSCRIBE_REQUEST_ID, SubscribeRequest,
};

// =============================================================================
// Configuration
// =============================================================================

/// Everything a session needs to reach and subscribe to its target.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target host name.
    pub host: String,
    /// Target port.
    pub port: String,
    /// WebSocket resource path.
    pub path: String,
    /// Instrument to subscribe to.
    pub instrument: Instrument,
    /// Order book channel shape.
    pub channel: BookChannel,
    /// Transport-level timeout for resolve through secure handshake.
    pub connect_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration for the given endpoint and instrument with
    /// the default channel and a 30 second connect timeout.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: impl Into<String>,
        path: impl Into<String>,
        instrument: impl Into<Instrument>,
    ) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            path: path.into(),
            instrument: instrument.into(),
            channel: BookChannel::default(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Set the book channel shape.
    #[must_use]
    pub fn with_channel(mut self, channel: BookChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The subscribe request this session sends.
    #[must_use]
    pub fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::book(SUBSCRIBE_REQUEST_ID, &self.channel, &self.instrument)
    }
}

// =============================================================================
// Session
// =============================================================================

/// One logical connection to one endpoint.
///
/// The session exclusively owns its transport, its sink and its receive
/// buffer. Operations are issued strictly one at a time.
pub struct Session<T, S> {
    config: SessionConfig,
    transport: T,
    sink: S,
    metrics: Box<dyn SessionMetrics>,
    codec: JsonCodec,
    state: SessionState,
    buffer: Vec<u8>,
    connect_timeout: Option<Duration>,
    frames_received: u64,
}

impl<T, S> Session<T, S>
where
    T: Transport,
    S: FrameSink,
{
    /// Create a session in the `Init` state.
    #[must_use]
    pub fn new(config: SessionConfig, transport: T, sink: S) -> Self {
        let connect_timeout = Some(config.connect_timeout);
        Self {
            config,
            transport,
            sink,
            metrics: Box::new(NoMetrics),
            codec: JsonCodec::new(),
            state: SessionState::Init,
            buffer: Vec::new(),
            connect_timeout,
            frames_received: 0,
        }
    }

    /// Report stage and frame progress to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Box<dyn SessionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether the transport-level connect timeout is still armed.
    #[must_use]
    pub const fn transport_timeout_armed(&self) -> bool {
        self.connect_timeout.is_some()
    }

    /// Bytes currently held in the receive buffer.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Frames consumed since the session started streaming.
    #[must_use]
    pub const fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// The owned transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The owned sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Run the session until a stage fails.
    ///
    /// A healthy session never returns: it stays in the receive loop. The
    /// returned [`Failure`] names the stage that stopped it; the session
    /// is left in `Terminated` and does nothing further.
    #[tracing::instrument(
        name = "session",
        skip(self),
        fields(instrument = %self.config.instrument, host = %self.config.host)
    )]
    pub async fn run(&mut self) -> Failure {
        if let Some(failure) = self.state.failure() {
            return failure.clone();
        }

        if let Err(failure) = self.establish().await {
            return failure;
        }

        loop {
            if let Err(failure) = self.receive_frame().await {
                return failure;
            }
        }
    }

    /// Walk the setup stages up to and including the subscribe send.
    async fn establish(&mut self) -> Result<(), Failure> {
        self.advance(SessionEvent::Start)?;

        // Resolve
        tracing::debug!(port = %self.config.port, "Resolving host");
        let started = Instant::now();
        let result = bounded(
            self.connect_timeout,
            self.transport.resolve(&self.config.host, &self.config.port),
        )
        .await;
        let endpoints = self.complete(started, result, SessionEvent::Resolved)?;
        tracing::info!(endpoints = endpoints.len(), "Host resolved");

        // Connect
        tracing::debug!(endpoints = endpoints.len(), "Connecting");
        let started = Instant::now();
        let result = bounded(self.connect_timeout, self.transport.connect(&endpoints)).await;
        let endpoint = self.complete(started, result, SessionEvent::Connected)?;
        tracing::info!(%endpoint, "TCP connection established");

        // Secure handshake
        tracing::debug!(host = %self.config.host, "Starting TLS handshake");
        let started = Instant::now();
        let result = bounded(
            self.connect_timeout,
            self.transport.secure_handshake(&self.config.host),
        )
        .await;
        self.complete(started, result, SessionEvent::Secured)?;
        tracing::info!("TLS handshake complete");

        // The WebSocket layer has its own timeouts from here on.
        self.connect_timeout = None;
        tracing::debug!("Transport timeout disarmed");

        // Protocol handshake
        let host_header = host_header(&self.config.host, endpoint);
        tracing::debug!(
            host = %host_header,
            path = %self.config.path,
            "Starting WebSocket handshake"
        );
        let started = Instant::now();
        let result = self
            .transport
            .protocol_handshake(&host_header, &self.config.path)
            .await;
        self.complete(started, result, SessionEvent::Negotiated)?;
        tracing::info!(host = %host_header, path = %self.config.path, "WebSocket handshake complete");

        // Subscribe
        let request = self.config.subscribe_request();
        let text = match self.codec.encode(&request) {
            Ok(text) => text,
            Err(e) => return Err(self.fail(&e.to_string())),
        };
        tracing::debug!(channels = ?request.params.channels, "Sending subscribe request");
        let started = Instant::now();
        let result = self.transport.send(text).await;
        self.complete(started, result, SessionEvent::SubscribeSent)?;
        tracing::info!(channels = ?request.params.channels, "Subscribed");

        Ok(())
    }

    /// Receive, decode and display one frame, then reset the buffer.
    async fn receive_frame(&mut self) -> Result<(), Failure> {
        let size = match self.transport.receive(&mut self.buffer).await {
            Ok(size) => size,
            Err(e) => return Err(self.fail(&e.to_string())),
        };

        let frame = self.codec.decode(&self.buffer);
        let kind = frame.kind();
        self.metrics.frame_received(kind, size);

        if let InboundFrame::Raw { error, .. } = &frame {
            tracing::warn!(bytes = size, error = %error, "Frame is not valid JSON");
        } else {
            tracing::trace!(bytes = size, kind = kind.as_str(), "Frame received");
        }

        self.sink.display(&frame);
        self.buffer.clear();
        self.frames_received += 1;

        self.advance(SessionEvent::FrameReceived)
    }

    /// Settle a stage result: advance on success, terminate on failure.
    fn complete<R>(
        &mut self,
        started: Instant,
        result: Result<R, TransportError>,
        event: SessionEvent,
    ) -> Result<R, Failure> {
        match result {
            Ok(value) => {
                if let Some(stage) = self.state.stage() {
                    self.metrics.stage_completed(stage, started.elapsed());
                }
                self.advance(event)?;
                Ok(value)
            }
            Err(e) => Err(self.fail(&e.to_string())),
        }
    }

    fn advance(&mut self, event: SessionEvent) -> Result<(), Failure> {
        match self.state.on(event) {
            Ok(next) => {
                if next != self.state {
                    tracing::debug!(from = self.state.name(), to = next.name(), "Session transition");
                }
                self.state = next;
                Ok(())
            }
            Err(e) => Err(self.fail(&e.to_string())),
        }
    }

    fn fail(&mut self, message: &str) -> Failure {
        let stage = self.state.stage().unwrap_or(Stage::Resolve);

        self.state = self
            .state
            .on(SessionEvent::Failed(message.to_string()))
            .unwrap_or_else(|_| SessionState::Terminated(Failure::new(stage, message)));

        tracing::error!(stage = %stage, error = %message, "Session stage failed");
        self.metrics.stage_failed(stage);

        self.state
            .failure()
            .cloned()
            .unwrap_or_else(|| Failure::new(stage, message))
    }
}

/// Host header value: the configured host plus the connected port.
fn host_header(host: &str, endpoint: SocketAddr) -> String {
    format!("{host}:{}", endpoint.port())
}

/// Apply the connect timeout when armed.
async fn bounded<R, F>(limit: Option<Duration>, operation: F) -> Result<R, TransportError>
where
    F: Future<Output = Result<R, TransportError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| TransportError::TimedOut(limit))?,
        None => operation.await,
    }
}
