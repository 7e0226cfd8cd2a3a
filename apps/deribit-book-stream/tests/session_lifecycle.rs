//! Session Lifecycle Integration Tests
//!
//! Drives a real `Session` against a scripted transport to check stage
//! ordering, failure handling, timeout hand-off and the receive loop.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use test_case::test_case;

use deribit_book_stream::{
    FrameKind, FrameSink, InboundFrame, Session, SessionConfig, SessionMetrics, SessionState,
    Stage, Transport, TransportError,
};

// =============================================================================
// Scripted Transport
// =============================================================================

const ENDPOINT: &str = "192.0.2.10:443";

#[derive(Debug, Default)]
struct ScriptedTransport {
    /// Stages invoked, in order.
    calls: Vec<Stage>,
    /// Stage that returns an error.
    fail_at: Option<Stage>,
    /// Secure handshake never completes.
    stall_secure: bool,
    /// Delay before each receive yields its frame.
    receive_delay: Duration,
    /// Frames handed out by `receive`; an empty script closes the stream.
    frames: VecDeque<Vec<u8>>,
    /// Buffer length observed at the start of each receive.
    buffer_on_receive: Vec<usize>,
    /// Host passed to the secure handshake.
    tls_host: Option<String>,
    /// Host header passed to the protocol handshake.
    ws_host: Option<String>,
    /// Path passed to the protocol handshake.
    ws_path: Option<String>,
    /// Text frames sent.
    sent: Vec<String>,
}

impl ScriptedTransport {
    fn with_frames<I, B>(frames: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            frames: VecDeque::from(vec![b"{}".to_vec()]),
            ..Self::default()
        }
    }

    fn enter(&mut self, stage: Stage) -> Result<(), TransportError> {
        self.calls.push(stage);
        if self.fail_at == Some(stage) {
            return Err(TransportError::Closed(format!("injected {stage} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn resolve(&mut self, _host: &str, _port: &str) -> Result<Vec<SocketAddr>, TransportError> {
        self.enter(Stage::Resolve)?;
        Ok(vec![ENDPOINT.parse().unwrap()])
    }

    async fn connect(&mut self, endpoints: &[SocketAddr]) -> Result<SocketAddr, TransportError> {
        self.enter(Stage::Connect)?;
        Ok(endpoints[0])
    }

    async fn secure_handshake(&mut self, host: &str) -> Result<(), TransportError> {
        self.enter(Stage::SecureHandshake)?;
        self.tls_host = Some(host.to_string());
        if self.stall_secure {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn protocol_handshake(&mut self, host: &str, path: &str) -> Result<(), TransportError> {
        self.enter(Stage::ProtocolHandshake)?;
        self.ws_host = Some(host.to_string());
        self.ws_path = Some(path.to_string());
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.enter(Stage::Send)?;
        self.sent.push(text);
        Ok(())
    }

    async fn receive(&mut self, buffer: &mut Vec<u8>) -> Result<usize, TransportError> {
        self.buffer_on_receive.push(buffer.len());
        self.enter(Stage::Receive)?;

        if !self.receive_delay.is_zero() {
            tokio::time::sleep(self.receive_delay).await;
        }

        let frame = self
            .frames
            .pop_front()
            .ok_or_else(|| TransportError::Closed("script exhausted".to_string()))?;
        buffer.extend_from_slice(&frame);
        Ok(frame.len())
    }
}

#[derive(Debug, Default)]
struct RecordingSink {
    frames: Vec<InboundFrame>,
}

impl FrameSink for RecordingSink {
    fn display(&mut self, frame: &InboundFrame) {
        self.frames.push(frame.clone());
    }
}

/// What the session reported through its metrics port.
#[derive(Debug, Default)]
struct Recorded {
    completed: Vec<Stage>,
    failed: Vec<Stage>,
    frames: Vec<(FrameKind, usize)>,
}

#[derive(Debug, Clone, Default)]
struct RecordingMetrics(Arc<Mutex<Recorded>>);

impl SessionMetrics for RecordingMetrics {
    fn stage_completed(&mut self, stage: Stage, _elapsed: Duration) {
        self.0.lock().unwrap().completed.push(stage);
    }

    fn stage_failed(&mut self, stage: Stage) {
        self.0.lock().unwrap().failed.push(stage);
    }

    fn frame_received(&mut self, kind: FrameKind, bytes: usize) {
        self.0.lock().unwrap().frames.push((kind, bytes));
    }
}

/// In-memory log destination for a test subscriber.
#[derive(Debug, Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn config() -> SessionConfig {
    SessionConfig::new("www.deribit.com", "443", "/ws/api/v2", "BTC-PERPETUAL")
}

fn session(transport: ScriptedTransport) -> Session<ScriptedTransport, RecordingSink> {
    Session::new(config(), transport, RecordingSink::default())
}

const SETUP: [Stage; 5] = [
    Stage::Resolve,
    Stage::Connect,
    Stage::SecureHandshake,
    Stage::ProtocolHandshake,
    Stage::Send,
];

// =============================================================================
// Stage Ordering
// =============================================================================

#[tokio::test]
async fn stages_run_in_order_then_receive_repeats() {
    let mut session = session(ScriptedTransport::with_frames([
        br#"{"jsonrpc":"2.0","id":1,"result":["book.BTC-PERPETUAL.100ms"]}"#.to_vec(),
        br#"{"jsonrpc":"2.0","method":"subscription","params":{}}"#.to_vec(),
    ]));

    let failure = session.run().await;

    let mut expected = SETUP.to_vec();
    expected.extend([Stage::Receive; 3]);
    assert_eq!(session.transport().calls, expected);

    // Stream end is a receive failure.
    assert_eq!(failure.stage, Stage::Receive);
    assert!(failure.message.contains("script exhausted"));
    assert_eq!(session.frames_received(), 2);
}

#[tokio::test]
async fn subscribe_request_is_sent_once_verbatim() {
    let mut session = session(ScriptedTransport::default());
    session.run().await;

    assert_eq!(
        session.transport().sent,
        vec![
            r#"{"jsonrpc":"2.0","id":1,"method":"public/subscribe","params":{"channels":["book.BTC-PERPETUAL.100ms"]}}"#
        ]
    );
}

#[tokio::test]
async fn handshakes_receive_host_forms() {
    let mut session = session(ScriptedTransport::default());
    session.run().await;

    let transport = session.transport();
    assert_eq!(transport.tls_host.as_deref(), Some("www.deribit.com"));
    assert_eq!(transport.ws_host.as_deref(), Some("www.deribit.com:443"));
    assert_eq!(transport.ws_path.as_deref(), Some("/ws/api/v2"));
}

// =============================================================================
// Failure Handling
// =============================================================================

#[test_case(Stage::Resolve ; "resolve")]
#[test_case(Stage::Connect ; "connect")]
#[test_case(Stage::SecureHandshake ; "secure handshake")]
#[test_case(Stage::ProtocolHandshake ; "protocol handshake")]
#[test_case(Stage::Send ; "send")]
#[test_case(Stage::Receive ; "receive")]
#[tokio::test]
async fn failure_halts_at_stage(stage: Stage) {
    let mut session = session(ScriptedTransport::failing_at(stage));

    let failure = session.run().await;

    assert_eq!(failure.stage, stage);
    assert!(failure.to_string().starts_with(&format!("{}: ", stage.as_str())));
    assert_eq!(session.transport().calls.last(), Some(&stage));
    assert_eq!(session.transport().calls.iter().filter(|s| **s == stage).count(), 1);

    let position = Stage::all().iter().position(|s| *s == stage).unwrap();
    assert_eq!(session.transport().calls, Stage::all()[..=position].to_vec());

    assert_eq!(session.state(), &SessionState::Terminated(failure));
    assert!(session.sink().frames.is_empty());
}

#[tokio::test]
async fn terminated_session_is_inert() {
    let mut session = session(ScriptedTransport::failing_at(Stage::Connect));

    let first = session.run().await;
    let calls = session.transport().calls.len();
    let second = session.run().await;

    assert_eq!(first, second);
    assert_eq!(session.transport().calls.len(), calls);
}

// =============================================================================
// Timeout Hand-off
// =============================================================================

#[tokio::test(start_paused = true)]
async fn stalled_secure_handshake_times_out() {
    let transport = ScriptedTransport {
        stall_secure: true,
        ..ScriptedTransport::default()
    };
    let mut session = Session::new(
        config().with_connect_timeout(Duration::from_secs(5)),
        transport,
        RecordingSink::default(),
    );

    let started = tokio::time::Instant::now();
    let failure = session.run().await;

    assert_eq!(failure.stage, Stage::SecureHandshake);
    assert!(failure.message.contains("timed out"));
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert!(session.transport_timeout_armed());
}

#[tokio::test(start_paused = true)]
async fn idle_stream_outlives_connect_timeout() {
    let transport = ScriptedTransport {
        receive_delay: Duration::from_secs(3600),
        ..ScriptedTransport::with_frames([br#"{"jsonrpc":"2.0","method":"heartbeat"}"#.to_vec()])
    };
    let mut session = Session::new(
        config().with_connect_timeout(Duration::from_secs(1)),
        transport,
        RecordingSink::default(),
    );

    let failure = session.run().await;

    // The hour-long wait delivered its frame; only the exhausted script ended it.
    assert_eq!(session.frames_received(), 1);
    assert_eq!(failure.stage, Stage::Receive);
    assert!(failure.message.contains("script exhausted"));
    assert!(!session.transport_timeout_armed());
}

// =============================================================================
// Receive Loop
// =============================================================================

#[tokio::test]
async fn buffer_is_empty_before_every_receive() {
    let mut session = session(ScriptedTransport::with_frames([
        br#"{"id":1,"result":[]}"#.to_vec(),
        br#"{"method":"subscription","params":{"data":{"bids":[],"asks":[]}}}"#.to_vec(),
        br#"{"method":"subscription","params":{"data":{"bids":[[1.0,2.0]]}}}"#.to_vec(),
    ]));

    session.run().await;

    assert_eq!(session.transport().buffer_on_receive, vec![0, 0, 0, 0]);
    assert_eq!(session.buffered_bytes(), 0);
    assert_eq!(session.sink().frames.len(), 3);
    assert!(session.sink().frames.iter().all(InboundFrame::is_decoded));
}

#[tokio::test]
async fn malformed_frame_is_shown_raw_and_loop_continues() {
    let mut session = session(ScriptedTransport::with_frames([
        b"not json".to_vec(),
        br#"{"jsonrpc":"2.0","id":1,"result":["book.BTC-PERPETUAL.100ms"]}"#.to_vec(),
    ]));

    let failure = session.run().await;

    let frames = &session.sink().frames;
    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[0], InboundFrame::Raw { bytes, .. } if bytes == b"not json"));
    assert_eq!(
        frames[1],
        InboundFrame::Decoded(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": ["book.BTC-PERPETUAL.100ms"]
        }))
    );

    assert_eq!(session.transport().buffer_on_receive, vec![0, 0, 0]);
    assert_eq!(failure.stage, Stage::Receive);
}

#[tokio::test]
async fn custom_channel_reaches_the_wire() {
    let config = config().with_channel(
        deribit_book_stream::BookChannel::new("100ms").with_grouping("none", 10),
    );
    let mut session = Session::new(config, ScriptedTransport::default(), RecordingSink::default());

    session.run().await;

    let sent: serde_json::Value = serde_json::from_str(&session.transport().sent[0]).unwrap();
    assert_eq!(
        sent["params"]["channels"],
        json!(["book.BTC-PERPETUAL.none.10.100ms"])
    );
}

// =============================================================================
// Observability
// =============================================================================

#[tokio::test]
async fn metrics_port_sees_stages_frames_and_failure() {
    let metrics = RecordingMetrics::default();
    let mut session = session(ScriptedTransport::with_frames([
        br#"{"jsonrpc":"2.0","id":1,"result":["book.BTC-PERPETUAL.100ms"]}"#.to_vec(),
        br#"{"jsonrpc":"2.0","method":"subscription","params":{}}"#.to_vec(),
        b"oops".to_vec(),
    ]))
    .with_metrics(Box::new(metrics.clone()));

    session.run().await;

    let recorded = metrics.0.lock().unwrap();
    assert_eq!(recorded.completed, SETUP.to_vec());
    assert_eq!(
        recorded.frames,
        vec![
            (FrameKind::Response, 62),
            (FrameKind::Notification, 53),
            (FrameKind::Undecodable, 4),
        ]
    );
    assert_eq!(recorded.failed, vec![Stage::Receive]);
}

#[tokio::test]
async fn metrics_port_sees_setup_failure() {
    let metrics = RecordingMetrics::default();
    let mut session = session(ScriptedTransport::failing_at(Stage::SecureHandshake))
        .with_metrics(Box::new(metrics.clone()));

    session.run().await;

    let recorded = metrics.0.lock().unwrap();
    assert_eq!(recorded.completed, vec![Stage::Resolve, Stage::Connect]);
    assert_eq!(recorded.failed, vec![Stage::SecureHandshake]);
    assert!(recorded.frames.is_empty());
}

#[tokio::test]
async fn every_setup_stage_logs_its_start_before_completion() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut session = session(ScriptedTransport::default());
    session.run().await;

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let position = |needle: &str| {
        output
            .find(needle)
            .unwrap_or_else(|| panic!("missing {needle:?} in:\n{output}"))
    };

    for (start, done) in [
        ("Resolving host", "Host resolved"),
        ("Connecting", "TCP connection established"),
        ("Starting TLS handshake", "TLS handshake complete"),
        ("Starting WebSocket handshake", "WebSocket handshake complete"),
        ("Sending subscribe request", "Subscribed"),
    ] {
        assert!(position(start) < position(done), "{start:?} not before {done:?}");
    }
}
