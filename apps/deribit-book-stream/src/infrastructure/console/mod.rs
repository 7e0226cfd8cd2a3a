//! Console Display
//!
//! [`FrameSink`] that writes decoded frames to standard output as indented
//! JSON and undecodable frames to standard error as lossy UTF-8. Standard
//! output carries market data only; logs go to standard error.

use std::io::{self, Stderr, Stdout, Write};

use crate::application::ports::FrameSink;
use crate::domain::frame::{InboundFrame, JsonCodec};

/// Writes frames to a pair of output streams.
pub struct ConsoleSink<O, E> {
    out: O,
    err: E,
    codec: JsonCodec,
}

impl ConsoleSink<Stdout, Stderr> {
    /// Sink bound to the process's standard streams.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleSink<O, E> {
    /// Create a sink over arbitrary writers.
    #[must_use]
    pub const fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            codec: JsonCodec::new(),
        }
    }

    /// The data stream.
    #[must_use]
    pub const fn out(&self) -> &O {
        &self.out
    }

    /// The diagnostic stream.
    #[must_use]
    pub const fn err(&self) -> &E {
        &self.err
    }

    fn write_frame(&mut self, frame: &InboundFrame) -> io::Result<()> {
        match frame {
            InboundFrame::Decoded(value) => {
                let text = self
                    .codec
                    .pretty(value)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                writeln!(self.out, "Received message:")?;
                writeln!(self.out, "{text}")?;
                self.out.flush()
            }
            InboundFrame::Raw { bytes, .. } => {
                writeln!(self.err, "Failed to parse JSON: {}", String::from_utf8_lossy(bytes))?;
                self.err.flush()
            }
        }
    }
}

impl<O, E> FrameSink for ConsoleSink<O, E>
where
    O: Write + Send,
    E: Write + Send,
{
    fn display(&mut self, frame: &InboundFrame) {
        // A closed pipe must not stop the stream.
        if let Err(e) = self.write_frame(frame) {
            tracing::warn!(error = %e, "Failed to write frame to console");
        }
    }
}
