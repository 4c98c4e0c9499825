use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use crate::config::Site;
use crate::http::assembler::{Assembled, MessageAssembler};
use crate::http::handler;
use crate::http::response::Response;
use crate::http::writer::{Flush, ResponseWriter};

/// Where a connection is in its request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for (the rest of) a header block.
    AwaitingHeaders,
    /// Headers parsed, body bytes outstanding.
    AwaitingBody,
    /// No further input is accepted; the connection closes once its output drains.
    Closed,
}

/// How a read pass over the socket ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The socket has no more bytes for now.
    Drained,
    /// The peer closed its side of the connection.
    PeerClosed,
}

/// One accepted client socket and everything the server tracks about it.
///
/// The stream type is generic so the framing and write paths can run over
/// in-memory streams as well as non-blocking sockets.
pub struct Connection<S> {
    stream: S,
    last_activity: Instant,
    assembler: MessageAssembler,
    writer: ResponseWriter,
    closing: bool,
    write_interest: bool,
}

impl<S> Connection<S> {
    pub fn new(stream: S, max_header_bytes: usize, now: Instant) -> Self {
        Self {
            stream,
            last_activity: now,
            assembler: MessageAssembler::new(max_header_bytes),
            writer: ResponseWriter::new(),
            closing: false,
            write_interest: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.closing {
            ConnectionState::Closed
        } else if self.assembler.awaiting_body() {
            ConnectionState::AwaitingBody
        } else {
            ConnectionState::AwaitingHeaders
        }
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn has_pending_output(&self) -> bool {
        !self.writer.is_empty()
    }

    /// Whether the exchange is over and every response byte has been written.
    pub fn should_close(&self) -> bool {
        self.closing && self.writer.is_empty()
    }

    /// Whether the socket is currently registered for write readiness.
    pub fn write_interest(&self) -> bool {
        self.write_interest
    }

    pub fn set_write_interest(&mut self, enabled: bool) {
        self.write_interest = enabled;
    }

    /// Feeds bytes read from the socket through the assembler and queues any
    /// response they produce.
    pub fn ingest(&mut self, data: &[u8], site: &Site) {
        if self.closing {
            return;
        }

        match self.assembler.feed(data) {
            Assembled::Pending => {}
            Assembled::Complete(request) => {
                let response = handler::respond(&request, site);
                self.writer.push(&response);
                if !request.keep_alive() {
                    self.closing = true;
                }
            }
            Assembled::Malformed(e) => {
                tracing::debug!(error = %e, "malformed request");
                self.writer.push(&Response::bad_request());
            }
            Assembled::Overflow => {
                tracing::debug!("header block exceeds limit");
                self.writer.push(&Response::bad_request());
                self.closing = true;
            }
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// Reads until the socket would block, feeding every chunk to the assembler.
    ///
    /// `scratch` bounds the size of a single read. Errors other than
    /// would-block and interrupted are returned for the caller to classify.
    pub fn read_available(
        &mut self,
        scratch: &mut [u8],
        site: &Site,
        now: Instant,
    ) -> io::Result<ReadOutcome> {
        loop {
            match self.stream.read(scratch) {
                Ok(0) => return Ok(ReadOutcome::PeerClosed),
                Ok(n) => {
                    self.last_activity = now;
                    self.ingest(&scratch[..n], site);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadOutcome::Drained),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes queued response bytes until done or the socket would block.
    pub fn flush(&mut self, now: Instant) -> io::Result<Flush> {
        let before = self.writer.pending();
        let result = self.writer.write_to(&mut self.stream);
        if self.writer.pending() < before {
            self.last_activity = now;
        }
        result
    }
}
