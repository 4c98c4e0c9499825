//! Incremental framing of one HTTP request out of arbitrarily split reads.

use bytes::BytesMut;

use crate::http::parser::{HEADER_DELIMITER, ParseError, find_headers_end, parse_http_request};
use crate::http::request::Request;

/// Result of feeding one read's worth of bytes.
#[derive(Debug, PartialEq, Eq)]
pub enum Assembled {
    /// More bytes are needed.
    Pending,
    /// A full request arrived; the assembler is ready for the next one.
    Complete(Request),
    /// The header block could not be parsed. Buffered bytes were dropped.
    Malformed(ParseError),
    /// The header block outgrew the configured cap. Buffered bytes were dropped.
    Overflow,
}

/// Accumulates bytes for a single connection until a request is complete.
///
/// While no header delimiter has been seen, bytes pile up in a raw buffer.
/// Once the delimiter shows up the buffer is parsed; a request still short of
/// its declared `Content-Length` is kept in flight and later reads go straight
/// into its body.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    in_flight: Option<Request>,
    max_header_bytes: usize,
}

impl MessageAssembler {
    pub fn new(max_header_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            in_flight: None,
            max_header_bytes,
        }
    }

    /// True once headers are parsed and only body bytes are outstanding.
    pub fn awaiting_body(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Bytes held in the raw pre-delimiter buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn feed(&mut self, data: &[u8]) -> Assembled {
        if let Some(mut request) = self.in_flight.take() {
            request.append(data);
            if request.is_complete() {
                return Assembled::Complete(request);
            }
            self.in_flight = Some(request);
            return Assembled::Pending;
        }

        // The delimiter may straddle the previous read.
        let search_from = self.buffer.len().saturating_sub(HEADER_DELIMITER.len() - 1);
        self.buffer.extend_from_slice(data);

        let head_len = match find_headers_end(&self.buffer[search_from..]) {
            Some(offset) => search_from + offset,
            None => {
                if self.buffer.len() > self.max_header_bytes {
                    self.buffer.clear();
                    return Assembled::Overflow;
                }
                return Assembled::Pending;
            }
        };

        let raw = self.buffer.split().freeze();
        if head_len > self.max_header_bytes {
            return Assembled::Overflow;
        }

        match parse_http_request(&raw) {
            Ok(request) if request.is_complete() => Assembled::Complete(request),
            Ok(request) => {
                self.in_flight = Some(request);
                Assembled::Pending
            }
            Err(e) => Assembled::Malformed(e),
        }
    }
}
