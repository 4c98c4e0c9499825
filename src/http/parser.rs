use crate::http::request::{Method, Request};
use std::collections::HashMap;
use thiserror::Error;

/// Separator between the header block and the body.
pub const HEADER_DELIMITER: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("header block is not terminated by a blank line")]
    Incomplete,
    #[error("header block is not valid UTF-8")]
    InvalidEncoding,
    #[error("malformed request line")]
    InvalidRequest,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("Content-Length is not a number")]
    InvalidContentLength,
}

/// Parses a buffer holding a full header block and any body bytes that
/// arrived with it.
///
/// The returned request may be incomplete: when the client declared a
/// `Content-Length` larger than the bytes that followed the header block, the
/// caller keeps feeding the remainder through [`Request::append`]. Body bytes
/// past the declared length are discarded.
pub fn parse_http_request(buf: &[u8]) -> Result<Request, ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + HEADER_DELIMITER.len()..];

    let headers_str =
        std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidEncoding)?;

    let mut lines = headers_str.split("\r\n");

    // Request line: method, target, and whatever remains is the version.
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.splitn(3, ' ');

    let method = parts.next().filter(|m| !m.is_empty()).ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().filter(|t| !t.is_empty()).ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().filter(|v| !v.trim().is_empty()).ok_or(ParseError::InvalidRequest)?;

    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::InvalidHeader);
        }

        headers.insert(key.to_string(), value.trim().to_string());
    }

    let mut request = Request {
        method: Method::parse(method),
        target: target.to_string(),
        version: version.to_string(),
        headers,
        body: Vec::new(),
    };

    if let Some(value) = request.header("Content-Length") {
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength)?;
        request.append(body_bytes);
    }

    Ok(request)
}

/// Position of the first `\r\n\r\n` in `buf`.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_DELIMITER.len())
        .position(|w| w == HEADER_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let parsed = parse_http_request(req).unwrap();

        assert_eq!(parsed.target, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert!(parsed.is_complete());
    }

    #[test]
    fn version_keeps_trailing_text() {
        let parsed = parse_http_request(b"GET / HTTP/1.1 \r\n\r\n").unwrap();
        assert_eq!(parsed.version, "HTTP/1.1 ");
    }

    #[test]
    fn delimiter_search() {
        assert_eq!(find_headers_end(b"ab\r\n\r\ncd"), Some(2));
        assert_eq!(find_headers_end(b"ab\r\n\r"), None);
    }
}
