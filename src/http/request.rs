use std::collections::HashMap;

/// HTTP request methods.
///
/// Only `GET` is served. Every other method is still parsed so the response
/// builder can answer it with 501 Not Implemented instead of rejecting the
/// request as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other method token, kept verbatim
    Extension(String),
}

/// A parsed HTTP request.
///
/// A request produced by the parser may still be waiting for body bytes when
/// the client declared a `Content-Length` larger than what has arrived so far.
/// The message assembler feeds the rest through [`Request::append`] until
/// [`Request::is_complete`] holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target exactly as sent (e.g., "/index.html")
    pub target: String,
    /// Everything after the target on the request line (typically "HTTP/1.1")
    pub version: String,
    /// Request headers, one value per name
    pub headers: HashMap<String, String>,
    /// Body bytes received so far
    pub body: Vec<u8>,
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// Matching is case-sensitive, as HTTP method names are. Unknown tokens
    /// become [`Method::Extension`].
    ///
    /// # Example
    ///
    /// ```
    /// # use beacon::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Method::GET);
    /// assert_eq!(Method::parse("get"), Method::Extension("get".into()));
    /// ```
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Extension(token) => token,
        }
    }
}

impl Request {
    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// The declared `Content-Length`, if present and numeric.
    ///
    /// The parser rejects non-numeric values, so for parsed requests `None`
    /// means the header was absent.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Whether the whole body has been received.
    ///
    /// Without a `Content-Length` the request is bodyless and complete as soon
    /// as its headers are parsed.
    pub fn is_complete(&self) -> bool {
        match self.content_length() {
            Some(declared) => self.body.len() == declared,
            None => true,
        }
    }

    /// Appends body bytes, never growing the body past the declared length.
    ///
    /// Returns how many bytes of `data` were taken. Anything beyond the
    /// declared length belongs to no request and is left to the caller.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let wanted = self
            .content_length()
            .map_or(0, |declared| declared.saturating_sub(self.body.len()));
        let taken = wanted.min(data.len());
        self.body.extend_from_slice(&data[..taken]);
        taken
    }

    /// The hostname portion of the `Host` header, without any port suffix.
    pub fn host(&self) -> Option<&str> {
        let host = self.header("Host")?.trim();
        if host.starts_with('[') {
            // IPv6 literal: keep the brackets, drop the port.
            return Some(host.find(']').map_or(host, |end| &host[..=end]));
        }
        Some(host.split_once(':').map_or(host, |(name, _)| name))
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// `Connection: close` ends the exchange; HTTP/1.0 clients must opt in with
    /// `Connection: keep-alive`. Everything else keeps the connection, which is
    /// the HTTP/1.1 default.
    pub fn keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => !self.version.trim().eq_ignore_ascii_case("HTTP/1.0"),
        }
    }
}
