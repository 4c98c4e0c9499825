//! HTTP protocol implementation.
//!
//! Everything here is synchronous and socket-agnostic; the event loop in
//! [`crate::server`] decides when bytes are read and written.
//!
//! # Architecture
//!
//! - **`connection`**: Per-client state: activity clock, framing, outbound queue
//! - **`assembler`**: Frames one request out of arbitrarily split reads
//! - **`parser`**: Parses a header block (plus any body bytes) into a request
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation and canned error pages
//! - **`handler`**: Resolves a request to a static file response
//! - **`writer`**: Serializes responses and writes them without blocking
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!   ┌───▶│ AwaitingHeaders  │ ← bytes pile up until \r\n\r\n
//!   │    └──────┬───────────┘
//!   │           │ Content-Length not yet satisfied
//!   │           ▼
//!   │    ┌──────────────────┐
//!   │    │  AwaitingBody    │ ← bytes go to the in-flight request
//!   │    └──────┬───────────┘
//!   │           │ body complete → response queued
//!   └───────────┤
//!               │ Connection: close / header overflow
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │ ← dropped once the response is written
//!        └──────────────────┘
//! ```
//!
//! Idle eviction, EOF and transport errors remove a connection from any state.

pub mod request;
pub mod response;
pub mod parser;
pub mod assembler;
pub mod connection;
pub mod handler;
pub mod writer;
