//! Beacon - single-threaded static file server
//!
//! Core library for HTTP framing, static file responses and the
//! readiness-driven event loop.

pub mod config;
pub mod http;
pub mod server;
