//! Socket plumbing: the readiness multiplexer, the connection registry and
//! the event loop that ties them to the HTTP layer.

pub mod event_loop;
pub mod io_class;
pub mod listener;
pub mod poller;
pub mod registry;

pub use event_loop::{LoopState, Server, StopHandle};
