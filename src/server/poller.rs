//! Readiness multiplexer over `mio`.

use std::io;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token, Waker};

/// Token of the listening socket.
pub const LISTENER: Token = Token(0);
/// Token of the waker used to interrupt `poll` from another thread.
pub const WAKER: Token = Token(1);

const EVENT_CAPACITY: usize = 1024;

/// What a single poll reported for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    /// Socket error, or both directions shut down.
    pub hangup: bool,
}

/// Watches registered sources for read, write and hangup readiness.
///
/// `mio` reports readiness as edges, so callers must consume a source until
/// it reports would-block before waiting on it again. Doing so gives the same
/// guarantee as a level-triggered poller: input that has not been read is
/// never left unreported.
pub struct Multiplexer {
    poll: Poll,
    events: Events,
}

impl Multiplexer {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENT_CAPACITY),
        })
    }

    /// Starts watching `source` for read readiness (errors and hangups are
    /// always reported).
    pub fn register<S>(&self, source: &mut S, token: Token) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        self.poll
            .registry()
            .register(source, token, Interest::READABLE)
    }

    /// Adds or drops write readiness for a registered source.
    pub fn watch_writes<S>(&self, source: &mut S, token: Token, enabled: bool) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        let interest = if enabled {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        self.poll.registry().reregister(source, token, interest)
    }

    /// Stops watching `source`. Removing a source that is not registered is
    /// not an error.
    pub fn unregister<S>(&self, source: &mut S)
    where
        S: Source + ?Sized,
    {
        if let Err(e) = self.poll.registry().deregister(source) {
            tracing::trace!(error = %e, "deregister of unwatched source");
        }
    }

    pub fn waker(&self, token: Token) -> io::Result<Waker> {
        Waker::new(self.poll.registry(), token)
    }

    /// Blocks for at most `timeout` and returns whatever became ready.
    ///
    /// An interrupted wait yields an empty set; the caller simply polls again.
    pub fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Readiness>> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        Ok(self
            .events
            .iter()
            .map(|event| Readiness {
                token: event.token(),
                readable: event.is_readable(),
                writable: event.is_writable(),
                hangup: event.is_error() || (event.is_read_closed() && event.is_write_closed()),
            })
            .collect())
    }
}
