use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use mio::net::TcpStream;
use mio::{Token, Waker};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::connection::{Connection, ReadOutcome};
use crate::server::io_class::{IoClass, classify};
use crate::server::listener::Listener;
use crate::server::poller::{LISTENER, Multiplexer, Readiness, WAKER};
use crate::server::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    pub fn stop(&self) -> io::Result<()> {
        self.requested.store(true, Ordering::SeqCst);
        self.waker.wake()
    }
}

/// The single-threaded event loop.
///
/// Owns the listener, the multiplexer and every connection. Each iteration
/// polls once, handles every reported event in order, then evicts idle
/// connections.
pub struct Server {
    poller: Multiplexer,
    listener: Listener,
    registry: Registry<TcpStream>,
    config: Config,
    scratch: Vec<u8>,
    stop_requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
    state: LoopState,
    /// Set when accepting stopped on resource exhaustion with connections
    /// possibly still queued. No further readiness edge is guaranteed for
    /// those, so each iteration retries until the backlog drains.
    accept_deferred: bool,
}

impl Server {
    /// Binds on all interfaces at the configured port.
    pub fn bind(config: Config) -> anyhow::Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
        Self::bind_to(addr, config)
    }

    pub fn bind_to(addr: SocketAddr, config: Config) -> anyhow::Result<Self> {
        let poller = Multiplexer::new().context("creating poller")?;
        let mut listener =
            Listener::bind(addr).with_context(|| format!("binding listener on {addr}"))?;
        poller
            .register(listener.source()?, LISTENER)
            .context("registering listener")?;
        let waker = Arc::new(poller.waker(WAKER).context("creating waker")?);

        Ok(Self {
            poller,
            listener,
            registry: Registry::new(),
            scratch: vec![0; config.server.read_buffer_size],
            config,
            stop_requested: Arc::new(AtomicBool::new(false)),
            waker,
            state: LoopState::Stopped,
            accept_deferred: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            requested: Arc::clone(&self.stop_requested),
            waker: Arc::clone(&self.waker),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs until stopped through a [`StopHandle`] or a fatal error.
    pub fn run(&mut self) -> anyhow::Result<()> {
        self.state = LoopState::Running;
        info!(
            addr = %self.local_addr(),
            timeout_secs = self.config.server.timeout.as_secs(),
            "event loop running"
        );

        let result = loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(e) = self.run_once() {
                break Err(e);
            }
        };

        self.state = LoopState::Stopped;
        match &result {
            Ok(()) => info!(open = self.registry.len(), "event loop stopped"),
            Err(e) => tracing::error!(error = %e, "event loop failed"),
        }
        result
    }

    /// One iteration: poll, dispatch every event, retry a deferred accept,
    /// sweep idle connections.
    pub fn run_once(&mut self) -> anyhow::Result<()> {
        let ready = self
            .poller
            .poll(self.config.server.timeout)
            .context("polling for readiness")?;

        for readiness in ready {
            match readiness.token {
                WAKER => {}
                LISTENER => self.handle_listener(readiness)?,
                token => self.handle_client(token, readiness)?,
            }
        }

        if self.accept_deferred {
            self.accept_pending()?;
        }

        self.sweep(Instant::now());
        Ok(())
    }

    fn handle_listener(&mut self, readiness: Readiness) -> anyhow::Result<()> {
        if readiness.hangup {
            warn!("listener reported an error, reopening");
            if let Ok(source) = self.listener.source() {
                self.poller.unregister(source);
            }
            self.listener.reopen().context("reopening listener")?;
            self.poller
                .register(self.listener.source()?, LISTENER)
                .context("registering reopened listener")?;
            return Ok(());
        }

        if readiness.readable {
            self.accept_pending()?;
        }
        Ok(())
    }

    /// Accepts until the listener would block, so no pending connection is
    /// left waiting for an unrelated event.
    fn accept_pending(&mut self) -> anyhow::Result<()> {
        loop {
            let (mut stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => match classify(&e) {
                    IoClass::WouldBlock => {
                        self.accept_deferred = false;
                        return Ok(());
                    }
                    IoClass::Retry | IoClass::ConnectionLost => continue,
                    IoClass::Exhausted => {
                        if !self.accept_deferred {
                            warn!(error = %e, "out of resources, deferring accept");
                        }
                        self.accept_deferred = true;
                        return Ok(());
                    }
                    IoClass::Fatal => return Err(e).context("accepting connection"),
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %e, "could not set TCP_NODELAY");
            }

            let token = self.registry.allocate();
            if let Err(e) = self.poller.register(&mut stream, token) {
                warn!(peer = %peer, error = %e, "failed to register connection");
                continue;
            }

            let connection = Connection::new(
                stream,
                self.config.server.max_header_bytes,
                Instant::now(),
            );
            self.registry.insert(token, connection);
            debug!(peer = %peer, token = token.0, "accepted connection");
        }
    }

    fn handle_client(&mut self, token: Token, readiness: Readiness) -> anyhow::Result<()> {
        if readiness.hangup {
            self.close(token, "hangup");
            return Ok(());
        }

        let now = Instant::now();
        let Some(connection) = self.registry.get_mut(token) else {
            return Ok(());
        };

        if readiness.readable {
            match connection.read_available(&mut self.scratch, &self.config.site, now) {
                Ok(ReadOutcome::Drained) => {}
                Ok(ReadOutcome::PeerClosed) => {
                    // Best effort: the peer may only have shut its write half.
                    if connection.has_pending_output() {
                        if let Err(e) = connection.flush(now) {
                            debug!(token = token.0, error = %e, "final flush failed");
                        }
                    }
                    self.close(token, "peer closed");
                    return Ok(());
                }
                Err(e) => match classify(&e) {
                    IoClass::WouldBlock | IoClass::Retry => {}
                    IoClass::ConnectionLost | IoClass::Exhausted => {
                        warn!(token = token.0, error = %e, "read failed");
                        self.close(token, "read error");
                        return Ok(());
                    }
                    IoClass::Fatal => return Err(e).context("reading from client"),
                },
            }
        }

        if connection.has_pending_output() {
            if let Err(e) = connection.flush(now) {
                warn!(token = token.0, error = %e, "write failed");
                self.close(token, "write error");
                return Ok(());
            }
        }

        if connection.should_close() {
            self.close(token, "exchange finished");
            return Ok(());
        }

        let wants_write = connection.has_pending_output();
        if wants_write != connection.write_interest() {
            if let Err(e) = self
                .poller
                .watch_writes(connection.stream_mut(), token, wants_write)
            {
                warn!(token = token.0, error = %e, "failed to update interest");
                self.close(token, "reregister failed");
                return Ok(());
            }
            connection.set_write_interest(wants_write);
        }

        Ok(())
    }

    /// Evicts every connection idle for at least the configured timeout.
    fn sweep(&mut self, now: Instant) {
        for token in self.registry.idle(now, self.config.server.timeout) {
            self.close(token, "idle timeout");
        }
    }

    /// Deregisters and drops a connection. Closing an unknown token is a no-op.
    fn close(&mut self, token: Token, reason: &'static str) {
        if let Some(mut connection) = self.registry.remove(token) {
            self.poller.unregister(connection.stream_mut());
            debug!(token = token.0, reason, "connection closed");
        }
    }
}
