use std::io;
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};
use tracing::info;

/// The listening socket, which can be torn down and rebound in place.
pub struct Listener {
    inner: Option<TcpListener>,
    addr: SocketAddr,
}

impl Listener {
    /// Binds a non-blocking listener with `SO_REUSEADDR` set.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let inner = TcpListener::bind(addr)?;
        // Keep the actual port so a reopen lands on the same one.
        let addr = inner.local_addr()?;
        info!("Listening on {}", addr);
        Ok(Self {
            inner: Some(inner),
            addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts one pending connection. The stream is already non-blocking.
    pub fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.socket()?.accept()
    }

    pub fn source(&mut self) -> io::Result<&mut TcpListener> {
        self.inner.as_mut().ok_or_else(closed)
    }

    /// Closes the socket and binds a fresh one on the same address.
    pub fn reopen(&mut self) -> io::Result<()> {
        drop(self.inner.take());
        self.inner = Some(TcpListener::bind(self.addr)?);
        info!("Reopened listener on {}", self.addr);
        Ok(())
    }

    fn socket(&self) -> io::Result<&TcpListener> {
        self.inner.as_ref().ok_or_else(closed)
    }
}

fn closed() -> io::Error {
    io::Error::other("listener is closed")
}
