//! Classification of socket errors on accept and read.

use std::io;

/// What the event loop should do about an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoClass {
    /// No data or connection yet; leave everything as it is.
    WouldBlock,
    /// The call was interrupted; try again right away.
    Retry,
    /// The peer went away; only that connection is affected.
    ConnectionLost,
    /// The process ran out of descriptors or buffers; back off until the next event.
    Exhausted,
    /// Anything else. The event loop stops.
    Fatal,
}

pub fn classify(err: &io::Error) -> IoClass {
    match err.kind() {
        io::ErrorKind::WouldBlock => IoClass::WouldBlock,
        io::ErrorKind::Interrupted => IoClass::Retry,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::TimedOut
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => IoClass::ConnectionLost,
        _ => classify_os_error(err),
    }
}

#[cfg(unix)]
fn classify_os_error(err: &io::Error) -> IoClass {
    match err.raw_os_error() {
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM) => IoClass::Exhausted,
        // Network-level failures accept(2) reports for a connection that is
        // already gone.
        Some(libc::EPROTO | libc::ENETDOWN | libc::ENETUNREACH | libc::EHOSTUNREACH) => {
            IoClass::ConnectionLost
        }
        _ => IoClass::Fatal,
    }
}

#[cfg(not(unix))]
fn classify_os_error(_err: &io::Error) -> IoClass {
    IoClass::Fatal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn would_block_is_not_an_error() {
        let err = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(classify(&err), IoClass::WouldBlock);
    }

    #[test]
    fn resets_are_connection_local() {
        for kind in [io::ErrorKind::ConnectionReset, io::ErrorKind::BrokenPipe] {
            assert_eq!(classify(&io::Error::from(kind)), IoClass::ConnectionLost);
        }
    }

    #[cfg(unix)]
    #[test]
    fn descriptor_exhaustion_backs_off() {
        let err = io::Error::from_raw_os_error(libc::EMFILE);
        assert_eq!(classify(&err), IoClass::Exhausted);
    }

    #[cfg(unix)]
    #[test]
    fn unknown_errors_are_fatal() {
        let err = io::Error::from_raw_os_error(libc::EBADF);
        assert_eq!(classify(&err), IoClass::Fatal);
    }
}
