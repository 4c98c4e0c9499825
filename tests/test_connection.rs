use beacon::config::{HostTable, MediaTable, Site};
use beacon::http::connection::{Connection, ConnectionState, ReadOutcome};
use beacon::http::writer::Flush;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Non-blocking stand-in for a socket: hands out queued chunks, then would
/// block (or reports EOF once `closed`), and accepts a bounded number of
/// bytes per write.
#[derive(Default)]
struct MockStream {
    incoming: VecDeque<Vec<u8>>,
    closed: bool,
    written: Vec<u8>,
    write_limit: Option<usize>,
    reset: bool,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.reset {
            return Err(io::ErrorKind::ConnectionReset.into());
        }
        match self.incoming.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.incoming.push_front(chunk.split_off(n));
                }
                Ok(n)
            }
            None if self.closed => Ok(0),
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match self.write_limit {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(limit) => {
                let n = limit.min(buf.len());
                self.write_limit = Some(limit - n);
                n
            }
            None => buf.len(),
        };
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn site() -> (TempDir, Site) {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), b"hello world!").unwrap();
    let hosts = HostTable::new(HashMap::from([(
        "default".to_string(),
        root.path().to_path_buf(),
    )]))
    .unwrap();
    let media = MediaTable::new(HashMap::from([("html".to_string(), "text/html".to_string())]));
    (root, Site { hosts, media })
}

fn connection(chunks: &[&[u8]]) -> Connection<MockStream> {
    let stream = MockStream {
        incoming: chunks.iter().map(|c| c.to_vec()).collect(),
        ..MockStream::default()
    };
    Connection::new(stream, 1024, Instant::now())
}

fn written_text(conn: &Connection<MockStream>) -> String {
    String::from_utf8_lossy(&conn.stream().written).into_owned()
}

#[test]
fn test_request_split_across_reads_yields_one_response() {
    let (_root, site) = site();
    let mut conn = connection(&[b"GET / HT", b"TP/1.1\r\nHo", b"st: x\r\n", b"\r\n"]);
    let mut scratch = [0u8; 4];

    let outcome = conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    assert_eq!(outcome, ReadOutcome::Drained);
    assert!(conn.has_pending_output());

    assert_eq!(conn.flush(Instant::now()).unwrap(), Flush::Done);
    let text = written_text(&conn);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("\r\nContent-Length: 12\r\n"));
    assert!(text.ends_with("\r\n\r\nhello world!"));
    assert_eq!(text.matches("HTTP/1.1 ").count(), 1);

    // Recycled for the next request.
    assert_eq!(conn.state(), ConnectionState::AwaitingHeaders);
    assert!(!conn.should_close());
}

#[test]
fn test_body_gating_keeps_connection_awaiting_body() {
    let (_root, site) = site();
    let mut conn = connection(&[b"GET / HTTP/1.1\r\nContent-Length: 10\r\n\r\n1234567"]);
    let mut scratch = [0u8; 64];

    conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    assert_eq!(conn.state(), ConnectionState::AwaitingBody);
    assert!(!conn.has_pending_output());

    conn.stream_mut().incoming.push_back(b"890".to_vec());
    conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    assert_eq!(conn.state(), ConnectionState::AwaitingHeaders);
    assert!(conn.has_pending_output());
}

#[test]
fn test_malformed_request_gets_400_and_stays_open() {
    let (_root, site) = site();
    let mut conn = connection(&[b"garbage\r\n\r\n"]);
    let mut scratch = [0u8; 64];

    conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    conn.flush(Instant::now()).unwrap();

    assert!(written_text(&conn).starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert_eq!(conn.state(), ConnectionState::AwaitingHeaders);
    assert!(!conn.should_close());
}

#[test]
fn test_header_overflow_gets_400_then_closes() {
    let (_root, site) = site();
    let mut conn = connection(&[&[b'x'; 2048]]);
    let mut scratch = [0u8; 512];

    conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(!conn.should_close());

    conn.flush(Instant::now()).unwrap();
    assert!(written_text(&conn).starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(conn.should_close());
}

#[test]
fn test_connection_close_header_ends_exchange() {
    let (_root, site) = site();
    let mut conn = connection(&[b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n"]);
    let mut scratch = [0u8; 64];

    conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    assert_eq!(conn.state(), ConnectionState::Closed);
    conn.flush(Instant::now()).unwrap();
    assert!(conn.should_close());
}

#[test]
fn test_partial_writes_resume() {
    let (_root, site) = site();
    let mut conn = connection(&[b"GET / HTTP/1.1\r\n\r\n"]);
    conn.stream_mut().write_limit = Some(10);
    let mut scratch = [0u8; 64];

    conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    assert_eq!(conn.flush(Instant::now()).unwrap(), Flush::Blocked);
    assert_eq!(conn.stream().written.len(), 10);
    assert!(conn.has_pending_output());

    conn.stream_mut().write_limit = None;
    assert_eq!(conn.flush(Instant::now()).unwrap(), Flush::Done);
    assert!(written_text(&conn).ends_with("hello world!"));
    assert!(!conn.has_pending_output());
}

#[test]
fn test_peer_close_is_reported() {
    let (_root, site) = site();
    let mut conn = connection(&[]);
    conn.stream_mut().closed = true;
    let mut scratch = [0u8; 64];

    let outcome = conn.read_available(&mut scratch, &site, Instant::now()).unwrap();
    assert_eq!(outcome, ReadOutcome::PeerClosed);
}

#[test]
fn test_read_errors_are_returned() {
    let (_root, site) = site();
    let mut conn = connection(&[]);
    conn.stream_mut().reset = true;
    let mut scratch = [0u8; 64];

    let err = conn.read_available(&mut scratch, &site, Instant::now()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
}

#[test]
fn test_activity_refreshes_idle_clock() {
    let (_root, site) = site();
    let start = Instant::now();
    let timeout = Duration::from_secs(5);
    let mut conn = Connection::new(MockStream::default(), 1024, start);

    assert!(!conn.is_idle(start + Duration::from_secs(4), timeout));
    assert!(conn.is_idle(start + timeout, timeout));

    // No bytes: would-block leaves the clock alone.
    let mut scratch = [0u8; 16];
    conn.read_available(&mut scratch, &site, start + Duration::from_secs(3)).unwrap();
    assert_eq!(conn.last_activity(), start);

    conn.stream_mut().incoming.push_back(b"GE".to_vec());
    let later = start + Duration::from_secs(4);
    conn.read_available(&mut scratch, &site, later).unwrap();
    assert_eq!(conn.last_activity(), later);
    assert!(!conn.is_idle(start + timeout, timeout));
}
