use beacon::server::listener::Listener;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

fn accept_within(listener: &Listener, limit: Duration) -> std::net::SocketAddr {
    let deadline = Instant::now() + limit;
    loop {
        match listener.accept() {
            Ok((_, peer)) => return peer,
            Err(e) if e.kind() == ErrorKind::WouldBlock && Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => panic!("accept failed: {e}"),
        }
    }
}

#[test]
fn test_bind_keeps_assigned_port() {
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();

    assert_ne!(listener.local_addr().port(), 0);
}

#[test]
fn test_reopen_rebinds_same_address() {
    let mut listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr();

    listener.reopen().unwrap();
    assert_eq!(listener.local_addr(), addr);
    assert_eq!(listener.source().unwrap().local_addr().unwrap(), addr);

    let client = TcpStream::connect(addr).unwrap();
    let peer = accept_within(&listener, Duration::from_secs(5));
    assert_eq!(peer, client.local_addr().unwrap());
}

#[test]
fn test_reopen_drops_queued_connections_of_old_socket() {
    let mut listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let _stale = TcpStream::connect(listener.local_addr()).unwrap();

    listener.reopen().unwrap();

    let err = listener.accept().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WouldBlock);
}
