use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use warden::net::{Acceptor, Endpoint, NetError, Protocol, Socket, SocketOption};

fn listening_acceptor() -> (Acceptor, SocketAddr) {
    let endpoint = Endpoint::resolve("127.0.0.1", "0").unwrap();
    let mut acceptor = Acceptor::new();
    acceptor.open(endpoint.protocol()).unwrap();
    acceptor.set_option(SocketOption::ReuseAddress(true)).unwrap();
    acceptor.bind(&endpoint).unwrap();
    acceptor.listen(8).unwrap();
    let addr = acceptor.local_addr().unwrap();
    (acceptor, addr)
}

fn accept_one(acceptor: &mut Acceptor) -> Socket {
    for _ in 0..500 {
        if let Some(socket) = acceptor.accept().unwrap() {
            return socket;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("no connection accepted");
}

#[test]
fn test_socket_pair_write_then_read() {
    let (mut a, mut b) = Socket::pair().unwrap();

    assert_eq!(a.write(b"ping").unwrap(), 4);
    let mut buf = [0u8; 4];
    assert_eq!(b.read(&mut buf).unwrap(), 4);
    assert_eq!(&buf, b"ping");
}

#[test]
fn test_read_some_reports_would_block() {
    let (_a, mut b) = Socket::pair().unwrap();
    b.set_nonblocking(true).unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(b.read_some(&mut buf).unwrap(), None);
}

#[test]
fn test_read_some_timeout_is_would_block() {
    let (_a, mut b) = Socket::pair().unwrap();
    b.set_option(SocketOption::ReceiveTimeout(Duration::from_millis(20)))
        .unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(b.read_some(&mut buf).unwrap(), None);
}

#[test]
fn test_read_some_reports_end_of_stream() {
    let (mut a, mut b) = Socket::pair().unwrap();
    a.write(b"x").unwrap();
    a.close();

    let mut buf = [0u8; 16];
    assert_eq!(b.read_some(&mut buf).unwrap(), Some(1));
    assert_eq!(b.read_some(&mut buf).unwrap(), Some(0));
}

#[test]
fn test_blocking_read_returns_short_on_eof() {
    let (mut a, mut b) = Socket::pair().unwrap();
    a.write(b"abc").unwrap();
    a.shutdown(Shutdown::Write).unwrap();

    let mut buf = [0u8; 10];
    assert_eq!(b.read(&mut buf).unwrap(), 3);
}

#[test]
fn test_close_is_idempotent() {
    let (mut a, _b) = Socket::pair().unwrap();
    a.close();
    a.close();

    assert!(a.is_closed());
    assert!(matches!(a.write(b"x"), Err(NetError::Closed)));
    let mut buf = [0u8; 1];
    assert!(matches!(a.read_some(&mut buf), Err(NetError::Closed)));
}

#[test]
fn test_write_to_closed_peer_is_send_error() {
    let (mut a, mut b) = Socket::pair().unwrap();
    b.close();

    let payload = vec![0u8; 1 << 20];
    let err = a.write(&payload).unwrap_err();
    assert!(err.is_stream_error());
}

#[test]
fn test_endpoint_resolution() {
    let endpoint = Endpoint::resolve("localhost", "8080").unwrap();
    assert_eq!(endpoint.address().port(), 8080);
    assert!(endpoint.address().ip().is_loopback());
    assert_eq!(endpoint.protocol(), Protocol::tcp_v4());

    let err = Endpoint::resolve("127.0.0.1", "no-such-service").unwrap_err();
    assert!(matches!(err, NetError::Endpoint { .. }));
}

#[test]
fn test_acceptor_requires_open_handle() {
    let mut acceptor = Acceptor::new();
    assert!(!acceptor.is_open());
    assert!(matches!(acceptor.listen(1), Err(NetError::Closed)));
    assert!(matches!(acceptor.accept(), Err(NetError::Closed)));
}

#[test]
fn test_acceptor_accepts_tcp_client() {
    let (mut acceptor, addr) = listening_acceptor();
    assert!(acceptor.accept().unwrap().is_none());

    let mut client = TcpStream::connect(addr).unwrap();
    let mut server = accept_one(&mut acceptor);
    assert_eq!(server.peer_addr(), Some(client.local_addr().unwrap()));

    client.write_all(b"hello").unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(server.read(&mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");

    server.write(b"bye").unwrap();
    server.shutdown(Shutdown::Both).unwrap();
    server.close();

    let mut reply = Vec::new();
    client.read_to_end(&mut reply).unwrap();
    assert_eq!(reply, b"bye");
}

#[test]
fn test_bind_conflict_is_bind_error() {
    let (_first, addr) = listening_acceptor();

    let mut second = Acceptor::new();
    second.open(Protocol::tcp_v4()).unwrap();
    let result = second.bind(&Endpoint::from_addr(addr));
    assert!(matches!(result, Err(NetError::Bind(_))));
}

#[test]
fn test_socket_from_tcp_stream() {
    let (mut acceptor, addr) = listening_acceptor();
    let client = TcpStream::connect(addr).unwrap();
    let _server = accept_one(&mut acceptor);

    let socket = Socket::from(client);
    assert_eq!(socket.peer_addr(), Some(addr));
}
