// Signal delivery is process-wide, so this file is its own test binary and
// holds a single test.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use warden::config::Config;
use warden::http::Response;
use warden::net::{SignalSet, signal};
use warden::server::{RequestHandler, Server};

#[test]
fn test_termination_signal_stops_server_and_drains_connections() {
    assert!(!signal::received());

    let mut signals = SignalSet::termination().unwrap();
    signals.add(libc::SIGTERM).unwrap();
    assert_eq!(signals.signals(), [libc::SIGINT, libc::SIGTERM, libc::SIGQUIT]);

    let mut cfg = Config::default();
    cfg.server.port = 0;
    cfg.pool.threads = 1;
    let handler: RequestHandler = Arc::new(|_| Ok(Response::ok("unused")));
    let mut server = Server::new(&cfg, handler).unwrap();

    let mut client = TcpStream::connect(server.local_addr()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    client.write_all(b"GET / HTTP/1.0\r\nHost").unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.connection_count() == 0 {
        assert!(Instant::now() < deadline, "client never accepted");
        assert_eq!(server.turn().unwrap(), None);
    }

    let raiser = thread::spawn(|| {
        thread::sleep(Duration::from_millis(50));
        unsafe { libc::raise(libc::SIGTERM) };
    });

    assert_eq!(server.run().unwrap(), libc::SIGTERM);
    raiser.join().unwrap();

    assert!(signal::received());
    assert_eq!(signal::caught(), Some(libc::SIGTERM));
    assert_eq!(server.connection_count(), 0);

    // Drained connections are closed without a response.
    let mut reply = Vec::new();
    client.read_to_end(&mut reply).unwrap();
    assert!(reply.is_empty());
}
