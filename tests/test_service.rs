use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use warden::net::{
    Acceptor, Endpoint, ReadFailure, ServiceHandler, Socket, SocketOption, StreamService, Token,
};

#[derive(Debug, PartialEq)]
enum Event {
    Accepted(Option<SocketAddr>),
    Readable(Token),
    Writable(Token),
    Failed(Token, ReadFailure),
}

#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
    accepted: Vec<Socket>,
    remove_on_read: Option<Token>,
    /// Token whose readable callback stalls for the given time and re-arms.
    busy: Option<(Token, Duration)>,
}

impl ServiceHandler for Recorder {
    fn accepted(&mut self, _service: &mut StreamService, socket: Socket) {
        self.events.push(Event::Accepted(socket.peer_addr()));
        self.accepted.push(socket);
    }

    fn readable(&mut self, service: &mut StreamService, token: Token) {
        if let Some(other) = self.remove_on_read.take() {
            service.remove(other);
        }
        if let Some((busy, stall)) = self.busy {
            if busy == token {
                thread::sleep(stall);
                service.async_read(token);
                return;
            }
        }
        self.events.push(Event::Readable(token));
    }

    fn writable(&mut self, _service: &mut StreamService, token: Token) {
        self.events.push(Event::Writable(token));
    }

    fn read_failed(&mut self, _service: &mut StreamService, token: Token, failure: ReadFailure) {
        self.events.push(Event::Failed(token, failure));
    }
}

fn turn_until<F>(service: &mut StreamService, handler: &mut Recorder, done: F)
where
    F: Fn(&Recorder) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(handler) {
        assert!(Instant::now() < deadline, "events never arrived");
        assert_eq!(service.turn(handler).unwrap(), None);
    }
}

#[test]
fn test_empty_service_stops_immediately() {
    let mut service = StreamService::new();
    let mut handler = Recorder::default();

    assert_eq!(service.run(&mut handler).unwrap(), 0);
    assert!(handler.events.is_empty());
}

#[test]
fn test_pending_read_is_dispatched_once() {
    let mut service = StreamService::new();
    let mut handler = Recorder::default();
    let (mut client, server) = Socket::pair().unwrap();

    let token = service.add(&server).unwrap();
    assert!(service.async_read(token));
    assert!(service.async_read(token));
    client.write(b"data").unwrap();

    turn_until(&mut service, &mut handler, |h| !h.events.is_empty());
    assert_eq!(handler.events, [Event::Readable(token)]);

    // The read was consumed; more readiness does nothing until re-armed.
    service.turn(&mut handler).unwrap();
    assert_eq!(handler.events.len(), 1);

    service.async_read(token);
    service.turn(&mut handler).unwrap();
    assert_eq!(handler.events.len(), 2);
}

#[test]
fn test_silent_socket_times_out_and_is_removed() {
    let mut service = StreamService::with_idle_timeout(Duration::from_millis(50));
    let mut handler = Recorder::default();
    let (_client, server) = Socket::pair().unwrap();

    let token = service.add(&server).unwrap();
    service.async_read(token);
    let started = Instant::now();

    turn_until(&mut service, &mut handler, |h| !h.events.is_empty());

    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(handler.events, [Event::Failed(token, ReadFailure::TimedOut)]);
    assert!(!service.contains(token));
    assert_eq!(service.socket_count(), 0);
}

#[test]
fn test_per_socket_timeout() {
    let mut service = StreamService::new();
    let mut handler = Recorder::default();
    let (_a, slow) = Socket::pair().unwrap();
    let (_b, fast) = Socket::pair().unwrap();

    let slow = service.add(&slow).unwrap();
    let fast_token = service.add(&fast).unwrap();
    assert!(service.set_timeout(fast_token, Duration::from_millis(30)));
    service.async_read(slow);
    service.async_read(fast_token);

    turn_until(&mut service, &mut handler, |h| !h.events.is_empty());

    assert_eq!(handler.events, [Event::Failed(fast_token, ReadFailure::TimedOut)]);
    assert!(service.contains(slow));
    assert!(service.remaining(slow).unwrap() <= Duration::from_secs(30));
}

#[test]
fn test_remove_is_idempotent() {
    let mut service = StreamService::new();
    let (_a, b) = Socket::pair().unwrap();

    let token = service.add(&b).unwrap();
    assert!(service.remove(token));
    assert!(!service.remove(token));
    assert!(!service.async_read(token));
    assert_eq!(service.socket_count(), 0);
}

#[test]
fn test_removal_during_dispatch() {
    let mut service = StreamService::new();
    let mut handler = Recorder::default();
    let (mut a_client, a) = Socket::pair().unwrap();
    let (mut b_client, b) = Socket::pair().unwrap();

    let first = service.add(&a).unwrap();
    let second = service.add(&b).unwrap();
    service.async_read(first);
    service.async_read(second);
    handler.remove_on_read = Some(second);

    a_client.write(b"x").unwrap();
    b_client.write(b"y").unwrap();
    turn_until(&mut service, &mut handler, |h| !h.events.is_empty());

    assert_eq!(handler.events, [Event::Readable(first)]);
    assert!(!service.contains(second));
}

#[test]
fn test_acceptor_delivers_every_connection() {
    let endpoint = Endpoint::resolve("127.0.0.1", "0").unwrap();
    let mut acceptor = Acceptor::new();
    acceptor.open(endpoint.protocol()).unwrap();
    acceptor.set_option(SocketOption::ReuseAddress(true)).unwrap();
    acceptor.bind(&endpoint).unwrap();
    acceptor.listen(8).unwrap();
    let addr = acceptor.local_addr().unwrap();

    let mut service = StreamService::new();
    let mut handler = Recorder::default();
    let token = service.add_acceptor(acceptor).unwrap();
    assert!(service.acceptor(token).is_some());

    let clients: Vec<TcpStream> = (0..3).map(|_| TcpStream::connect(addr).unwrap()).collect();
    turn_until(&mut service, &mut handler, |h| h.accepted.len() == 3);

    for client in &clients {
        let local = client.local_addr().unwrap();
        assert!(handler.events.contains(&Event::Accepted(Some(local))));
    }
}

#[test]
fn test_closed_acceptor_is_refused() {
    let mut service = StreamService::new();
    assert!(service.add_acceptor(Acceptor::new()).is_err());
}

#[test]
fn test_silent_socket_times_out_while_another_keeps_the_reactor_busy() {
    let timeout = Duration::from_millis(300);
    let mut service = StreamService::with_idle_timeout(timeout);
    let (mut busy_client, busy) = Socket::pair().unwrap();
    let (_silent_client, silent) = Socket::pair().unwrap();

    let busy = service.add(&busy).unwrap();
    let silent = service.add(&silent).unwrap();
    service.async_read(busy);
    service.async_read(silent);
    let mut handler = Recorder {
        busy: Some((busy, Duration::from_millis(50))),
        ..Recorder::default()
    };

    // Never read, so the busy socket stays ready on every turn.
    busy_client.write(b"data").unwrap();
    let started = Instant::now();
    turn_until(&mut service, &mut handler, |h| !h.events.is_empty());
    let fired = started.elapsed();

    assert_eq!(handler.events, [Event::Failed(silent, ReadFailure::TimedOut)]);
    assert!(fired >= timeout, "fired after {fired:?}");
    assert!(fired < timeout * 2, "fired after {fired:?}");
    assert!(service.contains(busy));
    assert!(!service.contains(silent));
}

#[test]
fn test_unarmed_ready_socket_does_not_wake_the_reactor() {
    let timeout = Duration::from_millis(200);
    let mut service = StreamService::with_idle_timeout(timeout);
    let mut handler = Recorder::default();
    let (mut idle_client, idle) = Socket::pair().unwrap();
    let (_silent_client, silent) = Socket::pair().unwrap();

    let idle = service.add(&idle).unwrap();
    let silent = service.add(&silent).unwrap();
    service.async_read(silent);
    idle_client.write(b"x").unwrap();

    let started = Instant::now();
    let mut turns = 0;
    while handler.events.is_empty() {
        assert!(started.elapsed() < Duration::from_secs(5), "timeout never fired");
        assert_eq!(service.turn(&mut handler).unwrap(), None);
        turns += 1;
    }

    assert!(turns <= 3, "reactor spun {turns} times");
    assert!(started.elapsed() >= timeout);
    assert_eq!(handler.events, [Event::Failed(silent, ReadFailure::TimedOut)]);
    assert!(service.contains(idle));
}

#[test]
fn test_added_socket_is_not_watched_until_armed() {
    let mut service = StreamService::new();
    let mut handler = Recorder::default();
    let (mut client, server) = Socket::pair().unwrap();

    service.add(&server).unwrap();
    client.write(b"x").unwrap();

    // Nothing armed and nothing listening.
    assert_eq!(service.turn(&mut handler).unwrap(), Some(0));
    assert!(handler.events.is_empty());
}

#[test]
fn test_pending_write_is_dispatched_once() {
    let mut service = StreamService::new();
    let mut handler = Recorder::default();
    let (mut client, mut server) = Socket::pair().unwrap();

    let token = service.add(&server).unwrap();
    assert!(service.async_write(token));
    turn_until(&mut service, &mut handler, |h| !h.events.is_empty());
    assert_eq!(handler.events, [Event::Writable(token)]);

    assert_eq!(server.try_write(b"ping").unwrap(), Some(4));
    let mut buf = [0u8; 4];
    assert_eq!(client.read(&mut buf).unwrap(), 4);
    assert_eq!(&buf, b"ping");

    // Consumed: with nothing re-armed the service has nothing to wait on.
    assert_eq!(service.turn(&mut handler).unwrap(), Some(0));
    assert_eq!(handler.events.len(), 1);
    assert!(service.contains(token));
}

#[test]
fn test_full_socket_becomes_writable_after_peer_drains() {
    let mut service = StreamService::new();
    let mut handler = Recorder::default();
    let (mut client, mut server) = Socket::pair().unwrap();

    let chunk = [7u8; 4096];
    let mut queued = 0;
    while let Some(n) = server.try_write(&chunk).unwrap() {
        queued += n;
    }
    assert!(queued > 0);

    let token = service.add(&server).unwrap();
    service.async_write(token);

    let reader = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let mut sink = vec![0u8; queued];
        client.read(&mut sink).unwrap()
    });

    turn_until(&mut service, &mut handler, |h| !h.events.is_empty());
    assert_eq!(handler.events, [Event::Writable(token)]);
    assert!(server.try_write(b"more").unwrap().is_some());

    assert_eq!(reader.join().unwrap(), queued);
}
