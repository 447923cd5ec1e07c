//! Shared utilities for integration tests.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use l7_balancer::load_balancer::SharedStrategy;
use l7_balancer::net::{Listener, ListenerHandle};
use l7_balancer::proxy::{ConnectionHandler, DirectResponder, RequestForwarder};

/// Start a direct-mode server on an ephemeral loopback port.
pub fn start_direct_backend() -> ListenerHandle {
    let handler = ConnectionHandler::Direct(
        DirectResponder::new(0).with_read_timeout(Some(Duration::from_secs(5))),
    );
    Listener::bind("127.0.0.1:0", 4, handler).unwrap().spawn().unwrap()
}

/// Start a balancer on an ephemeral loopback port over `strategy`.
pub fn start_balancer(strategy: SharedStrategy, workers: usize) -> ListenerHandle {
    let forwarder = RequestForwarder::new(strategy)
        .with_connect_timeout(Some(Duration::from_secs(2)))
        .with_read_timeout(Some(Duration::from_secs(5)));
    Listener::bind("127.0.0.1:0", workers, ConnectionHandler::Balancer(forwarder))
        .unwrap()
        .spawn()
        .unwrap()
}

/// A backend that accepts connections and closes them without answering.
#[allow(dead_code)]
pub fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => drop(stream),
                Err(_) => break,
            }
        }
    });
    addr
}

/// A backend serving one connection: it reads the request head, reports it
/// on `head_seen`, writes a status line and then holds the response open
/// until `release` fires.
#[allow(dead_code)]
pub fn start_held_backend(head_seen: Sender<()>, release: Receiver<()>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).unwrap() == 0 || line.trim_end().is_empty() {
                break;
            }
        }
        head_seen.send(()).unwrap();

        stream.write_all(b"HTTP/1.1 200 OK\n\n").unwrap();
        stream.flush().unwrap();
        let _ = release.recv();
        stream.write_all(b"held response\n").unwrap();
    });
    addr
}

/// A loopback address nothing is listening on.
#[allow(dead_code)]
pub fn dead_address() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap()
}

/// Send `request`, half-close, and collect everything until EOF.
///
/// A reset from the peer ends the read like EOF; callers assert on bytes.
pub fn send_request(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(request).unwrap();
    let _ = stream.shutdown(Shutdown::Write);

    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => break,
            Err(e) => panic!("read failed: {}", e),
        }
    }
    received
}

/// `send_request` for a simple GET, returned as text.
pub fn get(addr: SocketAddr, key: &str) -> String {
    let request = format!("{}\nHost: lb\n\n", key);
    String::from_utf8(send_request(addr, request.as_bytes())).unwrap()
}

/// Poll `condition` until it holds or two seconds pass.
#[allow(dead_code)]
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
