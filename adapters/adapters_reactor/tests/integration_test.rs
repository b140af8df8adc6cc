//! Integration tests for adapters_reactor crate
//!
//! These tests drive the poll reactor through the `Reactor` trait object, the
//! way socket backends use it.

#![cfg(unix)]

use adapters_reactor::*;
use std::cell::RefCell;
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

#[test]
fn test_echo_through_trait_object() {
    let poll = Rc::new(PollReactor::new());
    let reactor: Rc<dyn Reactor> = poll.clone();

    let (server, mut client) = UnixStream::pair().unwrap();
    server.set_nonblocking(true).unwrap();
    let server = Rc::new(RefCell::new(server));

    let received = Rc::new(RefCell::new(Vec::new()));
    let (stream, sink) = (server.clone(), received.clone());
    let token = reactor
        .add_file_descriptor(
            server.borrow().as_raw_fd(),
            Box::new(move |ready| {
                assert!(ready.contains(Readiness::READ));
                let mut buf = [0u8; 16];
                let n = stream.borrow_mut().read(&mut buf).unwrap();
                sink.borrow_mut().extend_from_slice(&buf[..n]);
                stream.borrow_mut().write_all(&buf[..n]).unwrap();
            }),
        )
        .unwrap();
    reactor.set_file_descriptor_events(token, Readiness::READ);

    client.write_all(b"ping").unwrap();
    let ran = poll.run_once(Some(Duration::from_secs(2))).unwrap();
    assert_eq!(ran, 1);
    assert_eq!(received.borrow().as_slice(), b"ping");

    let mut echo = [0u8; 4];
    client.read_exact(&mut echo).unwrap();
    assert_eq!(&echo, b"ping");

    reactor.remove_file_descriptor(token);
    assert_eq!(poll.registrations(), 0);
}

#[test]
fn test_timeout_with_nothing_ready() {
    let poll = PollReactor::new();
    let (a, _b) = UnixStream::pair().unwrap();
    let token = poll
        .add_file_descriptor(a.as_raw_fd(), Box::new(|_| panic!("nothing is readable")))
        .unwrap();
    poll.set_file_descriptor_events(token, Readiness::READ);
    assert_eq!(poll.run_once(Some(Duration::from_millis(10))).unwrap(), 0);
    assert_eq!(poll.info().active, 1);
}
