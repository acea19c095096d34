use tether::close::AsyncCloseable;
use tether::net::{NetServer, NetSocket};
use tether::testing::TestHarness;
use tether::{CompletionLatch, Error, Failure, verify};

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn echo(socket: NetSocket) -> Result<(), Failure> {
    let context = socket.context().clone();

    let _ = context.spawn(async move {
        let mut buffer = [0u8; 64];

        loop {
            match socket.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if socket.write_all(&buffer[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    Ok(())
}

fn connect(server: &NetServer) -> TcpStream {
    let stream = TcpStream::connect(server.local_addr().unwrap()).unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();
    stream
}

#[tether::test]
fn echoes_what_clients_send(harness: &TestHarness) -> Result<(), Failure> {
    let server = NetServer::new(harness.handle());
    server.connect_handler(echo);
    server.listen("127.0.0.1:0").unwrap();

    let mut clients: Vec<_> = (0..3).map(|_| connect(&server)).collect();

    for (i, client) in clients.iter_mut().enumerate() {
        let message = format!("ping-{i}");
        client.write_all(message.as_bytes()).unwrap();

        let mut reply = vec![0u8; message.len()];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(reply, message.as_bytes());
    }

    harness.await_close(&server)
}

#[tether::test(worker_threads = 2)]
fn close_handler_runs_exactly_once(harness: &TestHarness) {
    let server = NetServer::new(harness.handle());
    server.listen("127.0.0.1:0").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let latch = CompletionLatch::new();

    let counter = calls.clone();
    let signal = latch.clone();
    server.close(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        signal.complete();
    }));

    assert!(latch.wait(WAIT), "server did not close in time");

    thread::sleep(Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tether::test]
fn closing_twice_completes_both_times(harness: &TestHarness) -> Result<(), Failure> {
    let server = NetServer::new(harness.handle());
    server.listen("127.0.0.1:0").unwrap();

    harness.await_close(&server)?;
    harness.await_close(&server)
}

#[tether::test]
fn closing_an_idle_server_completes(harness: &TestHarness) -> Result<(), Failure> {
    let server = NetServer::new(harness.handle());
    harness.await_close(&server)
}

#[tether::test]
fn listen_is_refused_twice_and_after_close(harness: &TestHarness) -> Result<(), Failure> {
    let server = NetServer::new(harness.handle());
    server.listen("127.0.0.1:0").unwrap();

    assert!(matches!(
        server.listen("127.0.0.1:0"),
        Err(Error::InvalidState(_))
    ));

    harness.await_close(&server)?;

    assert!(matches!(
        server.listen("127.0.0.1:0"),
        Err(Error::InvalidState(_))
    ));
    Ok(())
}

#[tether::test]
fn close_shuts_down_live_connections(harness: &TestHarness) -> Result<(), Failure> {
    let server = NetServer::new(harness.handle());
    server.connect_handler(echo);
    server.listen("127.0.0.1:0").unwrap();

    let mut client = connect(&server);
    client.write_all(b"hi").unwrap();

    let mut reply = [0u8; 2];
    client.read_exact(&mut reply).unwrap();

    harness.await_close(&server)?;

    let mut rest = Vec::new();
    let outcome = client.read_to_end(&mut rest);
    assert!(matches!(outcome, Ok(0)) || outcome.is_err(), "connection still open");

    // the listening socket is gone
    assert!(TcpStream::connect(server.local_addr().unwrap()).is_err());
    Ok(())
}

#[tether::test(worker_threads = 3)]
fn each_connection_runs_on_its_own_context(harness: &TestHarness) -> Result<(), Failure> {
    let server = NetServer::new(harness.handle());
    let registry = harness.registry().clone();
    let sink = harness.sink();
    let server_context = server.context().id();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let contexts = seen.clone();
    server.connect_handler(move |socket| {
        verify!(
            sink,
            registry.assert_affinity(socket.context()).is_ok(),
            "connect handler ran off its connection context"
        );
        verify!(sink, socket.context().id() != server_context);

        contexts.lock().unwrap().push(socket.context().id());
        echo(socket)
    });
    server.listen("127.0.0.1:0").unwrap();

    for _ in 0..4 {
        let mut client = connect(&server);
        client.write_all(b"ok").unwrap();

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).unwrap();
    }

    harness.await_close(&server)?;

    let mut ids = seen.lock().unwrap().clone();
    assert_eq!(ids.len(), 4);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    harness.throw_failures()
}

fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;

    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting until {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

#[tether::test(worker_threads = 2)]
fn connection_contexts_are_retired_when_connections_end(
    harness: &TestHarness,
) -> Result<(), Failure> {
    let server = NetServer::new(harness.handle());
    let registry = harness.registry().clone();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let contexts = seen.clone();
    server.connect_handler(move |socket| {
        contexts.lock().unwrap().push(socket.context().id());
        echo(socket)
    });
    server.listen("127.0.0.1:0").unwrap();

    for _ in 0..50 {
        let mut client = connect(&server);
        client.write_all(b"x").unwrap();

        let mut reply = [0u8; 1];
        client.read_exact(&mut reply).unwrap();
    }

    let ids = seen.lock().unwrap().clone();
    assert_eq!(ids.len(), 50);

    eventually("connection contexts are retired", || {
        ids.iter().all(|id| !registry.is_registered(*id))
    });
    assert!(registry.is_registered(server.context().id()));

    harness.await_close(&server)
}

#[tether::test]
fn dropping_a_server_stops_accepting(harness: &TestHarness) {
    let server = NetServer::new(harness.handle());
    let registry = harness.registry().clone();
    let server_context = server.context().id();

    server.connect_handler(echo);
    let addr = server.listen("127.0.0.1:0").unwrap();
    assert!(registry.is_registered(server_context));

    drop(server);

    eventually("the listener is closed", || TcpStream::connect(addr).is_err());
    eventually("the server context is retired", || {
        !registry.is_registered(server_context)
    });
}
