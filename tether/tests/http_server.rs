use tether::Failure;
use tether::http::{HttpServer, MAX_HEAD_SIZE};
use tether::testing::TestHarness;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PAGE: &str = "<html><body>Hello</body></html>";

fn exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(request).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

#[tether::test]
fn serves_a_page_and_sees_request_headers(harness: &TestHarness) -> Result<(), Failure> {
    let server = HttpServer::new(harness.handle());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let headers = seen.clone();
    server.request_handler(move |request| {
        assert_eq!(request.method(), "GET");
        assert_eq!(request.uri(), "/index.html");
        assert_eq!(request.version(), "HTTP/1.1");

        headers.lock().unwrap().extend(
            request
                .headers()
                .map(|(name, value)| (name.to_owned(), value.to_owned())),
        );

        request
            .response
            .put_header("Content-Type", "text/html; charset=UTF-8")
            .end(PAGE);
        Ok(())
    });

    let addr = server.listen("127.0.0.1:0").unwrap();
    let response = exchange(
        addr,
        b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nX-Trace: abc\r\n\r\n",
    );

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(response.contains("Content-Type: text/html; charset=UTF-8\r\n"));
    assert!(response.contains(&format!("Content-Length: {}\r\n", PAGE.len())));
    assert!(response.ends_with(PAGE));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("Host".to_owned(), "localhost".to_owned()),
            ("X-Trace".to_owned(), "abc".to_owned()),
        ]
    );

    harness.await_close(&server)
}

#[tether::test]
fn header_lookup_ignores_case(harness: &TestHarness) -> Result<(), Failure> {
    let server = HttpServer::new(harness.handle());

    server.request_handler(|request| {
        let agent = request.header("user-agent").unwrap_or("none").to_owned();
        request.response.status(201).end(agent);
        Ok(())
    });

    let addr = server.listen("127.0.0.1:0").unwrap();
    let response = exchange(addr, b"POST /items HTTP/1.0\r\nUser-Agent: probe/1\r\n\r\n");

    assert_eq!(status_line(&response), "HTTP/1.1 201 Created");
    assert!(response.ends_with("probe/1"));

    harness.await_close(&server)
}

#[tether::test]
fn malformed_requests_get_a_400(harness: &TestHarness) -> Result<(), Failure> {
    let server = HttpServer::new(harness.handle());
    server.request_handler(|request| {
        request.response.end("unreachable");
        Ok(())
    });

    let addr = server.listen("127.0.0.1:0").unwrap();

    let response = exchange(addr, b"NONSENSE\r\n\r\n");
    assert_eq!(status_line(&response), "HTTP/1.1 400 Bad Request");

    let response = exchange(addr, b"GET / HTTP/1.1\r\nno colon here\r\n\r\n");
    assert_eq!(status_line(&response), "HTTP/1.1 400 Bad Request");

    let mut oversized = b"GET / HTTP/1.1\r\nX-Padding: ".to_vec();
    oversized.extend(std::iter::repeat_n(b'a', MAX_HEAD_SIZE + 1));
    oversized.extend_from_slice(b"\r\n\r\n");

    // unread request bytes may turn the close into a reset
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(&oversized).unwrap();

    let mut response = Vec::new();
    match stream.read_to_end(&mut response) {
        Ok(_) => assert!(response.starts_with(b"HTTP/1.1 400 Bad Request\r\n")),
        Err(err) => assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset),
    }

    harness.await_close(&server)
}

#[tether::test]
fn requests_without_a_handler_get_a_404(harness: &TestHarness) -> Result<(), Failure> {
    let server = HttpServer::new(harness.handle());
    let addr = server.listen("127.0.0.1:0").unwrap();

    let response = exchange(addr, b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(status_line(&response), "HTTP/1.1 404 Not Found");

    harness.await_close(&server)
}

#[tether::test]
fn failing_handlers_answer_500_and_report(harness: &TestHarness) -> Result<(), Failure> {
    let server = HttpServer::new(harness.handle());
    server.request_handler(|_| Err(Failure::new("database unavailable")));

    let addr = server.listen("127.0.0.1:0").unwrap();
    let response = exchange(addr, b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");

    let failure = harness.throw_failures().unwrap_err();
    assert_eq!(failure.message(), "database unavailable");

    harness.await_close(&server)
}

#[tether::test]
fn handlers_may_end_the_response_before_failing(harness: &TestHarness) -> Result<(), Failure> {
    let server = HttpServer::new(harness.handle());
    server.request_handler(|request| {
        request.response.status(202).end("accepted");
        Err(Failure::new("audit log unavailable"))
    });

    let addr = server.listen("127.0.0.1:0").unwrap();
    let response = exchange(addr, b"GET / HTTP/1.1\r\n\r\n");
    assert!(status_line(&response).starts_with("HTTP/1.1 202"));

    // the response can reach the client before the failure is reported
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while harness.failures().is_empty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    let failure = harness.throw_failures().unwrap_err();
    assert_eq!(failure.message(), "audit log unavailable");

    harness.await_close(&server)
}

#[tether::test]
fn headers_cannot_inject_lines(harness: &TestHarness) -> Result<(), Failure> {
    let server = HttpServer::new(harness.handle());

    server.request_handler(|request| {
        request
            .response
            .put_header("X-Echo", "ok\r\nSet-Cookie: session=stolen")
            .put_header("X-Split\nSet-Cookie", "session=stolen")
            .put_header("X-Kept", "yes")
            .end("done");
        Ok(())
    });

    let addr = server.listen("127.0.0.1:0").unwrap();
    let response = exchange(addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(response.contains("X-Kept: yes\r\n"));
    assert!(!response.contains("Set-Cookie"));
    assert!(!response.contains("X-Echo"));
    assert!(response.ends_with("done"));

    harness.await_close(&server)
}
