extern crate futures;
extern crate tk_bufstream;
extern crate tk_http_proxy;
#[macro_use] extern crate matches;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use futures::{Async, Future};
use tk_bufstream::MockData;

use tk_http_proxy::origin::{self, Dispatcher, Origin, Reply, ReplyEvent};
use tk_http_proxy::origin::WorkerLink;
use tk_http_proxy::ua::{Config, Proto};
use tk_http_proxy::{HeaderList, Request};

const BANNER: &'static str = "test-proxy/1";


/// What the stub origin does with one submitted request.
enum Script {
    /// Deliver these events, then complete normally
    Events(Vec<ReplyEvent>),
    /// Drop the link without delivering a complete reply
    Crash,
}

type Submitted = Rc<RefCell<Vec<(Request, HeaderList, Option<Vec<u8>>)>>>;

/// Scripted stand-in for the origin side (plays the role the test
/// origin server has in a live deployment).
struct Stub {
    scripts: Rc<RefCell<VecDeque<Script>>>,
    submitted: Submitted,
}

struct StubOrigin {
    scripts: Rc<RefCell<VecDeque<Script>>>,
    submitted: Submitted,
}

impl Stub {
    fn new(scripts: Vec<Script>) -> (Stub, Submitted) {
        let submitted: Submitted = Rc::new(RefCell::new(Vec::new()));
        let stub = Stub {
            scripts: Rc::new(RefCell::new(scripts.into_iter().collect())),
            submitted: submitted.clone(),
        };
        (stub, submitted)
    }
}

impl Dispatcher for Stub {
    type Origin = StubOrigin;
    fn get_closest_origin(&mut self) -> Result<StubOrigin, origin::Error> {
        Ok(StubOrigin {
            scripts: self.scripts.clone(),
            submitted: self.submitted.clone(),
        })
    }
}

impl Origin for StubOrigin {
    fn submit(self, request: Request, headers: HeaderList,
              body: Option<Vec<u8>>)
        -> Result<WorkerLink, origin::Error>
    {
        self.submitted.borrow_mut().push((request, headers, body));
        let script = self.scripts.borrow_mut().pop_front()
            .expect("a script per forwarded request");
        let (tx, rx) = origin::link();
        match script {
            Script::Events(events) => {
                for event in events {
                    match event {
                        ReplyEvent::Reply(r) => tx.reply(r),
                        ReplyEvent::Chunk(c) => tx.chunk(c),
                        ReplyEvent::Trailer(t) => tx.trailer(t),
                    }.expect("link open");
                }
            }
            Script::Crash => {}
        }
        Ok(rx)
    }
}

/// Dispatcher with no origins at all.
struct NoOrigins;

impl Dispatcher for NoOrigins {
    type Origin = StubOrigin;
    fn get_closest_origin(&mut self) -> Result<StubOrigin, origin::Error> {
        Err(origin::Error::Unavailable)
    }
}

fn reply(code: u16, reason: &str, headers: &[(&str, &str)],
         body: &[u8]) -> Script
{
    let mut list = HeaderList::new();
    for &(name, value) in headers {
        list.add(name, value.as_bytes());
    }
    Script::Events(vec![ReplyEvent::Reply(Reply {
        code: code,
        reason: Some(reason.to_string()),
        headers: list,
        body: Some(body.to_vec()),
    })])
}

fn proto(mock: &MockData, scripts: Vec<Script>)
    -> (Proto<MockData, Stub>, Submitted)
{
    let (stub, submitted) = Stub::new(scripts);
    let proto = Proto::new(mock.clone(), BANNER, stub,
        &Arc::new(Config::new()));
    (proto, submitted)
}

fn output(mock: &MockData) -> String {
    String::from_utf8_lossy(&mock.output(..)).to_string()
}

#[test]
fn request_is_forwarded_with_host_and_port() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![
        reply(200, "OK", &[], b""),
    ]);
    mock.add_input("GET / HTTP/1.1\r\nHost: h:8080\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    {
        let reqs = submitted.borrow();
        assert_eq!(reqs.len(), 1);
        let &(ref req, ref headers, ref body) = &reqs[0];
        assert_eq!(req.method, "GET");
        assert_eq!(req.host.as_ref().unwrap(), "h");
        assert_eq!(req.port, 8080);
        assert_eq!(req.path.as_ref().unwrap(), "/");
        assert_eq!(headers.get("Host"), Some(&b"h:8080"[..]));
        assert!(body.is_none());
    }
    assert_eq!(output(&mock),
        "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    // HTTP/1.1 without Connection: close keeps the socket open
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
}

#[test]
fn options_asterisk_is_answered_locally() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![]);
    mock.add_input("OPTIONS * HTTP/1.1\r\nHost: h\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert!(submitted.borrow().is_empty());
    assert_eq!(output(&mock), concat!(
        "HTTP/1.1 204 No Content\r\n",
        "Server: test-proxy/1\r\n",
        "Allow: OPTIONS, GET, HEAD, POST, PUT, DELETE, TRACE\r\n",
        "\r\n"));
}

#[test]
fn options_max_forwards_is_decremented_once() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![
        reply(200, "OK", &[], b""),
    ]);
    mock.add_input(
        "OPTIONS /x HTTP/1.1\r\nHost: h\r\nMax-Forwards: 3\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    let reqs = submitted.borrow();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].1.get("Max-Forwards"), Some(&b"2"[..]));
}

#[test]
fn options_max_forwards_zero_never_forwards() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![]);
    mock.add_input(
        "OPTIONS /x HTTP/1.1\r\nHost: h\r\nMax-Forwards: 0\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert!(submitted.borrow().is_empty());
    assert!(output(&mock).starts_with("HTTP/1.1 204 No Content\r\n"));
}

#[test]
fn connect_is_rejected() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![]);
    mock.add_input(
        "CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert!(submitted.borrow().is_empty());
    assert_eq!(output(&mock),
        "HTTP/1.1 501 Not Implemented\r\nContent-Length: 0\r\n\r\n");
}

#[test]
fn put_body_is_forwarded_byte_for_byte() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![
        reply(201, "Created", &[("Etag", "\"abc123\"")], b""),
    ]);
    mock.add_input(
        "PUT /r HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    {
        let reqs = submitted.borrow();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].0.method, "PUT");
        assert_eq!(reqs[0].2.as_ref().unwrap(), b"hello");
    }
    assert_eq!(output(&mock), concat!(
        "HTTP/1.1 201 Created\r\n",
        "Etag: \"abc123\"\r\n",
        "Content-Length: 0\r\n",
        "\r\n"));
}

#[test]
fn body_split_over_several_reads() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![
        reply(200, "OK", &[], b""),
    ]);
    mock.add_input(
        "PUT /r HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhel");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert!(submitted.borrow().is_empty());
    mock.add_input("lo");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    let reqs = submitted.borrow();
    assert_eq!(reqs[0].2.as_ref().unwrap(), b"hello");
}

#[test]
fn chunked_reply_is_streamed_with_boundaries_kept() {
    let mock = MockData::new();
    let mut headers = HeaderList::new();
    headers.add("Transfer-Encoding", &b"chunked"[..]);
    let script = Script::Events(vec![
        ReplyEvent::Reply(Reply {
            code: 200,
            reason: Some("OK".to_string()),
            headers: headers,
            body: None,
        }),
        ReplyEvent::Chunk(b"ab".to_vec()),
        ReplyEvent::Chunk(b"cd".to_vec()),
        ReplyEvent::Trailer(HeaderList::new()),
    ]);
    let (mut proto, _submitted) = proto(&mock, vec![script]);
    mock.add_input("GET / HTTP/1.1\r\nHost: h\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert_eq!(output(&mock), concat!(
        "HTTP/1.1 200 OK\r\n",
        "Transfer-Encoding: chunked\r\n",
        "\r\n",
        "2\r\nab\r\n2\r\ncd\r\n0\r\n\r\n"));
}

#[test]
fn chunked_reply_trailer_fields_are_emitted() {
    let mock = MockData::new();
    let mut headers = HeaderList::new();
    headers.add("Transfer-Encoding", &b"chunked"[..]);
    let mut trailer = HeaderList::new();
    trailer.add("X-Checksum", &b"d0b425e"[..]);
    let script = Script::Events(vec![
        ReplyEvent::Reply(Reply {
            code: 200,
            reason: Some("OK".to_string()),
            headers: headers,
            body: None,
        }),
        ReplyEvent::Chunk(b"hello".to_vec()),
        ReplyEvent::Trailer(trailer),
    ]);
    let (mut proto, _submitted) = proto(&mock, vec![script]);
    mock.add_input("GET / HTTP/1.1\r\nHost: h\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert_eq!(output(&mock), concat!(
        "HTTP/1.1 200 OK\r\n",
        "Transfer-Encoding: chunked\r\n",
        "\r\n",
        "5\r\nhello\r\n0\r\nX-Checksum: d0b425e\r\n\r\n"));
}

#[test]
fn bad_host_port_is_answered_with_400() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![]);
    mock.add_input("GET / HTTP/1.1\r\nHost: h:oops\r\nAccept: */*\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert!(submitted.borrow().is_empty());
    assert_eq!(output(&mock),
        "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
}

#[test]
fn origin_crash_becomes_500() {
    let mock = MockData::new();
    let (mut proto, _submitted) = proto(&mock, vec![Script::Crash]);
    mock.add_input("GET / HTTP/1.1\r\nHost: h\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert_eq!(output(&mock),
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
}

#[test]
fn dispatch_failure_terminates_the_handler() {
    let mock = MockData::new();
    let mut proto = Proto::new(mock.clone(), BANNER, NoOrigins,
        &Arc::new(Config::new()));
    mock.add_input("GET / HTTP/1.1\r\nHost: h\r\n\r\n");
    assert!(proto.poll().is_err());
}

#[test]
fn http10_closes_after_one_response() {
    let mock = MockData::new();
    let (mut proto, _submitted) = proto(&mock, vec![
        reply(200, "OK", &[], b"done"),
    ]);
    mock.add_input("GET / HTTP/1.0\r\nHost: h\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::Ready(()));
    assert_eq!(output(&mock), concat!(
        "HTTP/1.0 200 OK\r\n",
        "Content-Length: 4\r\n",
        "Connection: close\r\n",
        "\r\n",
        "done"));
}

#[test]
fn connection_close_is_honored() {
    let mock = MockData::new();
    let (mut proto, _submitted) = proto(&mock, vec![
        reply(200, "OK", &[], b""),
    ]);
    mock.add_input(
        "GET / HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::Ready(()));
    let out = output(&mock);
    assert!(out.contains("Connection: close\r\n"), "got: {}", out);
}

#[test]
fn pipelined_replies_come_back_in_request_order() {
    let mock = MockData::new();
    let (mut proto, submitted) = proto(&mock, vec![
        reply(200, "OK", &[], b"one"),
        reply(200, "OK", &[], b"two"),
    ]);
    mock.add_input(concat!(
        "GET /a HTTP/1.1\r\nHost: h\r\n\r\n",
        "GET /b HTTP/1.1\r\nHost: h\r\n\r\n"));
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    {
        let reqs = submitted.borrow();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].0.path.as_ref().unwrap(), "/a");
        assert_eq!(reqs[1].0.path.as_ref().unwrap(), "/b");
    }
    assert_eq!(output(&mock), concat!(
        "HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\none",
        "HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\ntwo"));
}

#[test]
fn reply_length_is_normalized_to_the_body() {
    // an origin body read to EOF arrives without Content-Length; the
    // client still gets a correctly framed response
    let mock = MockData::new();
    let (mut proto, _submitted) = proto(&mock, vec![
        reply(200, "OK", &[("Content-Type", "text/plain")], b"hello"),
    ]);
    mock.add_input("GET / HTTP/1.1\r\nHost: h\r\n\r\n");
    assert_matches!(proto.poll().unwrap(), Async::NotReady);
    assert_eq!(output(&mock), concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: text/plain\r\n",
        "Content-Length: 5\r\n",
        "\r\n",
        "hello"));
}

#[test]
fn oversized_head_is_rejected() {
    let mock = MockData::new();
    let (stub, submitted) = Stub::new(vec![]);
    let mut proto = Proto::new(mock.clone(), BANNER, stub,
        &Config::new().max_request_head_size(32).done());
    mock.add_input(concat!(
        "GET / HTTP/1.1\r\n",
        "Host: h\r\n",
        "X-Padding: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n",
        "\r\n"));
    assert_matches!(proto.poll().unwrap(), Async::Ready(()));
    assert!(submitted.borrow().is_empty());
    assert!(output(&mock).starts_with("HTTP/1.1 400 Bad Request\r\n"));
}
