use std::str::from_utf8;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use enums::{Status, Version};
use headers::{self, HeaderList};
use origin::Reply;
use request::Request;
use super::error::Error;


/// Methods we are willing to pass through or answer.
const ALLOW: &'static str = "OPTIONS, GET, HEAD, POST, PUT, DELETE, TRACE";


/// Where a request line pointed the proxy at.
#[derive(Debug)]
pub enum RequestTarget<'a> {
    /// A plain path like `/index.html?q=1` (origin-form)
    Origin(&'a str),
    /// A complete `http://host:port/path` URL; the path part may be
    /// empty here
    Absolute { scheme: &'a str, authority: &'a str, path: &'a str },
    /// A bare `host:port`, the form CONNECT clients send
    Authority(&'a str),
    /// The server-wide `*` used by OPTIONS
    Asterisk,
}

/// The schemes an absolute-form target may name through this proxy.
const SCHEMES: &'static [&'static str] = &["http", "https"];

// An authority cannot contain a path, query or fragment delimiter, and
// HTTP has no user info either, so `@` ends it as well.
fn is_authority_end(&c: &u8) -> bool {
    matches!(c, b'/' | b'?' | b'#' | b'@')
}

// Scheme names are ASCII, so slicing the prefix off is always safe.
fn has_scheme_prefix(s: &str, scheme: &str) -> bool {
    let bytes = s.as_bytes();
    let end = scheme.len() + "://".len();
    bytes.len() > end
        && bytes[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
        && bytes[scheme.len()..end] == b"://"[..]
}

// Cuts `authority[path]` in two; an absolute target with nothing in the
// authority position is nonsense.
fn split_authority(rest: &str) -> Option<(&str, &str)> {
    let end = rest.as_bytes().iter()
        .position(is_authority_end)
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some((&rest[..end], &rest[end..]))
}

impl<'a> RequestTarget<'a> {
    pub fn parse(s: &'a str) -> Option<RequestTarget<'a>> {
        use self::RequestTarget::*;
        if s.is_empty() {
            return None;
        }
        if s.as_bytes()[0] == b'/' {
            return Some(Origin(s));
        }
        if s == "*" {
            return Some(Asterisk);
        }
        for &scheme in SCHEMES {
            if has_scheme_prefix(s, scheme) {
                let rest = &s[scheme.len() + "://".len()..];
                return split_authority(rest).map(|(authority, path)| {
                    Absolute {
                        scheme: scheme,
                        authority: authority,
                        path: path,
                    }
                });
            }
        }
        if s.as_bytes().iter().any(is_authority_end) {
            return None;
        }
        Some(Authority(s))
    }
}

/// What to do with a request whose head is complete.
#[derive(Debug)]
pub enum HeadDecision {
    /// Answer locally with this reply (OPTIONS terminus, errors)
    Respond(Reply),
    /// Hand over to the origin side, no body follows
    Forward,
    /// Read this many raw body bytes, then hand over
    ReadBody(usize),
}

/// The head accumulator: a request being received.
///
/// Collects the resolved target, the header list and the body length
/// announcement; a semantic error found half-way (a bad `Host` port)
/// latches a status code while the rest of the head is still absorbed.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: Request,
    pub headers: HeaderList,
    pub expected: Option<usize>,
    pub latched: Option<Status>,
    seen_content_length: bool,
    connection_close: bool,
}

impl PendingRequest {
    /// Start a request from a parsed request line.
    pub fn start(method: &str, target: &str, minor_version: u8)
        -> Result<PendingRequest, Error>
    {
        use self::RequestTarget::*;
        let version = if minor_version == 1 { Version::Http11 }
                      else { Version::Http10 };
        let mut request = Request {
            method: method.to_string(),
            scheme: None,
            host: None,
            port: 80,
            path: None,
            version: version,
        };
        match RequestTarget::parse(target).ok_or(Error::BadRequestTarget)? {
            Origin(path) => {
                request.path = Some(path.to_string());
            }
            Absolute { scheme, authority, path } => {
                let (host, port) = match split_port(authority) {
                    Some(parts) => parts,
                    None => return Err(Error::BadRequestTarget),
                };
                request.scheme = Some(scheme.to_string());
                request.host = Some(host.to_string());
                request.port = port;
                request.path = Some(
                    if path.is_empty() { "/".to_string() }
                    else { path.to_string() });
            }
            // final disposition is deferred to end of headers
            Authority(_) => {}
            Asterisk => {
                request.path = Some("*".to_string());
            }
        }
        Ok(PendingRequest {
            request: request,
            headers: HeaderList::new(),
            expected: None,
            latched: None,
            seen_content_length: false,
            connection_close: false,
        })
    }

    /// Absorb one header field.
    ///
    /// `Content-Length` and `Host` get interpreted on the way; every
    /// field lands in the accumulated list regardless, so the request
    /// can be forwarded as received.
    pub fn header(&mut self, name: &str, value: &[u8])
        -> Result<(), Error>
    {
        if name.eq_ignore_ascii_case("Content-Length") {
            if self.seen_content_length {
                return Err(Error::DuplicateContentLength);
            }
            self.seen_content_length = true;
            if value != b"0" {
                let n = from_utf8(value).ok()
                    .and_then(|s| s.trim().parse().ok())
                    .ok_or(Error::ContentLengthInvalid)?;
                self.expected = Some(n);
            }
        } else if name.eq_ignore_ascii_case("Host") {
            if self.request.host.is_none() {
                match from_utf8(value).ok().and_then(split_port) {
                    Some((host, port)) => {
                        self.request.host = Some(host.to_string());
                        self.request.port = port;
                    }
                    None => {
                        // absorb the rest of the head, answer 400 then
                        self.latched = Some(Status::BadRequest);
                    }
                }
            }
        } else if name.eq_ignore_ascii_case("Connection") {
            if value.split(|&x| x == b',').any(headers::is_close) {
                self.connection_close = true;
            }
        }
        self.headers.add(name, value);
        Ok(())
    }

    /// End-of-headers dispatch.
    pub fn end_of_headers(&mut self, banner: &str) -> HeadDecision {
        use self::HeadDecision::*;
        if let Some(status) = self.latched {
            return Respond(status_reply(status));
        }
        if self.request.method == "OPTIONS" && self.expected.is_none() {
            return self.options_decision(banner);
        }
        if self.request.method == "CONNECT" {
            return Respond(status_reply(Status::NotImplemented));
        }
        match self.expected {
            Some(n) => ReadBody(n),
            None => Forward,
        }
    }

    /// The OPTIONS fast path (bodyless OPTIONS requests only).
    ///
    /// An asterisk target is answered here. Otherwise `Max-Forwards`
    /// decides: zero terminates here too, a positive count is decremented
    /// in place and travels on, anything unparseable is passed through
    /// as if absent.
    fn options_decision(&mut self, banner: &str) -> HeadDecision {
        use self::HeadDecision::*;
        if self.request.path.as_ref().map(|x| &x[..]) == Some("*") {
            return Respond(options_reply(banner));
        }
        let hops = self.headers.get("Max-Forwards")
            .map(|v| from_utf8(v).ok()
                .and_then(|s| s.trim().parse::<i64>().ok()));
        match hops {
            None => Forward,
            Some(Some(0)) => Respond(options_reply(banner)),
            Some(Some(n)) if n > 0 => {
                self.headers.replace("Max-Forwards",
                    (n - 1).to_string().into_bytes());
                Forward
            }
            // negative or unparseable counts travel on untouched
            Some(_) => Forward,
        }
    }

    pub fn is_head(&self) -> bool {
        self.request.method == "HEAD"
    }

    /// Whether the connection must close once this request is answered.
    pub fn close_after(&self) -> bool {
        // HTTP/1.0 keep-alive is not supported
        self.request.version == Version::Http10 || self.connection_close
    }

    pub fn version(&self) -> Version {
        self.request.version
    }

    /// Split into what the origin side takes over.
    pub fn into_parts(self) -> (Request, HeaderList) {
        (self.request, self.headers)
    }
}

/// Split `host[:port]`, defaulting the port to 80.
fn split_port(authority: &str) -> Option<(&str, u16)> {
    match authority.find(':') {
        Some(idx) => {
            match authority[idx+1..].parse() {
                Ok(port) => Some((&authority[..idx], port)),
                Err(_) => None,
            }
        }
        None => Some((authority, 80)),
    }
}

/// A status-only reply: no extra headers, empty body.
pub fn status_reply(status: Status) -> Reply {
    Reply {
        code: status.code(),
        reason: None,
        headers: HeaderList::new(),
        body: Some(Vec::new()),
    }
}

/// The local OPTIONS terminus.
fn options_reply(banner: &str) -> Reply {
    let mut headers = HeaderList::new();
    headers.add("Server", banner);
    headers.add("Allow", ALLOW);
    Reply {
        code: Status::NoContent.code(),
        reason: None,
        headers: headers,
        body: Some(Vec::new()),
    }
}
