use std::mem;
use std::net::SocketAddr;

use futures::{Async, Future, Poll};
use httparse;
use tk_bufstream::{Buf, IoBuf, ReadBuf, WriteBuf};
use tokio_core::net::{TcpStream, TcpStreamNew};
use tokio_core::reactor::Handle;

use base_serializer::{Framing, HeadWriter};
use body_parser::BodyProgress;
use chunked::{self, Chunk};
use headers::HeaderList;
use request::Request;
use super::link::ReplySender;
use super::{Error, Reply};


/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers
const MAX_HEADERS: usize = 1024;


/// A per-request origin worker.
///
/// Opens one upstream connection, forwards the request and streams the
/// reply back over the link. Any failure drops the sending half of the
/// link, which the connection handler observes as origin termination.
pub struct Worker {
    sender: ReplySender,
    state: State,
}

enum State {
    Connect {
        future: TcpStreamNew,
        request: Request,
        headers: HeaderList,
        body: Option<Vec<u8>>,
    },
    Exchange {
        out: WriteBuf<TcpStream>,
        inp: ReadBuf<TcpStream>,
        parse: Parse,
        is_head: bool,
    },
    Void,
}

enum Parse {
    Headers,
    /// Fixed-size reply body, delivered as one buffer
    FixedBody { size: usize, pending: Reply },
    /// Body runs until the origin closes the connection
    EofBody { pending: Reply },
    /// Chunked body, streamed chunk by chunk
    ChunkedBody { state: chunked::State },
    Trailer,
    Done,
}

/// Write the upstream request into the output buffer.
///
/// The head writer's relay strips hop-by-hop fields and rewrites
/// `Content-Length` to match the body actually in hand. The upstream
/// connection serves one exchange, so `Connection: close` is always set.
fn serialize_request(buf: &mut Buf, request: &Request,
    headers: &HeaderList, body: &Option<Vec<u8>>)
    -> Result<(), Error>
{
    let framing = match *body {
        Some(ref body) => Framing::Fixed(body.len() as u64),
        None => Framing::None,
    };
    let mut head = HeadWriter::request(buf, &request.method,
        request.target(), request.version, framing);
    if headers.get("Host").is_none() {
        if let Some(ref host) = request.host {
            if request.port == 80 {
                head.field(buf, "Host", host.as_bytes())?;
            } else {
                head.field_formatted(buf, "Host",
                    format_args!("{}:{}", host, request.port))?;
            }
        }
    }
    head.relay(buf, headers)?;
    head.field(buf, "Connection", b"close")?;
    let mut out = head.finish(buf);
    if let Some(ref body) = *body {
        out.push(buf, body);
    }
    out.finish(buf);
    Ok(())
}

fn parse_reply_head(buf: &mut Buf, is_head: bool)
    -> Result<Option<(Reply, BodyProgress)>, Error>
{
    let (reply, progress, bytes) = {
        let mut vec;
        let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);
        let mut result = raw.parse(&buf[..]);
        if matches!(result, Err(httparse::Error::TooManyHeaders)) {
            vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
            raw = httparse::Response::new(&mut vec);
            result = raw.parse(&buf[..]);
        }
        match result? {
            httparse::Status::Complete(bytes) => {
                let code = raw.code.unwrap();
                let progress = BodyProgress::classify(
                    is_head, code, raw.headers)?;
                let mut list = HeaderList::with_capacity(raw.headers.len());
                for h in raw.headers.iter() {
                    list.add(h.name, h.value);
                }
                let reason = raw.reason.unwrap();
                let reply = Reply {
                    code: code,
                    reason: if reason.is_empty() { None }
                            else { Some(reason.to_string()) },
                    headers: list,
                    body: None,
                };
                (reply, progress, bytes)
            }
            httparse::Status::Partial => return Ok(None),
        }
    };
    buf.consume(bytes);
    Ok(Some((reply, progress)))
}

fn parse_trailer(buf: &mut Buf) -> Result<Option<HeaderList>, Error> {
    let (list, bytes) = {
        let mut vec;
        let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let mut result = httparse::parse_headers(&buf[..], &mut headers);
        if matches!(result, Err(httparse::Error::TooManyHeaders)) {
            vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
            result = httparse::parse_headers(&buf[..], &mut vec);
        }
        match result? {
            httparse::Status::Complete((bytes, raw)) => {
                let mut list = HeaderList::with_capacity(raw.len());
                for h in raw.iter() {
                    list.add(h.name, h.value);
                }
                (list, bytes)
            }
            httparse::Status::Partial => return Ok(None),
        }
    };
    buf.consume(bytes);
    Ok(Some(list))
}

impl Worker {
    /// A spawnable worker serving a single proxied request.
    pub fn new(handle: &Handle, addr: SocketAddr, request: Request,
               headers: HeaderList, body: Option<Vec<u8>>,
               sender: ReplySender)
        -> Worker
    {
        Worker {
            sender: sender,
            state: State::Connect {
                future: TcpStream::connect(&addr, handle),
                request: request,
                headers: headers,
                body: body,
            },
        }
    }

    fn exchange(&mut self) -> Poll<(), Error> {
        use self::State::*;
        loop {
            self.state = match mem::replace(&mut self.state, Void) {
                Connect { mut future, request, headers, body } => {
                    match future.poll()? {
                        Async::Ready(sock) => {
                            let (mut out, inp) = IoBuf::new(sock).split();
                            serialize_request(&mut out.out_buf,
                                &request, &headers, &body)?;
                            debug!("forwarding {} {} upstream",
                                request.method, request.target());
                            Exchange {
                                out: out,
                                inp: inp,
                                parse: Parse::Headers,
                                is_head: request.method == "HEAD",
                            }
                        }
                        Async::NotReady => {
                            self.state = Connect { future: future,
                                request: request, headers: headers,
                                body: body };
                            return Ok(Async::NotReady);
                        }
                    }
                }
                Exchange { mut out, mut inp, mut parse, is_head } => {
                    out.flush()?;
                    match advance(&self.sender, &mut inp, &mut parse,
                                  is_head)?
                    {
                        Async::Ready(()) => return Ok(Async::Ready(())),
                        Async::NotReady => {
                            self.state = Exchange { out: out, inp: inp,
                                parse: parse, is_head: is_head };
                            return Ok(Async::NotReady);
                        }
                    }
                }
                Void => unreachable!(),
            };
        }
    }
}

/// Drive reply parsing as far as the buffered input allows, reading more
/// when it runs dry. Ready means the exchange is complete (or the
/// handler is gone and nobody cares).
fn advance(sender: &ReplySender, inp: &mut ReadBuf<TcpStream>,
           parse: &mut Parse, is_head: bool)
    -> Poll<(), Error>
{
    loop {
        'progress: loop {
            match *parse {
                Parse::Headers => {
                    match parse_reply_head(&mut inp.in_buf, is_head)? {
                        Some((reply, progress)) => {
                            *parse = match progress {
                                BodyProgress::Fixed(size) => {
                                    Parse::FixedBody { size: size,
                                                       pending: reply }
                                }
                                BodyProgress::Eof => {
                                    Parse::EofBody { pending: reply }
                                }
                                BodyProgress::Chunked(st) => {
                                    // announced right away; the body
                                    // follows as chunk events
                                    if sender.reply(reply).is_err() {
                                        return Ok(Async::Ready(()));
                                    }
                                    Parse::ChunkedBody { state: st }
                                }
                            };
                        }
                        None => break 'progress,
                    }
                }
                Parse::FixedBody { size, .. } => {
                    if inp.in_buf.len() < size {
                        break 'progress;
                    }
                    if let Parse::FixedBody { mut pending, .. } =
                        mem::replace(parse, Parse::Done)
                    {
                        pending.body = Some(inp.in_buf[..size].to_vec());
                        inp.in_buf.consume(size);
                        let _ = sender.reply(pending);
                    }
                    return Ok(Async::Ready(()));
                }
                Parse::EofBody { .. } => {
                    // completes when the origin closes the connection
                    break 'progress;
                }
                Parse::ChunkedBody { ref mut state } => {
                    match state.parse(&mut inp.in_buf)? {
                        Some(Chunk::Data(data)) => {
                            if sender.chunk(data).is_err() {
                                return Ok(Async::Ready(()));
                            }
                        }
                        Some(Chunk::Last) => {
                            *parse = Parse::Trailer;
                        }
                        None => break 'progress,
                    }
                }
                Parse::Trailer => {
                    match parse_trailer(&mut inp.in_buf)? {
                        Some(trailer) => {
                            let _ = sender.trailer(trailer);
                            return Ok(Async::Ready(()));
                        }
                        None => break 'progress,
                    }
                }
                Parse::Done => unreachable!(),
            }
        }
        if inp.read()? == 0 {
            if inp.done() {
                return match mem::replace(parse, Parse::Done) {
                    Parse::EofBody { mut pending } => {
                        let len = inp.in_buf.len();
                        pending.body = Some(inp.in_buf[..len].to_vec());
                        inp.in_buf.consume(len);
                        let _ = sender.reply(pending);
                        Ok(Async::Ready(()))
                    }
                    Parse::Headers => Err(Error::ResetOnReplyHeaders),
                    _ => Err(Error::ResetOnReplyBody),
                };
            } else {
                return Ok(Async::NotReady);
            }
        }
    }
}

impl Future for Worker {
    type Item = ();
    type Error = ();
    fn poll(&mut self) -> Poll<(), ()> {
        match self.exchange() {
            Ok(Async::Ready(())) => Ok(Async::Ready(())),
            Ok(Async::NotReady) => Ok(Async::NotReady),
            Err(e) => {
                // dropping the sender breaks the link; the connection
                // handler answers the client with a 500
                debug!("origin worker failed: {}", e);
                Ok(Async::Ready(()))
            }
        }
    }
}
