use std::collections::VecDeque;
use std::mem;
use std::str::from_utf8;
use std::sync::Arc;

use futures::{Async, Future, Poll};
use tk_bufstream::{Buf, IoBuf, WriteBuf};
use tokio_io::{AsyncRead, AsyncWrite};

use base_serializer::{BodyWriter, Framing, HeadWriter, HeaderError};
use enums::{Status, Version};
use origin::{Dispatcher, Origin, Reply, ReplyEvent, WorkerLink};
use super::error::Error;
use super::parser::{ReadMode, Token, Tokenizer};
use super::request::{status_reply, HeadDecision, PendingRequest};
use super::Config;

/// Mirrors the constant of the same name removed from `netbuf` in later
/// versions of the crate.
const MAX_BUF_SIZE: usize = (1 << 32) - 2;

/// How a queued request gets its answer.
enum Answer {
    /// Answered locally (OPTIONS terminus, synthesized errors)
    Local(Reply),
    /// Waiting on a linked origin worker
    Forwarded(WorkerLink),
}

/// A request whose reply has not been fully written yet.
///
/// The queue of these is the pipeline: replies leave in request order,
/// and only the front entry's events are serialized.
struct InFlight {
    answer: Answer,
    version: Version,
    close: bool,
    is_head: bool,
}

/// Progress of the reply currently being written.
enum OutState {
    Idle,
    /// A chunked reply was announced; its status line and headers are
    /// withheld until the first chunk arrives
    ChunkWait(Reply),
    /// A chunked reply with its head already on the wire
    Chunking(BodyWriter),
}

/// Reading-side state.
enum InState {
    /// Between requests or collecting a head
    Head,
    /// Collecting the fixed-size body of this request
    Body(PendingRequest),
    /// No further requests are read on this connection
    Done,
}

/// A user-agent-side proxy connection handler.
///
/// One instance runs per accepted socket, owns the socket for its whole
/// life, and drives the `request -> head -> body -> chunk` cycle: parse
/// an inbound request, answer it locally or hand it to an origin worker
/// obtained from the dispatcher, stream the reply back, and loop while
/// the connection keeps alive.
pub struct Proto<S, D: Dispatcher> {
    tokens: Tokenizer<S>,
    out: WriteBuf<S>,
    dispatcher: D,
    banner: String,
    config: Arc<Config>,
    parsing: InState,
    inflight: VecDeque<InFlight>,
    writing: OutState,
    hangup: bool,
}

/// Serialize a complete (non-chunked) reply.
///
/// The `Content-Length` on the wire equals the body actually in hand
/// (except for HEAD, where the origin's announced length survives);
/// the rest of the field policy lives in the head writer's relay.
fn write_reply(buf: &mut Buf, reply: &Reply,
    version: Version, close: bool, is_head: bool)
    -> Result<(), HeaderError>
{
    let body = reply.body.as_ref().expect("complete reply carries a body");
    let reason = match reply.reason {
        Some(ref reason) => &reason[..],
        None => Status::reason_for(reply.code),
    };
    let length = if is_head {
        reply.headers.get("Content-Length")
            .and_then(|v| from_utf8(v).ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(body.len() as u64)
    } else {
        body.len() as u64
    };
    let mut head = HeadWriter::response(buf, version, reply.code, reason,
        close, is_head, Framing::Fixed(length));
    head.relay(buf, &reply.headers)?;
    let mut out = head.finish(buf);
    out.push(buf, body);
    out.finish(buf);
    Ok(())
}

/// Put the head of a chunked reply on the wire.
///
/// Called when the first chunk (or a chunkless trailer) arrives. The
/// returned writer serializes the chunk frames.
fn start_chunked(buf: &mut Buf, reply: &Reply,
    version: Version, close: bool, is_head: bool)
    -> Result<BodyWriter, HeaderError>
{
    let reason = match reply.reason {
        Some(ref reason) => &reason[..],
        None => Status::reason_for(reply.code),
    };
    let mut head = HeadWriter::response(buf, version, reply.code, reason,
        close, is_head, Framing::Chunked);
    head.relay(buf, &reply.headers)?;
    Ok(head.finish(buf))
}

impl<S: AsyncRead + AsyncWrite, D: Dispatcher> Proto<S, D> {
    /// Create a connection handler around a freshly accepted socket.
    ///
    /// The banner is what locally produced responses announce in their
    /// `Server` header.
    pub fn new(conn: S, banner: &str, dispatcher: D, cfg: &Arc<Config>)
        -> Proto<S, D>
    {
        let (cout, cin) = IoBuf::new(conn).split();
        Proto {
            tokens: Tokenizer::new(cin),
            out: cout,
            dispatcher: dispatcher,
            banner: banner.to_string(),
            config: cfg.clone(),
            parsing: InState::Head,
            inflight: VecDeque::with_capacity(cfg.inflight_request_prealloc),
            writing: OutState::Idle,
            hangup: false,
        }
    }

    fn enqueue_local(&mut self, reply: Reply,
        version: Version, close: bool, is_head: bool)
    {
        self.inflight.push_back(InFlight {
            answer: Answer::Local(reply),
            version: version,
            close: close,
            is_head: is_head,
        });
    }

    /// Hand a request over to the origin side and re-arm for the next
    /// pipelined request.
    fn forward(&mut self, pending: PendingRequest, body: Option<Vec<u8>>)
        -> Result<(), Error>
    {
        let close = pending.close_after();
        let version = pending.version();
        let is_head = pending.is_head();
        let (request, headers) = pending.into_parts();
        debug!("forwarding {} {}", request.method, request.target());
        let origin = self.dispatcher.get_closest_origin()?;
        let link = origin.submit(request, headers, body)?;
        self.inflight.push_back(InFlight {
            answer: Answer::Forwarded(link),
            version: version,
            close: close,
            is_head: is_head,
        });
        if close {
            self.parsing = InState::Done;
        }
        Ok(())
    }

    /// End-of-headers dispatch for a freshly parsed head.
    fn dispatch_head(&mut self, mut pending: PendingRequest)
        -> Result<(), Error>
    {
        let decision = pending.end_of_headers(&self.banner);
        match decision {
            HeadDecision::Respond(reply) => {
                debug!("{} answered locally with {}",
                    pending.request.method, reply.code);
                let close = pending.close_after();
                self.enqueue_local(reply, pending.version(), close,
                    pending.is_head());
                if close {
                    self.parsing = InState::Done;
                }
            }
            HeadDecision::Forward => {
                self.forward(pending, None)?;
            }
            HeadDecision::ReadBody(size) => {
                if size > MAX_BUF_SIZE {
                    return Err(Error::RequestBodyTooLong);
                }
                self.tokens.set_mode(ReadMode::Raw(size));
                self.parsing = InState::Body(pending);
            }
        }
        Ok(())
    }

    /// Read side: tokenize heads and bodies, dispatch each request.
    fn poll_requests(&mut self) -> Result<bool, Error> {
        let mut progress = false;
        loop {
            if self.hangup || matches!(self.parsing, InState::Done) {
                return Ok(progress);
            }
            if self.inflight.len() >= self.config.inflight_request_limit {
                // push back on the peer until replies drain
                return Ok(progress);
            }
            let token = match self.tokens.poll_token(
                self.config.max_request_head_size)?
            {
                Async::Ready(token) => token,
                Async::NotReady => return Ok(progress),
            };
            progress = true;
            match token {
                Token::Head(pending) => {
                    self.dispatch_head(pending)?;
                }
                Token::Body(data) => {
                    let pending = match mem::replace(&mut self.parsing,
                                                     InState::Head)
                    {
                        InState::Body(pending) => pending,
                        _ => unreachable!(),
                    };
                    self.tokens.set_mode(ReadMode::HttpToken);
                    self.forward(pending, Some(data))?;
                }
                Token::OverLimit => {
                    // never enters the body state: answer 400, shut down
                    self.enqueue_local(status_reply(Status::BadRequest),
                        Version::Http11, true, false);
                    self.parsing = InState::Done;
                }
                Token::Closed => {
                    debug!("connection closed by peer");
                    self.hangup = true;
                }
                Token::Interrupted => {
                    debug!("connection interrupted mid request");
                    self.hangup = true;
                }
            }
        }
    }

    /// Write side: serialize the front entry's reply, popping it when
    /// complete. Entries behind the front stay untouched so replies
    /// leave in request order.
    fn poll_replies(&mut self) -> Result<bool, Error> {
        let mut progress = false;
        loop {
            let front_is_local = matches!(
                self.inflight.front().map(|e| &e.answer),
                Some(&Answer::Local(..)));
            if front_is_local {
                let entry = self.inflight.pop_front().unwrap();
                if let Answer::Local(reply) = entry.answer {
                    write_reply(&mut self.out.out_buf, &reply,
                        entry.version, entry.close, entry.is_head)?;
                }
                progress = true;
                continue;
            }
            let (pop, advanced) = match self.inflight.front_mut() {
                None => break,
                Some(entry) => {
                    let link = match entry.answer {
                        Answer::Forwarded(ref mut link) => link,
                        Answer::Local(..) => unreachable!(),
                    };
                    let mut pop = false;
                    let mut advanced = false;
                    loop {
                        match link.poll_event() {
                            Async::NotReady => break,
                            Async::Ready(Some(ReplyEvent::Reply(reply))) => {
                                advanced = true;
                                if reply.body.is_none() {
                                    // chunked: head deferred to the
                                    // first chunk
                                    self.writing = OutState::ChunkWait(reply);
                                } else {
                                    write_reply(&mut self.out.out_buf,
                                        &reply, entry.version, entry.close,
                                        entry.is_head)?;
                                    pop = true;
                                    break;
                                }
                            }
                            Async::Ready(Some(ReplyEvent::Chunk(data))) => {
                                advanced = true;
                                match mem::replace(&mut self.writing,
                                                   OutState::Idle)
                                {
                                    OutState::ChunkWait(reply) => {
                                        let mut msg = start_chunked(
                                            &mut self.out.out_buf, &reply,
                                            entry.version, entry.close,
                                            entry.is_head)?;
                                        msg.push(
                                            &mut self.out.out_buf, &data);
                                        self.writing =
                                            OutState::Chunking(msg);
                                    }
                                    OutState::Chunking(mut msg) => {
                                        msg.push(
                                            &mut self.out.out_buf, &data);
                                        self.writing =
                                            OutState::Chunking(msg);
                                    }
                                    OutState::Idle => {
                                        warn!("stray chunk event dropped");
                                    }
                                }
                            }
                            Async::Ready(Some(ReplyEvent::Trailer(trailer)))
                            => {
                                advanced = true;
                                match mem::replace(&mut self.writing,
                                                   OutState::Idle)
                                {
                                    OutState::ChunkWait(reply) => {
                                        // a chunked reply without data
                                        // chunks still gets its head
                                        let msg = start_chunked(
                                            &mut self.out.out_buf, &reply,
                                            entry.version, entry.close,
                                            entry.is_head)?;
                                        msg.finish_with_trailer(
                                            &mut self.out.out_buf,
                                            &trailer)?;
                                        pop = true;
                                    }
                                    OutState::Chunking(msg) => {
                                        msg.finish_with_trailer(
                                            &mut self.out.out_buf,
                                            &trailer)?;
                                        pop = true;
                                    }
                                    OutState::Idle => {
                                        warn!("stray trailer event dropped");
                                    }
                                }
                                if pop {
                                    break;
                                }
                            }
                            Async::Ready(None) => {
                                advanced = true;
                                match mem::replace(&mut self.writing,
                                                   OutState::Idle)
                                {
                                    OutState::Idle |
                                    OutState::ChunkWait(..) => {
                                        // nothing is on the wire for this
                                        // request yet, so the worker's
                                        // death can still be reported
                                        warn!("origin worker vanished, \
                                               answering 500");
                                        write_reply(&mut self.out.out_buf,
                                            &status_reply(
                                                Status::InternalServerError),
                                            entry.version, entry.close,
                                            entry.is_head)?;
                                        pop = true;
                                    }
                                    OutState::Chunking(..) => {
                                        // mid stream: all we can do is
                                        // stop at a frame boundary
                                        warn!("origin worker vanished mid \
                                               reply, closing");
                                        self.hangup = true;
                                        pop = true;
                                    }
                                }
                                break;
                            }
                        }
                    }
                    (pop, advanced)
                }
            };
            progress = progress || advanced;
            if pop {
                let entry = self.inflight.pop_front().unwrap();
                if entry.close {
                    self.parsing = InState::Done;
                }
            }
            if !advanced {
                break;
            }
        }
        Ok(progress)
    }
}

impl<S: AsyncRead + AsyncWrite, D: Dispatcher> Future for Proto<S, D> {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> Poll<(), Error> {
        loop {
            let wrote = self.poll_replies()?;
            let read = self.poll_requests()?;
            self.out.flush()?;
            if self.hangup {
                return Ok(Async::Ready(()));
            }
            if !wrote && !read {
                if matches!(self.parsing, InState::Done)
                    && self.inflight.is_empty()
                    && self.out.out_buf.len() == 0
                {
                    debug!("connection done");
                    return Ok(Async::Ready(()));
                }
                return Ok(Async::NotReady);
            }
        }
    }
}
