use futures::{Async, Poll};
use httparse;
use tk_bufstream::{Buf, ReadBuf};
use tokio_io::AsyncRead;

use super::error::Error;
use super::request::PendingRequest;


/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers
const MAX_HEADERS: usize = 1024;


/// What the connection is currently reading from the socket.
///
/// HTTP/1.x framing is protocol dependent: request heads are token
/// oriented, bodies are not. The tokenizer respects the mode instead of
/// the state machine poking at the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Parse HTTP head tokens
    HttpToken,
    /// Read exactly this many raw body bytes
    Raw(usize),
}

/// One unit yielded by the tokenizer.
///
/// One-shot readiness: every poll yields at most one unit and the caller
/// re-arms by polling again.
#[derive(Debug)]
pub enum Token {
    /// A complete request head
    Head(PendingRequest),
    /// The raw body bytes a `Raw` mode asked for
    Body(Vec<u8>),
    /// The head overflows the configured byte cap
    OverLimit,
    /// Peer closed with no partial unit pending
    Closed,
    /// Peer closed in the middle of a unit
    Interrupted,
}

pub struct Tokenizer<S> {
    io: ReadBuf<S>,
    mode: ReadMode,
}

fn parse_head(buffer: &mut Buf, limit: usize)
    -> Result<Option<Token>, Error>
{
    let (pending, bytes) = {
        let mut vec;
        let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let mut raw = httparse::Request::new(&mut headers);
        let mut result = raw.parse(&buffer[..]);
        if matches!(result, Err(httparse::Error::TooManyHeaders)) {
            vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
            raw = httparse::Request::new(&mut vec);
            result = raw.parse(&buffer[..]);
        }
        match result? {
            httparse::Status::Complete(bytes) => {
                if bytes > limit {
                    return Ok(Some(Token::OverLimit));
                }
                let mut pending = PendingRequest::start(
                    raw.method.unwrap(),
                    raw.path.unwrap(),
                    raw.version.unwrap())?;
                for header in raw.headers.iter() {
                    pending.header(header.name, header.value)?;
                }
                (pending, bytes)
            }
            httparse::Status::Partial => {
                if buffer.len() > limit {
                    return Ok(Some(Token::OverLimit));
                }
                return Ok(None);
            }
        }
    };
    buffer.consume(bytes);
    Ok(Some(Token::Head(pending)))
}

impl<S: AsyncRead> Tokenizer<S> {
    pub fn new(io: ReadBuf<S>) -> Tokenizer<S> {
        Tokenizer {
            io: io,
            mode: ReadMode::HttpToken,
        }
    }

    /// Switch between head tokenization and raw body framing.
    pub fn set_mode(&mut self, mode: ReadMode) {
        self.mode = mode;
    }

    /// Yield the next unit the current mode asks for.
    pub fn poll_token(&mut self, max_head_bytes: usize)
        -> Poll<Token, Error>
    {
        loop {
            match self.mode {
                ReadMode::HttpToken => {
                    if self.io.in_buf.len() > 0 {
                        if let Some(token) = parse_head(
                            &mut self.io.in_buf, max_head_bytes)?
                        {
                            return Ok(Async::Ready(token));
                        }
                    }
                }
                ReadMode::Raw(size) => {
                    if self.io.in_buf.len() >= size {
                        let data = self.io.in_buf[..size].to_vec();
                        self.io.in_buf.consume(size);
                        return Ok(Async::Ready(Token::Body(data)));
                    }
                }
            }
            if self.io.read()? == 0 {
                if self.io.done() {
                    let clean = self.mode == ReadMode::HttpToken
                        && self.io.in_buf.len() == 0;
                    return Ok(Async::Ready(
                        if clean { Token::Closed }
                        else { Token::Interrupted }));
                } else {
                    return Ok(Async::NotReady);
                }
            }
        }
    }
}
