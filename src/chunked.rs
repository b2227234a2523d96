use httparse::{InvalidChunkSize, parse_chunk_size};
use tk_bufstream::Buf;


/// One parsed frame of a chunked stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// A data chunk, boundary preserved as it was on the wire.
    Data(Vec<u8>),
    /// The zero-size chunk; a trailer section follows in the buffer.
    Last,
}

/// Incremental parser extracting whole chunks from an input buffer.
///
/// Chunks are pulled out one at a time so a proxy can re-emit the stream
/// with the original chunk boundaries intact.
#[derive(Debug, Clone)]
pub struct State {
    done: bool,
}

impl State {
    pub fn new() -> State {
        State { done: false }
    }
    /// True once the zero chunk was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }
    /// Extract the next complete chunk, or `None` if more bytes are needed.
    ///
    /// Consumed bytes are removed from the front of the buffer; the
    /// trailer section (after `Chunk::Last`) is left untouched.
    pub fn parse(&mut self, buf: &mut Buf)
        -> Result<Option<Chunk>, InvalidChunkSize>
    {
        use httparse::Status::*;
        if self.done {
            return Ok(None);
        }
        match parse_chunk_size(&buf[..])? {
            Complete((head, 0)) => {
                buf.consume(head);
                self.done = true;
                Ok(Some(Chunk::Last))
            }
            Complete((head, chunk_size)) => {
                // chunk plus the CRLF closing it must be fully buffered
                let chunk_size = chunk_size as usize;
                if buf.len() < head + chunk_size + 2 {
                    return Ok(None);
                }
                if &buf[head + chunk_size..head + chunk_size + 2] != b"\r\n" {
                    return Err(InvalidChunkSize);
                }
                let data = buf[head..head + chunk_size].to_vec();
                buf.consume(head + chunk_size + 2);
                Ok(Some(Chunk::Data(data)))
            }
            Partial => Ok(None),
        }
    }
}
