//! Wire serialization shared by the UA-facing and origin-facing sides
//!
//! Messages are written around the proxy's ordered header lists: a
//! `HeadWriter` opens the message, re-emits a stored `HeaderList` under
//! the proxy's field policy (hop-by-hop stripping, framing rewritten in
//! place) and declares the body framing exactly once. The `BodyWriter`
//! it leaves behind frames the payload.

use std::fmt::Display;
use std::io::Write;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use tk_bufstream::Buf;

use enums::Version;
use headers::{self, HeaderList};

quick_error! {
    #[derive(Debug)]
    pub enum HeaderError {
        InvalidHeaderName {
            description("Header name contains invalid characters")
        }
        InvalidHeaderValue {
            description("Header value contains invalid characters")
        }
        FramingField {
            description("Content-Length and Transfer-Encoding are \
                managed by the head writer itself")
        }
    }
}

/// How the body of the message under construction is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body and no framing fields (requests without payload,
    /// responses that forbid a body)
    None,
    /// A body of exactly this many bytes, announced by Content-Length
    Fixed(u64),
    /// A chunked body
    Chunked,
}

/// Responses with these codes never carry a message body.
pub fn response_denies_body(code: u16) -> bool {
    (code >= 100 && code < 200) || code == 204 || code == 304
}

fn bad_bytes(value: &[u8]) -> bool {
    value.iter().any(|&x| x == b'\r' || x == b'\n')
}

/// Writer for one message head.
///
/// Construction puts the start line into the buffer immediately. The
/// framing handed in is written exactly once: at the position where a
/// relayed header list announced its own framing, or appended when the
/// head is finished.
#[derive(Debug)]
pub struct HeadWriter {
    framing: Framing,
    framing_written: bool,
    close: bool,
    suppress: bool,
}

impl HeadWriter {
    /// Open a response head.
    ///
    /// For status codes that forbid a body the framing is overridden:
    /// no framing fields are emitted and body bytes are silently
    /// dropped, as they are for responses to HEAD.
    pub fn response(buf: &mut Buf, version: Version, code: u16,
        reason: &str, close: bool, is_head: bool, framing: Framing)
        -> HeadWriter
    {
        write!(buf, "{} {} {}\r\n", version, code, reason).unwrap();
        let denied = response_denies_body(code);
        HeadWriter {
            framing: if denied { Framing::None } else { framing },
            framing_written: false,
            close: close,
            suppress: is_head || denied,
        }
    }

    /// Open a request head.
    pub fn request(buf: &mut Buf, method: &str, target: &str,
        version: Version, framing: Framing)
        -> HeadWriter
    {
        write!(buf, "{} {} {}\r\n", method, target, version).unwrap();
        HeadWriter {
            framing: framing,
            framing_written: false,
            close: false,
            suppress: false,
        }
    }

    /// Append one field verbatim.
    ///
    /// The framing fields are refused here: the writer owns them, which
    /// is what keeps response splitting off this proxy.
    pub fn field(&mut self, buf: &mut Buf, name: &str, value: &[u8])
        -> Result<(), HeaderError>
    {
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding")
        {
            return Err(HeaderError::FramingField);
        }
        if bad_bytes(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        if bad_bytes(value) {
            return Err(HeaderError::InvalidHeaderValue);
        }
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();
        buf.write_all(value).unwrap();
        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    /// Append one field, formatting the value straight into the buffer.
    ///
    /// Useful for numeric values and other display types. The field is
    /// rolled back whole if the formatted value turns out invalid.
    pub fn field_formatted<D: Display>(&mut self, buf: &mut Buf,
        name: &str, value: D)
        -> Result<(), HeaderError>
    {
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding")
        {
            return Err(HeaderError::FramingField);
        }
        if bad_bytes(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        let start = buf.len();
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();
        let value_start = buf.len();
        write!(buf, "{}", value).unwrap();
        if bad_bytes(&buf[value_start..]) {
            buf.remove_range(start..);
            return Err(HeaderError::InvalidHeaderValue);
        }
        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    /// Re-emit a stored header list under the proxy's field policy.
    ///
    /// Hop-by-hop fields never cross the proxy. The fields describing
    /// body framing are not copied either: the framing declared for
    /// this message is written instead, at the position where the list
    /// announced its own.
    pub fn relay(&mut self, buf: &mut Buf, list: &HeaderList)
        -> Result<(), HeaderError>
    {
        for &(ref name, ref value) in list {
            if name.eq_ignore_ascii_case("Content-Length")
                || name.eq_ignore_ascii_case("Transfer-Encoding")
            {
                self.place_framing(buf);
            } else if headers::is_hop_by_hop(name) {
                continue;
            } else {
                self.field(buf, name, value)?;
            }
        }
        Ok(())
    }

    fn place_framing(&mut self, buf: &mut Buf) {
        if self.framing_written {
            return;
        }
        match self.framing {
            Framing::None => return,
            Framing::Fixed(n) => {
                write!(buf, "Content-Length: {}\r\n", n).unwrap();
            }
            Framing::Chunked => {
                buf.write_all(b"Transfer-Encoding: chunked\r\n").unwrap();
            }
        }
        self.framing_written = true;
    }

    /// Close the head and hand over to the body writer.
    ///
    /// Appends the framing field if no relayed list provided a position
    /// for it, and the `Connection: close` marker on closing messages.
    pub fn finish(mut self, buf: &mut Buf) -> BodyWriter {
        self.place_framing(buf);
        if self.close {
            buf.write_all(b"Connection: close\r\n").unwrap();
        }
        buf.write_all(b"\r\n").unwrap();
        BodyWriter {
            framing: self.framing,
            suppress: self.suppress,
        }
    }
}

/// Writes the message body its head declared.
#[derive(Debug)]
pub struct BodyWriter {
    framing: Framing,
    suppress: bool,
}

impl BodyWriter {
    /// Append body data.
    ///
    /// Fixed bodies count down against the declared length; chunked
    /// bodies get one frame per call. Empty calls produce no frame,
    /// since an empty frame would terminate the stream.
    ///
    /// # Panics
    ///
    /// When more bytes are pushed than a fixed declaration allows.
    pub fn push(&mut self, buf: &mut Buf, data: &[u8]) {
        if self.suppress {
            return;
        }
        match self.framing {
            Framing::None => {
                debug_assert!(data.is_empty(),
                    "body bytes on a message without framing");
            }
            Framing::Fixed(ref mut left) => {
                if data.len() as u64 > *left {
                    panic!("fixed-size message has {} bytes left \
                        but {} more were pushed", left, data.len());
                }
                buf.write_all(data).unwrap();
                *left -= data.len() as u64;
            }
            Framing::Chunked => if data.len() > 0 {
                write!(buf, "{:x}\r\n", data.len()).unwrap();
                buf.write_all(data).unwrap();
                buf.write_all(b"\r\n").unwrap();
            },
        }
    }

    /// Terminate the body.
    ///
    /// Chunked bodies get the zero chunk and an empty trailer section.
    ///
    /// # Panics
    ///
    /// When a fixed body was not written in full.
    pub fn finish(self, buf: &mut Buf) {
        if self.suppress {
            return;
        }
        match self.framing {
            Framing::None => {}
            Framing::Fixed(0) => {}
            Framing::Fixed(left) => {
                panic!("message finished with {} body bytes missing", left)
            }
            Framing::Chunked => {
                buf.write_all(b"0\r\n\r\n").unwrap();
            }
        }
    }

    /// Terminate a chunked body with a trailer section.
    ///
    /// Fields with invalid names or values abort the whole terminator
    /// before anything is written. On messages that turned out bodyless
    /// (HEAD, bodyless status codes) the trailer is dropped along with
    /// the rest of the body.
    pub fn finish_with_trailer(self, buf: &mut Buf, trailer: &HeaderList)
        -> Result<(), HeaderError>
    {
        if self.suppress || self.framing != Framing::Chunked {
            return Ok(());
        }
        for &(ref name, ref value) in trailer {
            if bad_bytes(name.as_bytes()) {
                return Err(HeaderError::InvalidHeaderName);
            }
            if bad_bytes(value) {
                return Err(HeaderError::InvalidHeaderValue);
            }
        }
        buf.write_all(b"0\r\n").unwrap();
        for &(ref name, ref value) in trailer {
            buf.write_all(name.as_bytes()).unwrap();
            buf.write_all(b": ").unwrap();
            buf.write_all(value).unwrap();
            buf.write_all(b"\r\n").unwrap();
        }
        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use tk_bufstream::Buf;

    use enums::Version;
    use headers::HeaderList;
    use super::{Framing, HeadWriter};

    fn list(fields: &[(&str, &str)]) -> HeaderList {
        let mut list = HeaderList::new();
        for &(name, value) in fields {
            list.add(name, value.as_bytes());
        }
        list
    }

    #[test]
    fn minimal_response() {
        let mut buf = Buf::new();
        let head = HeadWriter::response(&mut buf, Version::Http10, 200,
            "OK", false, false, Framing::Fixed(0));
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"");
        body.finish(&mut buf);
        assert_eq!(&buf[..],
            "HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n".as_bytes());
    }

    #[test]
    fn closing_response() {
        let mut buf = Buf::new();
        let head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", true, false, Framing::Fixed(0));
        head.finish(&mut buf).finish(&mut buf);
        assert_eq!(&buf[..], concat!(
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n",
            "Connection: close\r\n\r\n").as_bytes());
    }

    #[test]
    fn request_head() {
        let mut buf = Buf::new();
        let mut head = HeadWriter::request(&mut buf, "PUT", "/r",
            Version::Http11, Framing::Fixed(5));
        head.field(&mut buf, "Connection", b"close").unwrap();
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"hello");
        body.finish(&mut buf);
        assert_eq!(&buf[..], concat!(
            "PUT /r HTTP/1.1\r\nConnection: close\r\n",
            "Content-Length: 5\r\n\r\nhello").as_bytes());
    }

    #[test]
    fn bodyless_status_drops_framing_and_body() {
        let mut buf = Buf::new();
        let mut head = HeadWriter::response(&mut buf, Version::Http11, 204,
            "No Content", false, false, Framing::Fixed(4));
        head.field(&mut buf, "Server", b"p/1").unwrap();
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"oops");
        body.finish(&mut buf);
        assert_eq!(&buf[..],
            "HTTP/1.1 204 No Content\r\nServer: p/1\r\n\r\n".as_bytes());
    }

    #[test]
    fn head_response_keeps_announced_length() {
        // the response to a HEAD request advertises the real length but
        // carries no bytes
        let mut buf = Buf::new();
        let head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", false, true, Framing::Fixed(500));
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"");
        body.finish(&mut buf);
        assert_eq!(&buf[..],
            "HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\n".as_bytes());
    }

    #[test]
    fn relay_substitutes_framing_in_place() {
        let mut buf = Buf::new();
        let mut head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", false, false, Framing::Fixed(5));
        head.relay(&mut buf, &list(&[
            ("Content-Type", "text/plain"),
            ("Content-Length", "999"),
            ("Connection", "keep-alive"),
            ("X-Upstream", "a"),
        ])).unwrap();
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"hello");
        body.finish(&mut buf);
        assert_eq!(&buf[..], concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Length: 5\r\n",
            "X-Upstream: a\r\n",
            "\r\n",
            "hello").as_bytes());
    }

    #[test]
    fn chunked_with_trailer() {
        let mut buf = Buf::new();
        let mut head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", false, false, Framing::Chunked);
        head.relay(&mut buf, &list(&[("Transfer-Encoding", "chunked")]))
            .unwrap();
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"ab");
        body.push(&mut buf, b"cd");
        body.finish_with_trailer(&mut buf,
            &list(&[("X-Checksum", "9a0364b9")])).unwrap();
        assert_eq!(&buf[..], concat!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n",
            "2\r\nab\r\n2\r\ncd\r\n0\r\nX-Checksum: 9a0364b9\r\n\r\n")
            .as_bytes());
    }

    #[test]
    fn empty_chunks_are_not_framed() {
        let mut buf = Buf::new();
        let head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", false, false, Framing::Chunked);
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"");
        body.push(&mut buf, b"x");
        body.finish(&mut buf);
        assert_eq!(&buf[..], concat!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n",
            "1\r\nx\r\n0\r\n\r\n").as_bytes());
    }

    #[test]
    fn framing_fields_are_refused() {
        let mut buf = Buf::new();
        let mut head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", false, false, Framing::Fixed(0));
        assert!(head.field(&mut buf, "content-length", b"5").is_err());
        assert!(head.field(&mut buf, "Transfer-Encoding", b"chunked")
            .is_err());
    }

    #[test]
    fn invalid_formatted_value_rolls_back() {
        let mut buf = Buf::new();
        let mut head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", false, false, Framing::Fixed(0));
        let mark = buf.len();
        assert!(head.field_formatted(&mut buf, "X-Bad", "a\r\nb").is_err());
        assert_eq!(buf.len(), mark);
    }

    #[test]
    #[should_panic(expected="fixed-size")]
    fn overflowing_fixed_body() {
        let mut buf = Buf::new();
        let head = HeadWriter::response(&mut buf, Version::Http11, 200,
            "OK", false, false, Framing::Fixed(2));
        let mut body = head.finish(&mut buf);
        body.push(&mut buf, b"toolong");
    }
}
