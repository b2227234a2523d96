use std::str::from_utf8;
#[allow(unused_imports)]
use std::ascii::AsciiExt;

use httparse::Header;

use chunked;
use headers;

quick_error! {
    #[derive(Debug)]
    pub enum BodyError {
        /// Bad `Content-Length` header
        BadContentLength {
            description("bad content length")
        }
        /// Duplicate `Content-Length` header
        DuplicateContentLength {
            description("duplicate content length")
        }
    }
}

/// Progress of reading a reply body from an origin connection.
#[derive(Debug, Clone)]
pub enum BodyProgress {
    /// Fixed-size body (bytes to go)
    Fixed(usize),
    /// Read until the origin closes the connection
    Eof,
    /// Chunked transfer encoding
    Chunked(chunked::State),
}

impl BodyProgress {
    /// Classify a reply body.
    ///
    /// Implements the body length algorithm for responses:
    /// http://httpwg.github.io/specs/rfc7230.html#message.body.length
    ///
    /// Algorithm:
    ///
    /// 1. For HEAD, 1xx, 204, 304 -- no body
    /// 2. If last transfer encoding is chunked -> Chunked
    /// 3. If Content-Length -> Fixed
    /// 4. Else Eof
    pub fn classify(is_head: bool, code: u16, raw_headers: &[Header])
        -> Result<BodyProgress, BodyError>
    {
        use self::BodyProgress::*;
        if is_head || (code > 100 && code < 200) || code == 204 || code == 304
        {
            return Ok(Fixed(0));
        }
        let mut has_content_length = false;
        let mut result = BodyProgress::Eof;
        for header in raw_headers.iter() {
            if header.name.eq_ignore_ascii_case("Transfer-Encoding") {
                if let Some(enc) = header.value.split(|&x| x == b',').last() {
                    if headers::is_chunked(enc) {
                        result = Chunked(chunked::State::new());
                    }
                }
            } else if header.name.eq_ignore_ascii_case("Content-Length") {
                if has_content_length {
                    return Err(BodyError::DuplicateContentLength);
                }
                has_content_length = true;
                if !matches!(result, Chunked(..)) {
                    let s = from_utf8(header.value)
                        .map_err(|_| BodyError::BadContentLength)?;
                    let len = s.trim().parse()
                        .map_err(|_| BodyError::BadContentLength)?;
                    result = Fixed(len);
                }
                // transfer-encoding has preference otherwise
            }
        }
        Ok(result)
    }
}
