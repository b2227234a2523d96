#[allow(unused_imports)]
use std::ascii::AsciiExt;
use std::slice;

/// Ordered list of header fields as they arrived on the wire.
///
/// Insertion order equals arrival order and is preserved on emission.
/// Duplicate field names are permitted. Names are compared by ASCII
/// case-insensitive token but emitted exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderList {
    fields: Vec<(String, Vec<u8>)>,
}

impl HeaderList {
    pub fn new() -> HeaderList {
        HeaderList { fields: Vec::new() }
    }
    pub fn with_capacity(n: usize) -> HeaderList {
        HeaderList { fields: Vec::with_capacity(n) }
    }
    pub fn add<N: Into<String>, V: Into<Vec<u8>>>(&mut self, name: N, value: V) {
        self.fields.push((name.into(), value.into()));
    }
    /// Value of the first field with this name.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields.iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..])
    }
    /// Replace the value of the first field with this name, keeping its
    /// position in the list. Returns false if no such field exists.
    pub fn replace(&mut self, name: &str, value: Vec<u8>) -> bool {
        for &mut (ref n, ref mut v) in self.fields.iter_mut() {
            if n.eq_ignore_ascii_case(name) {
                *v = value;
                return true;
            }
        }
        false
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
    pub fn iter(&self) -> slice::Iter<(String, Vec<u8>)> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a (String, Vec<u8>);
    type IntoIter = slice::Iter<'a, (String, Vec<u8>)>;
    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Hop-by-hop fields are meaningful for one connection only and must not
/// cross the proxy in either direction.
pub fn is_hop_by_hop(name: &str) -> bool {
    name.eq_ignore_ascii_case("Connection")
    || name.eq_ignore_ascii_case("Proxy-Connection")
    || name.eq_ignore_ascii_case("Keep-Alive")
    || name.eq_ignore_ascii_case("Transfer-Encoding")
    || name.eq_ignore_ascii_case("TE")
    || name.eq_ignore_ascii_case("Trailer")
    || name.eq_ignore_ascii_case("Upgrade")
}

fn is_lws(c: u8) -> bool {
    matches!(c, b'\r' | b'\n' | b' ' | b'\t')
}

// Header values are byte sequences; a token matches case insensitively
// with any amount of surrounding whitespace, and nothing else around it.
fn token_equals(val: &[u8], token: &[u8]) -> bool {
    let mut rest = val.iter().skip_while(|&&c| is_lws(c));
    for &want in token {
        match rest.next() {
            Some(&c) if c.to_ascii_lowercase() == want => {}
            _ => return false,
        }
    }
    rest.all(|&c| is_lws(c))
}

/// True for a `Connection` value part asking to drop the connection.
pub fn is_close(val: &[u8]) -> bool {
    token_equals(val, b"close")
}

/// True for a `Transfer-Encoding` value part naming chunked framing.
pub fn is_chunked(val: &[u8]) -> bool {
    token_equals(val, b"chunked")
}

#[cfg(test)]
mod test {
    use super::{HeaderList, is_chunked, is_close, is_hop_by_hop};

    #[test]
    fn test_chunked() {
        assert!(is_chunked(b"chunked"));
        assert!(is_chunked(b"Chunked"));
        assert!(is_chunked(b"CHUNKED"));
        assert!(is_chunked(b"   CHUNKED  "));
        assert!(!is_chunked(b"   CHUNKED 1 "));
        assert!(!is_chunked(b"gzip"));
    }

    #[test]
    fn test_close() {
        assert!(is_close(b"close"));
        assert!(is_close(b"Close"));
        assert!(is_close(b" CLOSE"));
        assert!(is_close(b"   close   "));
        assert!(!is_close(b"Close  1 "));
        assert!(!is_close(b" xclose   "));
        assert!(!is_close(b"keep-alive"));
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("proxy-connection"));
        assert!(is_hop_by_hop("TRANSFER-ENCODING"));
        assert!(!is_hop_by_hop("Content-Type"));
        assert!(!is_hop_by_hop("Content-Length"));
    }

    #[test]
    fn order_and_duplicates() {
        let mut h = HeaderList::new();
        h.add("Accept", &b"*/*"[..]);
        h.add("X-Tag", &b"one"[..]);
        h.add("x-tag", &b"two"[..]);
        assert_eq!(h.len(), 3);
        assert_eq!(h.get("accept"), Some(&b"*/*"[..]));
        assert_eq!(h.get("X-TAG"), Some(&b"one"[..]));
        let names: Vec<&str> = h.iter().map(|&(ref n, _)| &n[..]).collect();
        assert_eq!(names, vec!["Accept", "X-Tag", "x-tag"]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut h = HeaderList::new();
        h.add("Host", &b"h"[..]);
        h.add("Max-Forwards", &b"3"[..]);
        h.add("Accept", &b"*/*"[..]);
        assert!(h.replace("max-forwards", b"2".to_vec()));
        assert_eq!(h.get("Max-Forwards"), Some(&b"2"[..]));
        let names: Vec<&str> = h.iter().map(|&(ref n, _)| &n[..]).collect();
        assert_eq!(names, vec!["Host", "Max-Forwards", "Accept"]);
        assert!(!h.replace("Via", b"1.1 p".to_vec()));
    }
}
