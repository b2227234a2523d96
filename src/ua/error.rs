use std::io;

use httparse;

use base_serializer::HeaderError;
use origin;


quick_error! {
    #[derive(Debug)]
    pub enum Error {
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        ParseError(err: httparse::Error) {
            description("parse error")
            display("parse error: {:?}", err)
            from()
        }
        BadRequestTarget {
            description("error parsing request target")
        }
        ContentLengthInvalid {
            description("invalid content-length header")
        }
        DuplicateContentLength {
            description("duplicate content length header")
        }
        RequestBodyTooLong {
            description("request body too large to buffer")
        }
        ReplyHeaders(err: HeaderError) {
            description("reply serialization error")
            display("reply serialization error: {}", err)
            from()
        }
        Origin(err: origin::Error) {
            description("origin dispatch error")
            display("origin dispatch error: {}", err)
            from()
        }
    }
}
