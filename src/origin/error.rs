use std::io;

use httparse::Error as HttpError;
use httparse::InvalidChunkSize;

use base_serializer::HeaderError;
use body_parser::BodyError;


quick_error! {
    #[derive(Debug)]
    /// Error of the origin-side machinery
    pub enum Error {
        /// No origin is registered or currently reachable
        Unavailable {
            description("no origin available")
        }
        /// I/O (basically networking) error on the upstream connection
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// Bad reply headers received from the upstream server
        Headers(err: HttpError) {
            description("bad reply headers")
            display("bad reply headers: {}", err)
            from()
        }
        /// Bad chunk framing in the upstream reply body
        ChunkSize(err: InvalidChunkSize) {
            description("invalid chunk size")
            from()
        }
        /// Upstream reply body cannot be classified
        Body(err: BodyError) {
            description("bad reply body framing")
            display("bad reply body framing: {}", err)
            from()
        }
        /// The request cannot be written in valid wire form
        Serialize(err: HeaderError) {
            description("request serialization error")
            display("request serialization error: {}", err)
            from()
        }
        /// Connection reset by the origin while reading reply headers
        ResetOnReplyHeaders {
            description("connection closed prematurely while reading headers")
        }
        /// Connection reset by the origin while reading the reply body
        ResetOnReplyBody {
            description("connection closed prematurely while reading body")
        }
    }
}
