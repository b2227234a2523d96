//! The origin-side machinery: dispatching, the worker lifetime link and
//! the events a worker delivers back to the connection handler
//!
mod dispatch;
mod error;
mod link;
mod worker;

pub use self::dispatch::{Dispatcher, Origin, Pool, TcpOrigin};
pub use self::error::Error;
pub use self::link::{link, LinkBroken, ReplySender, WorkerLink};

use headers::HeaderList;

/// A reply delivered by an origin worker.
///
/// `body == None` means the body follows as chunk events over the link.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub code: u16,
    /// Reason phrase; a default one is resolved from `code` when absent
    pub reason: Option<String>,
    pub headers: HeaderList,
    pub body: Option<Vec<u8>>,
}

/// Events delivered over the worker link.
///
/// Protocol order: exactly one `Reply`; iff its body is absent, zero or
/// more `Chunk`s followed by exactly one `Trailer`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    Reply(Reply),
    Chunk(Vec<u8>),
    Trailer(HeaderList),
}
