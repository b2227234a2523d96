//! An asynchronous HTTP/1.x forward proxy core for the `tokio` stack
//!
//! The crate is split along the two sides of a proxied exchange:
//!
//! * [`ua`](ua/index.html) -- the user-agent-facing connection handler:
//!   one `Proto` future per accepted socket, driving incremental request
//!   parsing, the forwarding decision and reply streaming
//! * [`origin`](origin/index.html) -- the origin-facing machinery: the
//!   dispatcher that picks an upstream, the per-request worker and the
//!   lifetime link over which reply events travel back
extern crate futures;
extern crate httparse;
extern crate tokio_core;
extern crate tokio_io;
extern crate tk_bufstream;
extern crate netbuf;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate matches;
#[macro_use] extern crate log;

pub mod origin;
pub mod ua;
mod base_serializer;
mod body_parser;
mod chunked;
mod enums;
mod headers;
mod request;

pub use enums::{Status, Version};
pub use headers::HeaderList;
pub use request::Request;
