//! The user-agent-side connection protocol implementation
//!
mod error;
mod parser;
mod proto;
mod request;

pub use self::error::Error;
pub use self::parser::{ReadMode, Token, Tokenizer};
pub use self::proto::Proto;
pub use self::request::{HeadDecision, PendingRequest, RequestTarget};

use std::sync::Arc;


/// Fine-grained configuration of a proxied connection
#[derive(Debug, Clone)]
pub struct Config {
    inflight_request_limit: usize,
    inflight_request_prealloc: usize,
    max_request_head_size: usize,
}

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            inflight_request_limit: 2,
            inflight_request_prealloc: 0,
            max_request_head_size: 65536,
        }
    }
    /// A number of requests handed to the origin side until we stop
    /// reading more requests from this connection
    pub fn inflight_request_limit(&mut self, value: usize) -> &mut Self {
        self.inflight_request_limit = value;
        self
    }
    /// Size of the queue that is preallocated for holding requests
    ///
    /// Should be smaller than `inflight_request_limit`.
    pub fn inflight_request_prealloc(&mut self, value: usize) -> &mut Self {
        self.inflight_request_prealloc = value;
        self
    }
    /// Cap on the total byte size of a request head
    ///
    /// A head over the cap is answered with 400 and the connection is
    /// closed; the body state is never entered.
    pub fn max_request_head_size(&mut self, value: usize) -> &mut Self {
        self.max_request_head_size = value;
        self
    }
    /// Create a Arc'd config clone to pass to the constructor
    ///
    /// This is just a convenience method.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}
