use std::net::SocketAddr;

use tokio_core::reactor::Handle;

use headers::HeaderList;
use request::Request;
use super::link::{link, WorkerLink};
use super::worker::Worker;
use super::Error;

/// Registry of origin workers.
///
/// The handler asks the dispatcher for an origin every time a request is
/// about to be forwarded; dispatch failure terminates the connection and
/// the next one retries.
pub trait Dispatcher {
    type Origin: Origin;
    /// Pick the closest origin ready to accept a request.
    fn get_closest_origin(&mut self) -> Result<Self::Origin, Error>;
}

/// A worker slot accepting exactly one request submission.
pub trait Origin {
    /// Hand the parsed request over for upstream processing.
    ///
    /// On success the returned link delivers the worker's reply events;
    /// the worker dying with the link unresolved surfaces on the link.
    fn submit(self, request: Request, headers: HeaderList,
              body: Option<Vec<u8>>)
        -> Result<WorkerLink, Error>;
}

/// A static set of upstream addresses handed out in rotation.
///
/// Stands in for a proximity-aware registry: with a static set every
/// member is equally close, so rotation keeps the load spread.
pub struct Pool {
    origins: Vec<SocketAddr>,
    next: usize,
    handle: Handle,
}

impl Pool {
    pub fn new(origins: Vec<SocketAddr>, handle: &Handle) -> Pool {
        Pool {
            origins: origins,
            next: 0,
            handle: handle.clone(),
        }
    }
}

impl Dispatcher for Pool {
    type Origin = TcpOrigin;
    fn get_closest_origin(&mut self) -> Result<TcpOrigin, Error> {
        if self.origins.is_empty() {
            return Err(Error::Unavailable);
        }
        let addr = self.origins[self.next % self.origins.len()];
        self.next = self.next.wrapping_add(1);
        Ok(TcpOrigin {
            addr: addr,
            handle: self.handle.clone(),
        })
    }
}

/// An origin worker slot bound to one upstream address.
pub struct TcpOrigin {
    addr: SocketAddr,
    handle: Handle,
}

impl Origin for TcpOrigin {
    fn submit(self, request: Request, headers: HeaderList,
              body: Option<Vec<u8>>)
        -> Result<WorkerLink, Error>
    {
        let (tx, rx) = link();
        let worker = Worker::new(&self.handle, self.addr,
            request, headers, body, tx);
        self.handle.spawn(worker);
        Ok(rx)
    }
}
