use futures::{Async, Stream};
use futures::sync::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

use headers::HeaderList;
use super::{Reply, ReplyEvent};

/// The peer of the link went away.
///
/// For the worker this means the connection handler dropped its side
/// (the client is gone) and remaining events have nowhere to go.
#[derive(Debug)]
pub struct LinkBroken;

/// Receiving half of the lifetime link between a connection handler and
/// the origin worker serving one of its requests.
///
/// The event stream ending before a terminal event (a complete reply, or
/// the trailer of a chunked one) means the worker died; the handler
/// observes that as origin termination.
pub struct WorkerLink {
    rx: UnboundedReceiver<ReplyEvent>,
}

/// Sending half of the link, owned by the worker.
///
/// Dropping it without having delivered a complete reply breaks the
/// link, which the handler turns into a 500 for the waiting client.
pub struct ReplySender {
    tx: UnboundedSender<ReplyEvent>,
}

/// Create a linked sender/receiver pair.
pub fn link() -> (ReplySender, WorkerLink) {
    let (tx, rx) = unbounded();
    (ReplySender { tx: tx }, WorkerLink { rx: rx })
}

impl WorkerLink {
    /// Poll for the next worker event. `None` means the link is broken.
    pub fn poll_event(&mut self) -> Async<Option<ReplyEvent>> {
        self.rx.poll().expect("unbounded receiver never errors")
    }
}

impl ReplySender {
    pub fn reply(&self, reply: Reply) -> Result<(), LinkBroken> {
        self.tx.unbounded_send(ReplyEvent::Reply(reply))
            .map_err(|_| LinkBroken)
    }
    pub fn chunk(&self, data: Vec<u8>) -> Result<(), LinkBroken> {
        self.tx.unbounded_send(ReplyEvent::Chunk(data))
            .map_err(|_| LinkBroken)
    }
    pub fn trailer(&self, trailer: HeaderList) -> Result<(), LinkBroken> {
        self.tx.unbounded_send(ReplyEvent::Trailer(trailer))
            .map_err(|_| LinkBroken)
    }
}
