//! The seams between the reactor and the code that speaks a protocol over it.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::NetError;

/// Resolves once an asynchronous engine operation finishes.
///
/// Await it from async code, or call [`Completion::blocking_wait`] from a
/// plain thread. A completion whose operation was dropped by the engine
/// resolves to [`NetError::Closed`].
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, NetError>>,
}

pub(crate) type Resolver<T> = oneshot::Sender<Result<T, NetError>>;

impl<T> Completion<T> {
    pub(crate) fn channel() -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// An already resolved completion.
    pub fn ready(result: Result<T, NetError>) -> Self {
        let (tx, completion) = Self::channel();
        let _ = tx.send(result);
        completion
    }

    /// Blocks the calling thread until the operation finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime.
    pub fn blocking_wait(self) -> Result<T, NetError> {
        self.rx.blocking_recv().unwrap_or(Err(NetError::Closed))
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, NetError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(NetError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Outbound side of one live connection, handed to its [`StreamConnection`].
pub trait WriteTarget: Send + Sync {
    /// Queues `bytes` for sending. The completion resolves once every byte
    /// reached the socket, or fails if the connection closes first.
    ///
    /// Fails immediately with [`NetError::OutboundOverflow`] when the bytes
    /// do not fit the connection's outbound budget; the connection then
    /// closes after flushing what was already queued.
    fn write_bytes(&self, bytes: &[u8]) -> Result<Completion<()>, NetError>;

    /// Asks the engine to close the connection. Safe to call repeatedly and
    /// from inside callbacks.
    fn close_connection(&self);
}

/// Protocol logic for one connection.
///
/// Callbacks run on the engine's thread, one at a time per connection, and
/// never while the engine holds a lock.
pub trait StreamConnection: Send {
    /// Offers the bytes read so far. Returns how many were consumed; the rest
    /// is offered again, followed by new data, on the next read.
    ///
    /// An error closes the connection.
    fn receive_bytes(&mut self, buf: &[u8]) -> Result<usize, NetError>;

    fn connection_opened(&mut self);

    /// Called exactly once for every connection the engine accepted.
    fn connection_closed(&mut self);

    /// Called before [`connection_opened`](Self::connection_opened).
    fn set_write_target(&mut self, target: Arc<dyn WriteTarget>);

    /// Largest message this connection expects; sizes the read buffer and
    /// the outbound budget.
    fn max_message_size(&self) -> usize;
}

/// Builds a [`StreamConnection`] for each accepted inbound socket.
pub trait StreamConnectionFactory: Send + Sync {
    /// Returning `None` rejects the peer; its socket is closed.
    fn new_connection(&self, addr: IpAddr, port: u16) -> Option<Box<dyn StreamConnection>>;
}

impl<F> StreamConnectionFactory for F
where
    F: Fn(IpAddr, u16) -> Option<Box<dyn StreamConnection>> + Send + Sync,
{
    fn new_connection(&self, addr: IpAddr, port: u16) -> Option<Box<dyn StreamConnection>> {
        self(addr, port)
    }
}
