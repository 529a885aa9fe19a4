//! Per-connection read/write/close state machine.

use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tracing::{debug, trace, warn};

use crate::error::NetError;
use crate::net::connection::{Completion, Resolver, StreamConnection, WriteTarget};
use crate::wire::constants::FRAME_OVERHEAD;

const BUFFER_SIZE_LOWER_BOUND: usize = 4096;
const BUFFER_SIZE_UPPER_BOUND: usize = 65536;

/// Live connections of one manager, keyed by connection id.
pub(crate) type Registry = Arc<Mutex<HashMap<u64, Arc<Shared>>>>;

pub(crate) fn new_registry() -> Registry {
    Arc::new(Mutex::new(HashMap::new()))
}

struct PendingWrite {
    bytes: Bytes,
    written: usize,
    done: Resolver<()>,
}

#[derive(Default)]
struct WriteState {
    queue: VecDeque<PendingWrite>,
    /// Bytes queued but not yet handed to the socket.
    remaining: usize,
    close_requested: bool,
    close_after_flush: bool,
    closed: bool,
}

/// The part of a connection other threads may touch.
pub(crate) struct Shared {
    id: u64,
    peer: SocketAddr,
    budget: usize,
    state: Mutex<WriteState>,
    wakeup: Notify,
}

impl Shared {
    fn new(peer: SocketAddr, max_message_size: usize) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            budget: max_message_size.saturating_add(FRAME_OVERHEAD),
            state: Mutex::new(WriteState::default()),
            wakeup: Notify::new(),
        }
    }
}

impl WriteTarget for Shared {
    fn write_bytes(&self, bytes: &[u8]) -> Result<Completion<()>, NetError> {
        let mut state = self.state.lock();
        if state.closed || state.close_requested || state.close_after_flush {
            return Err(NetError::Closed);
        }
        if state.remaining + bytes.len() > self.budget {
            let err = NetError::OutboundOverflow {
                queued: state.remaining,
                requested: bytes.len(),
                limit: self.budget,
            };
            state.close_after_flush = true;
            drop(state);
            warn!(peer = %self.peer, error = %err, "closing connection after flush");
            self.wakeup.notify_one();
            return Err(err);
        }

        let (done, completion) = Completion::channel();
        state.queue.push_back(PendingWrite {
            bytes: Bytes::copy_from_slice(bytes),
            written: 0,
            done,
        });
        state.remaining += bytes.len();
        drop(state);

        self.wakeup.notify_one();
        Ok(completion)
    }

    fn close_connection(&self) {
        self.state.lock().close_requested = true;
        self.wakeup.notify_one();
    }
}

/// Drives one socket until it closes.
pub(crate) struct ConnectionHandler {
    stream: TcpStream,
    shared: Arc<Shared>,
    connection: Box<dyn StreamConnection>,
    registry: Registry,
    read_buf: Vec<u8>,
    filled: usize,
}

impl ConnectionHandler {
    /// Wires `connection` to the socket, registers it and reports it opened.
    pub(crate) fn open(
        stream: TcpStream,
        peer: SocketAddr,
        mut connection: Box<dyn StreamConnection>,
        registry: Registry,
    ) -> Self {
        let max = connection.max_message_size();
        let shared = Arc::new(Shared::new(peer, max));
        let size = max.clamp(BUFFER_SIZE_LOWER_BOUND, BUFFER_SIZE_UPPER_BOUND);

        connection.set_write_target(shared.clone());
        registry.lock().insert(shared.id, shared.clone());
        connection.connection_opened();
        debug!(peer = %peer, id = shared.id, "connection opened");

        Self {
            stream,
            shared,
            connection,
            registry,
            read_buf: vec![0u8; size],
            filled: 0,
        }
    }

    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let result = self.serve(&mut shutdown).await;
        if let Err(e) = &result {
            warn!(peer = %self.shared.peer, error = %e, "closing connection");
        }
        self.close();
    }

    async fn serve(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<(), NetError> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }
            let want_write = {
                let state = self.shared.state.lock();
                if state.close_requested || (state.close_after_flush && state.queue.is_empty()) {
                    return Ok(());
                }
                !state.queue.is_empty()
            };
            let interest = if want_write {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };

            let ready = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    None
                }
                _ = self.shared.wakeup.notified() => None,
                ready = self.stream.ready(interest) => Some(ready?),
            };
            let Some(ready) = ready else {
                continue;
            };

            if ready.is_readable() && !self.read()? {
                debug!(peer = %self.shared.peer, "peer closed the stream");
                return Ok(());
            }
            if ready.is_writable() {
                self.flush()?;
            }
        }
    }

    /// Reads what the socket has and offers it to the connection.
    ///
    /// Returns false on end of stream.
    fn read(&mut self) -> Result<bool, NetError> {
        let n = match self.stream.try_read(&mut self.read_buf[self.filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        self.filled += n;
        trace!(peer = %self.shared.peer, bytes = n, "read");

        let consumed = self.connection.receive_bytes(&self.read_buf[..self.filled])?;
        if consumed > self.filled {
            return Err(NetError::Rejected(format!(
                "consumed {consumed} of {} buffered bytes",
                self.filled
            )));
        }
        self.read_buf.copy_within(consumed..self.filled, 0);
        self.filled -= consumed;
        if self.filled == self.read_buf.len() {
            return Err(NetError::Rejected("read buffer full and nothing consumed".into()));
        }
        Ok(true)
    }

    /// Pushes queued bytes into the socket until it would block.
    fn flush(&mut self) -> Result<(), NetError> {
        let mut finished = Vec::new();
        let result: std::io::Result<()> = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            loop {
                let Some(head) = state.queue.front_mut() else {
                    break Ok(());
                };
                if head.written < head.bytes.len() {
                    match self.stream.try_write(&head.bytes[head.written..]) {
                        Ok(n) => {
                            head.written += n;
                            state.remaining -= n;
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                        Err(e) => break Err(e),
                    }
                    continue;
                }
                if let Some(write) = state.queue.pop_front() {
                    finished.push(write.done);
                }
            }
        };
        for done in finished {
            let _ = done.send(Ok(()));
        }
        result.map_err(NetError::from)
    }

    fn close(mut self) {
        let pending = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.remaining = 0;
            std::mem::take(&mut state.queue)
        };
        self.registry.lock().remove(&self.shared.id);
        for write in pending {
            let _ = write.done.send(Err(NetError::Closed));
        }
        self.connection.connection_closed();
        debug!(peer = %self.shared.peer, id = self.shared.id, "connection closed");
    }
}
