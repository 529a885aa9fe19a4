//! A [`StreamConnection`] that speaks framed protocol messages.
//!
//! [`PeerConnection`] lives inside the reactor and turns the byte stream into
//! [`Message`]s; [`PeerHandle`] is what the application keeps to send
//! messages and receive the decoded ones.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::NetError;
use crate::net::connection::{Completion, StreamConnection, StreamConnectionFactory, WriteTarget};
use crate::wire::codec::{MagicSearch, PacketHeader, Serializer};
use crate::wire::constants::{HEADER_LENGTH, MAX_MESSAGE_SIZE};
use crate::wire::message::{Message, Pong};

/// Decoded messages waiting for the application.
pub const INBOUND_QUEUE_CAPACITY: usize = 1000;

type TargetSlot = Arc<OnceLock<Arc<dyn WriteTarget>>>;

/// A frame whose header has been read but whose payload is still arriving.
struct PartialFrame {
    header: PacketHeader,
    payload: Vec<u8>,
}

/// Reactor side of a peer connection.
pub struct PeerConnection {
    serializer: Serializer,
    target: TargetSlot,
    inbound: mpsc::Sender<Message>,
    partial: Option<PartialFrame>,
    label: String,
}

/// Application side of a peer connection.
///
/// [`recv`](Self::recv) yields `None` once the connection has closed and
/// every queued message was taken.
pub struct PeerHandle {
    serializer: Serializer,
    target: TargetSlot,
    inbound: mpsc::Receiver<Message>,
}

impl PeerConnection {
    pub fn new(serializer: Serializer) -> (Self, PeerHandle) {
        Self::with_label(serializer, String::from("outbound"))
    }

    fn with_label(serializer: Serializer, label: String) -> (Self, PeerHandle) {
        let target: TargetSlot = Arc::new(OnceLock::new());
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let connection = Self {
            serializer: serializer.clone(),
            target: target.clone(),
            inbound: tx,
            partial: None,
            label,
        };
        let handle = PeerHandle {
            serializer,
            target,
            inbound: rx,
        };
        (connection, handle)
    }

    fn dispatch(&mut self, header: PacketHeader, payload: Bytes) -> Result<(), NetError> {
        let message = self.serializer.deserialize_payload(&header, payload)?;
        trace!(peer = %self.label, command = %header.command, size = header.size, "received");

        if let Message::Ping(ping) = &message {
            if let (Some(nonce), Some(target)) = (ping.nonce(), self.target.get()) {
                let mut pong = Message::from(Pong::new(self.serializer.clone(), nonce));
                let frame = self.serializer.frame(&mut pong)?;
                // The completion is not needed; a failed pong surfaces as a closed connection.
                drop(target.write_bytes(&frame)?);
            }
        }

        self.inbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NetError::Rejected("inbound queue is full".into()),
            mpsc::error::TrySendError::Closed(_) => NetError::Closed,
        })
    }
}

impl StreamConnection for PeerConnection {
    fn receive_bytes(&mut self, buf: &[u8]) -> Result<usize, NetError> {
        let mut consumed = 0;
        loop {
            if let Some(partial) = self.partial.as_mut() {
                let missing = partial.header.size - partial.payload.len();
                let take = missing.min(buf.len() - consumed);
                partial.payload.extend_from_slice(&buf[consumed..consumed + take]);
                consumed += take;
                if partial.payload.len() < partial.header.size {
                    return Ok(consumed);
                }
                if let Some(PartialFrame { header, payload }) = self.partial.take() {
                    self.dispatch(header, Bytes::from(payload))?;
                }
                continue;
            }

            let rest = &buf[consumed..];
            let start = match self.serializer.seek_past_magic(rest) {
                MagicSearch::Found(start) => start,
                MagicSearch::NotFound { discard } => {
                    if discard > 0 {
                        debug!(peer = %self.label, bytes = discard, "skipping bytes before magic");
                    }
                    return Ok(consumed + discard);
                }
            };
            let Some(raw) = rest.get(start..start + HEADER_LENGTH) else {
                // Keep the magic so the header is parsed once it is complete.
                return Ok(consumed + start - 4);
            };
            let header = self.serializer.deserialize_header(raw)?;
            consumed += start + HEADER_LENGTH;
            self.partial = Some(PartialFrame {
                payload: Vec::with_capacity(header.size),
                header,
            });
        }
    }

    fn connection_opened(&mut self) {
        info!(peer = %self.label, "peer connected");
    }

    fn connection_closed(&mut self) {
        info!(peer = %self.label, "peer disconnected");
    }

    fn set_write_target(&mut self, target: Arc<dyn WriteTarget>) {
        if self.target.set(target).is_err() {
            debug!(peer = %self.label, "write target already set");
        }
    }

    fn max_message_size(&self) -> usize {
        MAX_MESSAGE_SIZE
    }
}

impl PeerHandle {
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Frames and queues `message`.
    pub fn send_message(&self, message: &mut Message) -> Result<Completion<()>, NetError> {
        let target = self.target.get().ok_or(NetError::NotRunning)?;
        let frame = self.serializer.frame(message)?;
        target.write_bytes(&frame)
    }

    /// Next decoded message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// Next decoded message, blocking the calling thread.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<Message> {
        self.inbound.blocking_recv()
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.inbound.try_recv().ok()
    }

    pub fn close(&self) {
        if let Some(target) = self.target.get() {
            target.close_connection();
        }
    }
}

/// Hands out a [`PeerConnection`] for every inbound socket and reports the
/// matching [`PeerHandle`] on a channel.
pub struct PeerFactory {
    serializer: Serializer,
    accepted: mpsc::UnboundedSender<(SocketAddr, PeerHandle)>,
}

impl PeerFactory {
    pub fn new(serializer: Serializer) -> (Self, mpsc::UnboundedReceiver<(SocketAddr, PeerHandle)>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        (Self { serializer, accepted }, rx)
    }
}

impl StreamConnectionFactory for PeerFactory {
    fn new_connection(&self, addr: IpAddr, port: u16) -> Option<Box<dyn StreamConnection>> {
        let peer = SocketAddr::new(addr, port);
        let (connection, handle) = PeerConnection::with_label(self.serializer.clone(), peer.to_string());
        // Nobody is listening for handles any more: refuse the peer.
        self.accepted.send((peer, handle)).ok()?;
        Some(Box::new(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkParams;
    use crate::wire::message::{Ping, UnknownMessage};
    use parking_lot::Mutex;

    /// Records writes instead of sending them.
    #[derive(Default)]
    struct RecordingTarget {
        written: Mutex<Vec<Vec<u8>>>,
    }

    impl WriteTarget for RecordingTarget {
        fn write_bytes(&self, bytes: &[u8]) -> Result<Completion<()>, NetError> {
            self.written.lock().push(bytes.to_vec());
            Ok(Completion::ready(Ok(())))
        }

        fn close_connection(&self) {}
    }

    fn serializer() -> Serializer {
        Serializer::new(NetworkParams::regtest(), false)
    }

    fn frame(message: impl Into<Message>) -> Vec<u8> {
        serializer().frame(&mut message.into()).unwrap()
    }

    fn connected() -> (PeerConnection, PeerHandle, Arc<RecordingTarget>) {
        let (mut connection, handle) = PeerConnection::new(serializer());
        let target = Arc::new(RecordingTarget::default());
        connection.set_write_target(target.clone());
        (connection, handle, target)
    }

    #[test]
    fn frames_split_across_reads_are_reassembled() {
        let (mut connection, mut handle, _) = connected();
        let bytes = frame(UnknownMessage::new(serializer(), "blob", vec![7u8; 300]));

        let mut buffered = Vec::new();
        for chunk in bytes.chunks(50) {
            buffered.extend_from_slice(chunk);
            let used = connection.receive_bytes(&buffered).unwrap();
            buffered.drain(..used);
        }
        assert!(buffered.is_empty());

        let Some(Message::Unknown(msg)) = handle.try_recv() else {
            panic!("expected Message::Unknown");
        };
        assert_eq!(msg.command(), "blob");
        assert_eq!(msg.payload(), &[7u8; 300][..]);
    }

    #[test]
    fn short_header_is_left_in_the_buffer() {
        let (mut connection, mut handle, _) = connected();
        let bytes = frame(Ping::new(serializer(), 1));
        let mut noisy = vec![0xAA, 0xBB];
        noisy.extend_from_slice(&bytes[..10]);

        assert_eq!(connection.receive_bytes(&noisy).unwrap(), 2);
        assert!(handle.try_recv().is_none());
    }

    #[test]
    fn ping_is_answered_and_queued() {
        let (mut connection, mut handle, target) = connected();
        let bytes = frame(Ping::new(serializer(), 0xABCD));
        assert_eq!(connection.receive_bytes(&bytes).unwrap(), bytes.len());

        assert!(matches!(handle.try_recv(), Some(Message::Ping(_))));
        let written = target.written.lock();
        assert_eq!(written.len(), 1);
        let (pong, _) = serializer().deserialize(&written[0]).unwrap().unwrap();
        let Message::Pong(pong) = pong else {
            panic!("expected Message::Pong");
        };
        assert_eq!(pong.nonce(), 0xABCD);
    }

    #[test]
    fn corrupt_frame_is_an_error() {
        let (mut connection, _handle, _) = connected();
        let mut bytes = frame(Ping::new(serializer(), 1));
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            connection.receive_bytes(&bytes),
            Err(NetError::Wire(crate::error::WireError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn send_requires_a_live_connection() {
        let (_connection, handle) = PeerConnection::new(serializer());
        let mut ping = Message::from(Ping::new(serializer(), 1));
        assert!(matches!(handle.send_message(&mut ping), Err(NetError::NotRunning)));
    }
}
