//! Shared bookkeeping for every decoded or locally built message.
//!
//! A message remembers where its encoding lives (`raw[offset..offset + length]`)
//! so that an unmodified message can be re-serialized without walking its
//! fields. Any mutation drops that cache first. Messages that live inside a
//! container (a [`PeerAddress`](crate::wire::PeerAddress) inside an address
//! list) also carry a [`ChildLink`] naming their owner, and the container
//! drops its own cache when a child reports that it changed.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::WireError;
use crate::wire::codec::Serializer;
use crate::wire::constants::MAX_MESSAGE_SIZE;
use crate::wire::encode::varint_size;

/// Identity of a container message, handed to its children.
///
/// This is a plain id, not a pointer: a child never keeps its owner alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerHandle(u64);

impl OwnerHandle {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Back-reference from a child message to the container that owns it.
#[derive(Debug, Default)]
pub struct ChildLink {
    owner: Option<OwnerHandle>,
    owner_stale: bool,
}

impl ChildLink {
    pub(crate) fn owned_by(owner: OwnerHandle) -> Self {
        Self {
            owner: Some(owner),
            owner_stale: false,
        }
    }

    pub fn owner(&self) -> Option<OwnerHandle> {
        self.owner
    }

    pub(crate) fn attach(&mut self, owner: OwnerHandle) {
        self.owner = Some(owner);
        self.owner_stale = false;
    }

    pub(crate) fn detach(&mut self) {
        self.owner = None;
        self.owner_stale = false;
    }

    /// Records that the child's bytes changed and its owner must drop its cache.
    pub(crate) fn mark_changed(&mut self) {
        if self.owner.is_some() {
            self.owner_stale = true;
        }
    }

    /// Consumes a pending change notice addressed to `owner`.
    pub(crate) fn take_change(&mut self, owner: OwnerHandle) -> bool {
        let changed = self.owner_stale && self.owner == Some(owner);
        self.owner_stale = false;
        changed
    }
}

/// Serializer, cached bytes and length of one message.
#[derive(Debug, Clone)]
pub struct MessageState {
    serializer: Serializer,
    raw: Option<Bytes>,
    offset: usize,
    length: Option<usize>,
}

impl MessageState {
    /// State of a message built by the caller: nothing cached yet.
    pub(crate) fn empty(serializer: Serializer, length: Option<usize>) -> Self {
        Self {
            serializer,
            raw: None,
            offset: 0,
            length,
        }
    }

    /// State of a message just parsed from `raw[offset..offset + length]`.
    ///
    /// The source buffer is only kept when the serializer retains raw bytes.
    pub(crate) fn parsed(serializer: Serializer, raw: &Bytes, offset: usize, length: usize) -> Self {
        let raw = serializer.is_parse_retain().then(|| raw.clone());
        Self {
            serializer,
            raw,
            offset,
            length: Some(length),
        }
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Exact encoded size when known.
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn is_cached(&self) -> bool {
        self.raw.is_some()
    }

    pub(crate) fn set_serializer(&mut self, serializer: Serializer) {
        self.serializer = serializer;
    }

    pub(crate) fn set_length(&mut self, length: Option<usize>) {
        self.length = length;
    }

    /// Drops the cached bytes. Must run before any field changes.
    pub(crate) fn uncache(&mut self) {
        self.raw = None;
        self.offset = 0;
    }

    /// Updates the known length after a child collection changed.
    ///
    /// `new_count` is the collection size after growing by one element (0 when
    /// the size did not change); the bytes of the count prefix are accounted
    /// for. A `None` delta makes the length unknown.
    pub(crate) fn adjust_length(&mut self, new_count: usize, delta: Option<isize>) {
        let Some(length) = self.length else {
            return;
        };
        let Some(delta) = delta else {
            self.length = None;
            return;
        };
        let mut adjusted = length as isize + delta;
        if new_count != 0 {
            adjusted += varint_size(new_count as u64) as isize
                - varint_size(new_count as u64 - 1) as isize;
        }
        self.length = usize::try_from(adjusted).ok();
    }

    fn cached_slice(&self) -> Option<&[u8]> {
        let raw = self.raw.as_ref()?;
        let length = self.length?;
        raw.get(self.offset..self.offset + length)
    }
}

/// Capability shared by every message variant.
pub trait WireMessage {
    fn state(&self) -> &MessageState;

    fn state_mut(&mut self) -> &mut MessageState;

    /// Writes the payload from the message's fields, ignoring any cache.
    fn serialize_fields(&self, out: &mut Vec<u8>) -> Result<(), WireError>;

    fn message_size(&self) -> Option<usize> {
        self.state().length
    }

    /// Returns the encoded payload, reusing cached bytes when possible.
    ///
    /// The returned buffer may be shared with the message's cache; it is
    /// immutable, so callers cannot corrupt it.
    fn unsafe_serialize(&mut self) -> Result<Bytes, WireError> {
        let state = self.state();
        if let (Some(raw), Some(length)) = (&state.raw, state.length) {
            if state.offset == 0 && length == raw.len() {
                return Ok(raw.clone());
            }
            if let Some(slice) = raw.get(state.offset..state.offset + length) {
                return Ok(Bytes::copy_from_slice(slice));
            }
        }

        let mut out = Vec::with_capacity(state.length.map_or(32, |l| l + 32));
        self.serialize_fields(&mut out)?;
        if out.len() > MAX_MESSAGE_SIZE {
            return Err(WireError::MessageTooLarge(out.len()));
        }

        let bytes = Bytes::from(out);
        let state = self.state_mut();
        state.length = Some(bytes.len());
        if state.serializer.is_parse_retain() {
            // The fresh buffer replaces any larger parent buffer we were slicing.
            state.raw = Some(bytes.clone());
            state.offset = 0;
        }
        Ok(bytes)
    }

    /// Returns a copy of the encoded payload that the caller owns.
    fn serialize(&mut self) -> Result<Vec<u8>, WireError> {
        Ok(self.unsafe_serialize()?.to_vec())
    }

    /// Appends the encoding to `out`, from cache when available.
    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        match self.state().cached_slice() {
            Some(slice) => {
                out.extend_from_slice(slice);
                Ok(())
            }
            None => self.serialize_fields(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkParams;

    fn serializer(retain: bool) -> Serializer {
        Serializer::new(NetworkParams::mainnet(), retain)
    }

    #[test]
    fn adjust_length_accounts_for_varint_growth() {
        let mut state = MessageState::empty(serializer(false), Some(1 + 252 * 30));
        // 253rd element: the count prefix grows from 1 to 3 bytes.
        state.adjust_length(253, Some(30));
        assert_eq!(state.length(), Some(3 + 253 * 30));

        state.adjust_length(254, Some(30));
        assert_eq!(state.length(), Some(3 + 254 * 30));
    }

    #[test]
    fn adjust_length_without_count_change() {
        let mut state = MessageState::empty(serializer(false), Some(40));
        state.adjust_length(0, Some(-6));
        assert_eq!(state.length(), Some(34));
    }

    #[test]
    fn unknown_delta_collapses_length() {
        let mut state = MessageState::empty(serializer(false), Some(40));
        state.adjust_length(2, None);
        assert_eq!(state.length(), None);

        // Once unknown, further adjustments are ignored.
        state.adjust_length(3, Some(30));
        assert_eq!(state.length(), None);
    }

    #[test]
    fn parsed_state_keeps_bytes_only_in_retain_mode() {
        let raw = Bytes::from_static(&[1, 2, 3, 4]);
        assert!(MessageState::parsed(serializer(true), &raw, 1, 2).is_cached());
        assert!(!MessageState::parsed(serializer(false), &raw, 1, 2).is_cached());
    }

    #[test]
    fn change_notice_only_reaches_current_owner() {
        let first = OwnerHandle::next();
        let second = OwnerHandle::next();
        let mut link = ChildLink::owned_by(first);

        link.mark_changed();
        assert!(!link.take_change(second));

        link.mark_changed();
        assert!(link.take_change(first));
        assert!(!link.take_change(first));

        link.detach();
        link.mark_changed();
        assert!(!link.take_change(first));
    }
}
