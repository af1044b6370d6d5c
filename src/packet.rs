//! Logical packets.

use bytes::Bytes;

use crate::error::ReleasedResourceError;
use crate::lifecycle::ReleaseFlag;

/// One logical data unit plus its framing metadata.
///
/// Packets built with [`Packet::new`] own their payload outright. Packets
/// returned by [`StreamState::packetout`](crate::StreamState::packetout)
/// are tied to the stream that produced them: once that stream is
/// released, [`payload`](Packet::payload) fails with
/// [`ReleasedResourceError`]. Metadata accessors stay readable either way.
///
/// # Example
///
/// ```
/// use oggframe::Packet;
///
/// let packet = Packet::new(vec![1, 2, 3], true, false, 48_000, 0);
/// assert_eq!(packet.payload().unwrap(), &[1, 2, 3]);
/// assert!(packet.bos());
/// assert!(!packet.eos());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Packet {
    payload: Bytes,
    bos: bool,
    eos: bool,
    granule_position: i64,
    sequence_number: i64,
    owner: Option<ReleaseFlag>,
}

impl Packet {
    /// Build a packet for submission to an encoding stream.
    ///
    /// A zero-length payload is a legal packet, distinct from "no packet".
    pub fn new(
        payload: impl Into<Bytes>,
        bos: bool,
        eos: bool,
        granule_position: i64,
        sequence_number: i64,
    ) -> Self {
        Self {
            payload: payload.into(),
            bos,
            eos,
            granule_position,
            sequence_number,
            owner: None,
        }
    }

    /// Decoded packet tied to the stream state that reassembled it.
    pub(crate) fn from_stream(
        payload: Bytes,
        bos: bool,
        eos: bool,
        granule_position: i64,
        sequence_number: i64,
        owner: ReleaseFlag,
    ) -> Self {
        Self {
            payload,
            bos,
            eos,
            granule_position,
            sequence_number,
            owner: Some(owner),
        }
    }

    /// The packet's bytes.
    ///
    /// Fails with [`ReleasedResourceError`] if this packet came out of a
    /// stream state that has since been released. An empty slice is a
    /// valid result, not an error.
    pub fn payload(&self) -> Result<&[u8], ReleasedResourceError> {
        if let Some(owner) = &self.owner {
            owner.ensure_active()?;
        }
        Ok(&self.payload)
    }

    /// Payload length in bytes.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// True if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// This packet opens its logical stream.
    #[inline]
    pub fn bos(&self) -> bool {
        self.bos
    }

    /// This packet closes its logical stream.
    #[inline]
    pub fn eos(&self) -> bool {
        self.eos
    }

    /// Codec-defined position counter; -1 for decoded packets that do not
    /// end a page.
    #[inline]
    pub fn granule_position(&self) -> i64 {
        self.granule_position
    }

    /// Position of this packet within its stream.
    #[inline]
    pub fn sequence_number(&self) -> i64 {
        self.sequence_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_blank() {
        let packet = Packet::default();
        assert_eq!(packet.payload().unwrap(), b"");
        assert_eq!(packet.payload_len(), 0);
        assert!(packet.is_empty());
        assert!(!packet.bos());
        assert!(!packet.eos());
        assert_eq!(packet.granule_position(), 0);
        assert_eq!(packet.sequence_number(), 0);
    }

    #[test]
    fn test_new_carries_metadata() {
        let packet = Packet::new(vec![9u8; 300], false, true, -1, 42);
        assert_eq!(packet.payload_len(), 300);
        assert!(!packet.bos());
        assert!(packet.eos());
        assert_eq!(packet.granule_position(), -1);
        assert_eq!(packet.sequence_number(), 42);
    }

    #[test]
    fn test_zero_length_payload_is_valid() {
        let packet = Packet::new(Vec::new(), false, false, 5, 1);
        assert_eq!(packet.payload().unwrap(), b"");
    }

    #[test]
    fn test_caller_packet_survives_any_release() {
        // No owner: payload is never guarded.
        let packet = Packet::new(vec![1, 2], false, false, 0, 0);
        assert!(packet.payload().is_ok());
    }

    #[test]
    fn test_stream_packet_guards_payload_after_release() {
        let flag = ReleaseFlag::new();
        let packet = Packet::from_stream(Bytes::from_static(b"data"), false, false, 3, 0, flag.clone());

        assert_eq!(packet.payload().unwrap(), b"data");

        flag.release();
        assert_eq!(packet.payload(), Err(ReleasedResourceError));
        // Metadata stays readable.
        assert_eq!(packet.granule_position(), 3);
        assert_eq!(packet.payload_len(), 4);
    }
}
