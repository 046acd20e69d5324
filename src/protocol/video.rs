//! Video packet framing for the Galahad II LCD.
//!
//! An encoded frame is split into 1013-byte chunks, each carried by one
//! 1024-byte packet:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 1 | `0x02` |
//! | 1 | 1 | `0x0D` |
//! | 2-5 | 4 | total payload length, big-endian |
//! | 6-8 | 3 | sequence number, big-endian |
//! | 9-10 | 2 | chunk length, big-endian |
//! | 11.. | <=1013 | chunk bytes, zero padded to 1024 |

use byteorder::{BigEndian, ByteOrder};

use crate::error::{GalahadError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Video packet header: [0x02, 0x0D].
pub const VIDEO_HEADER: [u8; 2] = [0x02, 0x0D];

/// Fixed size of every video packet.
pub const VIDEO_PACKET_SIZE: usize = 1024;

/// Bytes before the chunk payload.
pub const VIDEO_HEADER_SIZE: usize = 11;

/// Maximum chunk bytes per packet.
pub const CHUNK_SIZE: usize = VIDEO_PACKET_SIZE - VIDEO_HEADER_SIZE;

const OFFSET_TOTAL_LEN: usize = 2;
const OFFSET_SEQUENCE: usize = 6;
const OFFSET_CHUNK_LEN: usize = 9;

/// Number of packets needed to carry `len` payload bytes.
pub const fn packet_count(len: usize) -> usize {
    len.div_ceil(CHUNK_SIZE)
}

// =============================================================================
// Encoded Payload
// =============================================================================

/// One encoded frame, ready for framing.
///
/// Never empty and never longer than the 4-byte length field allows, so every
/// payload frames into at least one well-formed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload(Vec<u8>);

impl EncodedPayload {
    /// Wrap encoder output.
    ///
    /// # Errors
    /// `EmptyPayload` for zero bytes, `PayloadTooLarge` past `u32::MAX` bytes.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(GalahadError::EmptyPayload);
        }
        if u32::try_from(bytes.len()).is_err() {
            return Err(GalahadError::PayloadTooLarge(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into transport packets, in sequence order.
    pub fn packets(&self) -> VideoPackets<'_> {
        frame_for_transport(self)
    }
}

// =============================================================================
// Video Packet
// =============================================================================

/// A single 1024-byte video packet.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoPacket([u8; VIDEO_PACKET_SIZE]);

impl VideoPacket {
    fn build(total_len: u32, sequence: u32, chunk: &[u8]) -> Self {
        let mut buf = [0u8; VIDEO_PACKET_SIZE];

        buf[0..2].copy_from_slice(&VIDEO_HEADER);
        BigEndian::write_u32(&mut buf[OFFSET_TOTAL_LEN..OFFSET_SEQUENCE], total_len);
        BigEndian::write_u24(&mut buf[OFFSET_SEQUENCE..OFFSET_CHUNK_LEN], sequence);
        BigEndian::write_u16(
            &mut buf[OFFSET_CHUNK_LEN..VIDEO_HEADER_SIZE],
            chunk.len() as u16,
        );
        buf[VIDEO_HEADER_SIZE..VIDEO_HEADER_SIZE + chunk.len()].copy_from_slice(chunk);

        Self(buf)
    }

    /// Raw packet bytes.
    pub fn as_bytes(&self) -> &[u8; VIDEO_PACKET_SIZE] {
        &self.0
    }

    /// Total payload length announced by this packet.
    pub fn total_len(&self) -> u32 {
        BigEndian::read_u32(&self.0[OFFSET_TOTAL_LEN..OFFSET_SEQUENCE])
    }

    /// Sequence number (24-bit).
    pub fn sequence(&self) -> u32 {
        BigEndian::read_u24(&self.0[OFFSET_SEQUENCE..OFFSET_CHUNK_LEN])
    }

    /// Number of payload bytes in this packet.
    pub fn chunk_len(&self) -> usize {
        BigEndian::read_u16(&self.0[OFFSET_CHUNK_LEN..VIDEO_HEADER_SIZE]) as usize
    }

    /// The payload bytes carried by this packet.
    pub fn chunk(&self) -> &[u8] {
        let len = self.chunk_len().min(CHUNK_SIZE);
        &self.0[VIDEO_HEADER_SIZE..VIDEO_HEADER_SIZE + len]
    }
}

impl std::fmt::Debug for VideoPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoPacket")
            .field("total_len", &self.total_len())
            .field("sequence", &self.sequence())
            .field("chunk_len", &self.chunk_len())
            .finish()
    }
}

// =============================================================================
// Framing
// =============================================================================

/// Iterator over the packets of one payload, in ascending sequence order.
#[derive(Debug, Clone)]
pub struct VideoPackets<'a> {
    payload: &'a [u8],
    total_len: u32,
    offset: usize,
    sequence: u32,
}

impl Iterator for VideoPackets<'_> {
    type Item = VideoPacket;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.payload.len() {
            return None;
        }

        let end = (self.offset + CHUNK_SIZE).min(self.payload.len());
        let packet = VideoPacket::build(
            self.total_len,
            self.sequence,
            &self.payload[self.offset..end],
        );

        self.offset = end;
        self.sequence += 1;
        Some(packet)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = packet_count(self.payload.len() - self.offset);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for VideoPackets<'_> {}

/// Split an encoded payload into video packets.
///
/// Every packet carries the total payload length, not its own chunk length,
/// in bytes 2-5. Sequence numbers start at 0 and increase by one.
pub fn frame_for_transport(payload: &EncodedPayload) -> VideoPackets<'_> {
    VideoPackets {
        payload: payload.as_bytes(),
        // EncodedPayload::new bounds the length to u32
        total_len: payload.len() as u32,
        offset: 0,
        sequence: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload(len: usize) -> EncodedPayload {
        EncodedPayload::new((0..len).map(|i| (i % 251) as u8).collect()).unwrap()
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            EncodedPayload::new(Vec::new()),
            Err(GalahadError::EmptyPayload)
        ));
    }

    #[test]
    fn test_single_byte_payload() {
        let p = payload(1);
        let packets: Vec<_> = p.packets().collect();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].chunk_len(), 1);
        assert_eq!(packets[0].total_len(), 1);
        assert_eq!(packets[0].sequence(), 0);
    }

    #[test]
    fn test_exact_chunk_size_is_one_packet() {
        let p = payload(CHUNK_SIZE);
        let packets: Vec<_> = p.packets().collect();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].chunk_len(), CHUNK_SIZE);
        // No padding left in a full packet
        assert_eq!(&packets[0].as_bytes()[VIDEO_HEADER_SIZE..], p.as_bytes());
    }

    #[test]
    fn test_one_past_chunk_size_is_two_packets() {
        let p = payload(CHUNK_SIZE + 1);
        let packets: Vec<_> = p.packets().collect();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].chunk_len(), 1);
        assert_eq!(packets[1].sequence(), 1);
    }

    #[test]
    fn test_header_bytes() {
        let p = payload(3000);
        let packets: Vec<_> = p.packets().collect();
        let first = packets[0].as_bytes();

        assert_eq!(first[0], 0x02);
        assert_eq!(first[1], 0x0D);
        // 3000 = 0x00000BB8
        assert_eq!(&first[2..6], &[0x00, 0x00, 0x0B, 0xB8]);
        assert_eq!(&first[6..9], &[0x00, 0x00, 0x00]);
        // 1013 = 0x03F5
        assert_eq!(&first[9..11], &[0x03, 0xF5]);

        let last = packets[2].as_bytes();
        assert_eq!(&last[6..9], &[0x00, 0x00, 0x02]);
        // 3000 - 2 * 1013 = 974 = 0x03CE
        assert_eq!(&last[9..11], &[0x03, 0xCE]);
    }

    #[test]
    fn test_short_chunk_is_zero_padded() {
        let p = EncodedPayload::new(vec![0xFF; 10]).unwrap();
        let packet = p.packets().next().unwrap();
        let bytes = packet.as_bytes();
        assert!(bytes[11..21].iter().all(|&b| b == 0xFF));
        assert!(bytes[21..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_exact_size_iterator() {
        let p = payload(5000);
        let mut packets = p.packets();
        assert_eq!(packets.len(), 5);
        packets.next();
        assert_eq!(packets.len(), 4);
    }

    #[test]
    fn test_packet_count() {
        assert_eq!(packet_count(0), 0);
        assert_eq!(packet_count(1), 1);
        assert_eq!(packet_count(1013), 1);
        assert_eq!(packet_count(1014), 2);
        assert_eq!(packet_count(10_000), 10);
    }

    proptest! {
        #[test]
        fn prop_framing_reconstructs_payload(bytes in proptest::collection::vec(any::<u8>(), 1..8000)) {
            let n = bytes.len();
            let p = EncodedPayload::new(bytes.clone()).unwrap();
            let packets: Vec<_> = p.packets().collect();

            prop_assert_eq!(packets.len(), n.div_ceil(1013));

            let mut rebuilt = Vec::with_capacity(n);
            for (k, packet) in packets.iter().enumerate() {
                prop_assert_eq!(packet.as_bytes().len(), 1024);
                prop_assert_eq!(packet.sequence() as usize, k);
                prop_assert_eq!(packet.total_len() as usize, n);
                prop_assert!(packet.chunk_len() >= 1 && packet.chunk_len() <= 1013);
                rebuilt.extend_from_slice(packet.chunk());
            }
            prop_assert_eq!(rebuilt, bytes);
        }
    }
}
