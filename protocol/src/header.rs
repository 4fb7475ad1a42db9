//! The fixed 16-byte frame header.
//!
//! Layout, all multi-byte fields in network byte order:
//!
//! ```text
//! offset  size  field
//! 0       1     packet type
//! 1       1     packet id (echoed by ACK/NACK, opaque otherwise)
//! 2       1     role
//! 3       3     reserved, must be sent as zero
//! 6       2     payload size
//! 8       4     timestamp, seconds
//! 12      4     timestamp, nanoseconds
//! ```

use bytes::{Buf, BufMut};

/// Size in bytes of an encoded [`PacketHeader`].
pub const HEADER_SIZE: usize = 16;

/// A decoded frame header. Carries no payload bytes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: u8,
    pub id: u8,
    pub role: u8,
    pub size: u16,
    pub timestamp_sec: u32,
    pub timestamp_nsec: u32,
}

impl PacketHeader {
    /// Builds a header for a payload of `size` bytes, stamped with the given
    /// timestamp. The timestamp is supplied by the caller rather than read
    /// from the clock here, so the codec stays free of ambient state.
    pub fn new(
        packet_type: u8,
        id: u8,
        role: u8,
        size: u16,
        timestamp_sec: u32,
        timestamp_nsec: u32,
    ) -> Self {
        Self {
            packet_type,
            id,
            role,
            size,
            timestamp_sec,
            timestamp_nsec,
        }
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.packet_type);
        out.put_u8(self.id);
        out.put_u8(self.role);
        out.put_slice(&[0u8; 3]);
        out.put_u16(self.size);
        out.put_u32(self.timestamp_sec);
        out.put_u32(self.timestamp_nsec);
    }

    pub fn decode(mut buf: impl Buf) -> Self {
        let packet_type = buf.get_u8();
        let id = buf.get_u8();
        let role = buf.get_u8();
        buf.advance(3);
        let size = buf.get_u16();
        let timestamp_sec = buf.get_u32();
        let timestamp_nsec = buf.get_u32();
        Self {
            packet_type,
            id,
            role,
            size,
            timestamp_sec,
            timestamp_nsec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_through_bytes() {
        let header = PacketHeader::new(7, 42, 1, 12, 1_700_000_000, 123_456);
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);
        let decoded = PacketHeader::decode(&mut buf);
        assert_eq!(decoded, header);
    }

    #[test]
    fn reserved_bytes_encode_as_zero() {
        let header = PacketHeader::new(1, 1, 1, 0, 0, 0);
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);
        assert_eq!(&buf[3..6], &[0, 0, 0]);
    }
}
