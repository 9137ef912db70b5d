use bytes::{Buf, BufMut};
use thiserror::Error;

/// Fixed size in bytes of a [`ChunkHeader`] on the wire.
pub const CHUNK_HEADER_LEN: usize = 16;

/// Errors raised decoding wire frames.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("short read: need {need} bytes, got {got}")]
    ShortBuffer { need: usize, got: usize },
    #[error("sequence number 0 is reserved and must not appear on the wire")]
    ReservedSeqNo,
}

/// Flag bits carried in [`ChunkHeader::flag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkFlags(u8);

impl ChunkFlags {
    /// This chunk's `seq_no` is the appliance's end-of-stream marker.
    pub const END_OF_STREAM: Self = Self(0b0000_0001);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::END_OF_STREAM.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Per-chunk framing header sent immediately before a chunk's payload on a
/// data connection.
///
/// Layout (16 bytes, packed): `seq_no:u32`, `xfer_length:u32`,
/// `data_length:u32`, `flag:u8`, 3 reserved bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Global, monotonically assigned sequence number. `0` is reserved.
    pub seq_no: u32,
    /// Number of bytes to read off the wire for this chunk's payload.
    pub xfer_length: u32,
    /// Logical payload length after header rewrite (`<= xfer_length`).
    pub data_length: u32,
    pub flag: ChunkFlags,
}

impl ChunkHeader {
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.flag.contains(ChunkFlags::END_OF_STREAM)
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.seq_no);
        buf.put_u32_le(self.xfer_length);
        buf.put_u32_le(self.data_length);
        buf.put_u8(self.flag.bits());
        buf.put_bytes(0, 3);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < CHUNK_HEADER_LEN {
            return Err(WireError::ShortBuffer {
                need: CHUNK_HEADER_LEN,
                got: buf.remaining(),
            });
        }
        let seq_no = buf.get_u32_le();
        let xfer_length = buf.get_u32_le();
        let data_length = buf.get_u32_le();
        let flag = ChunkFlags::from_bits_truncate(buf.get_u8());
        buf.advance(3);
        Ok(Self {
            seq_no,
            xfer_length,
            data_length,
            flag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_through_encode_decode() {
        let header = ChunkHeader {
            seq_no: 42,
            xfer_length: 262_144,
            data_length: 262_000,
            flag: ChunkFlags::empty(),
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), CHUNK_HEADER_LEN);
        let decoded = ChunkHeader::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn end_of_stream_flag_round_trips() {
        let header = ChunkHeader {
            seq_no: 7,
            xfer_length: 0,
            data_length: 0,
            flag: ChunkFlags::END_OF_STREAM,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        let decoded = ChunkHeader::decode(&mut buf.freeze()).unwrap();
        assert!(decoded.is_end_of_stream());
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let mut buf = BytesMut::from(&[0u8; 4][..]);
        let err = ChunkHeader::decode(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::ShortBuffer { .. }));
    }
}
