use bytes::{Buf, BufMut};

use crate::wire::WireError;

/// Fixed size in bytes of a [`PacketHeader`], equal to [`crate::PCAP_RECORD_HEADER_LEN`].
pub const PACKET_HEADER_LEN: usize = 16;

/// Compact per-packet header as received from the appliance, prefixed to
/// each packet inside a chunk's payload.
///
/// Layout (16 bytes, packed): `ts_ns:u64`, `length_captured:u16`,
/// `length_wire:u16`, `port_no:u8`, 3 reserved bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub ts_ns: u64,
    pub length_captured: u16,
    pub length_wire: u16,
    pub port_no: u8,
}

impl PacketHeader {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.ts_ns);
        buf.put_u16_le(self.length_captured);
        buf.put_u16_le(self.length_wire);
        buf.put_u8(self.port_no);
        buf.put_bytes(0, 3);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < PACKET_HEADER_LEN {
            return Err(WireError::ShortBuffer {
                need: PACKET_HEADER_LEN,
                got: buf.remaining(),
            });
        }
        let ts_ns = buf.get_u64_le();
        let length_captured = buf.get_u16_le();
        let length_wire = buf.get_u16_le();
        let port_no = buf.get_u8();
        buf.advance(3);
        Ok(Self {
            ts_ns,
            length_captured,
            length_wire,
            port_no,
        })
    }
}
