use bytes::{Buf, BufMut};

use crate::packet::{PacketHeader, PACKET_HEADER_LEN};
use crate::wire::WireError;

/// Fixed size in bytes of a [`PcapRecordHeader`]; identical to
/// [`PACKET_HEADER_LEN`], which is what makes the in-place rewrite in
/// [`rewrite_packet_header`] sound.
pub const PCAP_RECORD_HEADER_LEN: usize = 16;

const PCAP_MAGIC_NANOSECOND: u32 = 0xa1b2_3c4d;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_SNAPLEN: u32 = 65_535;
const PCAP_LINKTYPE_ETHERNET: u32 = 1;

/// 24-byte global header written once at the start of a capture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcapGlobalHeader;

impl PcapGlobalHeader {
    pub const LEN: usize = 24;

    pub fn encode(self, buf: &mut impl BufMut) {
        buf.put_u32_le(PCAP_MAGIC_NANOSECOND);
        buf.put_u16_le(PCAP_VERSION_MAJOR);
        buf.put_u16_le(PCAP_VERSION_MINOR);
        buf.put_i32_le(0); // thiszone
        buf.put_u32_le(0); // sigfigs
        buf.put_u32_le(PCAP_SNAPLEN);
        buf.put_u32_le(PCAP_LINKTYPE_ETHERNET);
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut out = Vec::with_capacity(Self::LEN);
        self.encode(&mut out);
        out.try_into().expect("global header is exactly LEN bytes")
    }
}

/// Per-packet record header, the target format of the in-place rewrite.
///
/// Layout (16 bytes, packed): `sec:u32`, `nsec:u32`, `length_captured:u32`,
/// `length_wire:u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcapRecordHeader {
    pub sec: u32,
    pub nsec: u32,
    pub length_captured: u32,
    pub length_wire: u32,
}

impl PcapRecordHeader {
    /// Splits a nanosecond timestamp into PCAP's `(sec, nsec)` pair using
    /// full 64-bit precision before truncating to the wire's 32-bit fields.
    #[must_use]
    pub fn from_ts_ns(ts_ns: u64, length_captured: u16, length_wire: u16) -> Self {
        let sec = ts_ns / 1_000_000_000;
        let nsec = ts_ns - sec * 1_000_000_000;
        Self {
            sec: sec as u32,
            nsec: nsec as u32,
            length_captured: u32::from(length_captured),
            length_wire: u32::from(length_wire),
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.sec);
        buf.put_u32_le(self.nsec);
        buf.put_u32_le(self.length_captured);
        buf.put_u32_le(self.length_wire);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < PCAP_RECORD_HEADER_LEN {
            return Err(WireError::ShortBuffer {
                need: PCAP_RECORD_HEADER_LEN,
                got: buf.remaining(),
            });
        }
        Ok(Self {
            sec: buf.get_u32_le(),
            nsec: buf.get_u32_le(),
            length_captured: buf.get_u32_le(),
            length_wire: buf.get_u32_le(),
        })
    }
}

/// Rewrites a chunk payload in place: every `[PacketHeader][bytes]` record
/// from offset `0` to `data_length` becomes `[PcapRecordHeader][bytes]`.
///
/// Both headers share a 16-byte footprint, so the raw packet bytes never
/// move; only the leading 16 bytes of each record are overwritten.
///
/// Returns the number of packets rewritten.
///
/// # Errors
/// Returns [`WireError::ShortBuffer`] if a record's declared
/// `length_captured` would run past `data_length`.
pub fn rewrite_packet_header(payload: &mut [u8], data_length: usize) -> Result<usize, WireError> {
    let mut offset = 0usize;
    let mut packet_count = 0usize;
    while offset < data_length {
        if data_length - offset < PACKET_HEADER_LEN {
            return Err(WireError::ShortBuffer {
                need: PACKET_HEADER_LEN,
                got: data_length - offset,
            });
        }
        let mut header_slice = &payload[offset..offset + PACKET_HEADER_LEN];
        let header = PacketHeader::decode(&mut header_slice)?;

        let record_len = PACKET_HEADER_LEN + header.length_captured as usize;
        if offset + record_len > data_length {
            return Err(WireError::ShortBuffer {
                need: record_len,
                got: data_length - offset,
            });
        }

        let record = PcapRecordHeader::from_ts_ns(
            header.ts_ns,
            header.length_captured,
            header.length_wire,
        );
        let mut out = &mut payload[offset..offset + PCAP_RECORD_HEADER_LEN];
        record.encode(&mut out);

        offset += record_len;
        packet_count += 1;
    }
    Ok(packet_count)
}
