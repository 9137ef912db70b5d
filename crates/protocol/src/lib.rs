//! Wire formats exchanged with the capture appliance.
//!
//! # Overview
//! Four fixed layouts cross the wire or live inside a reassembled chunk:
//! [`ChunkHeader`] (per-chunk framing sent ahead of payload bytes on a data
//! connection), [`PacketHeader`] (the compact per-packet layout the payload
//! is made of on arrival), [`PcapRecordHeader`] (the format packets are
//! rewritten into before emission), and [`CommandFrame`] (the control
//! channel's LIST/GET/END/OK/NG request-response frame).
//!
//! # Design
//! [`PacketHeader`] and [`PcapRecordHeader`] share the same 16-byte
//! footprint so [`rewrite_packet_header`] can convert a payload in place
//! without moving any packet bytes. Every layout here is encoded and decoded
//! through `bytes::{Buf, BufMut}` rather than `#[repr(C)]` transmutes, so
//! the wire byte order is explicit and portable across host endianness.
//!
//! # Non-goals
//! This crate does not validate packet contents, perform checksums, or
//! apply filters; it only describes byte layouts and the one in-place
//! transform the client depends on.

mod cmd;
mod packet;
mod pcap;
mod wire;

pub use cmd::{Command, CommandFrame, CommandFrameError, ARG_LEN, FILTER_LEN, STREAM_NAME_LEN};
pub use packet::{PacketHeader, PACKET_HEADER_LEN};
pub use pcap::{rewrite_packet_header, PcapGlobalHeader, PcapRecordHeader, PCAP_RECORD_HEADER_LEN};
pub use wire::{ChunkFlags, ChunkHeader, WireError, CHUNK_HEADER_LEN};
