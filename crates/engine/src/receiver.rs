use std::io::{self, Read};
use std::thread;
use std::time::{Duration, Instant};

use protocol::{rewrite_packet_header, ChunkHeader, CHUNK_HEADER_LEN};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::context::TransferContext;

/// A receiver worker yields this long when its queue is overfull or the
/// pool is exhausted, rather than spinning.
const BACKOFF: Duration = Duration::from_micros(200);

/// Queue depth past which a worker stops reading ahead, measured in queued
/// chunks.
const PIPELINE_HIGH_WATER: u64 = 192;

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("connection closed before a full chunk was read")]
    ConnectionClosed,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Wire(#[from] protocol::WireError),
    #[error("protocol violation: chunk carried reserved sequence number 0")]
    ReservedSeqNo,
}

/// Drains one data connection into `ctx.queues[worker_index]` until the
/// connection signals end-of-stream, a fatal error occurs, or
/// `ctx.should_stop()` becomes true.
///
/// `connection` is generic over `Read` so tests can drive this loop with an
/// in-memory buffer instead of a real socket.
pub fn run_receiver<R: Read>(
    mut connection: R,
    worker_index: usize,
    ctx: &TransferContext,
) -> Result<(), ReceiverError> {
    let queue = &ctx.queues[worker_index];
    let stats = &ctx.worker_stats[worker_index];
    let mut header_buf = [0u8; CHUNK_HEADER_LEN];

    loop {
        if ctx.should_stop() {
            return Ok(());
        }

        if queue.len() >= PIPELINE_HIGH_WATER {
            let start = Instant::now();
            thread::sleep(BACKOFF);
            stats.add_stalled(start.elapsed());
            continue;
        }

        let Some(mut chunk) = ctx.pool.alloc() else {
            let start = Instant::now();
            thread::sleep(BACKOFF);
            stats.add_stalled(start.elapsed());
            continue;
        };

        let io_start = Instant::now();
        if let Err(err) = read_exact_or_eof(&mut connection, &mut header_buf) {
            ctx.pool.free(chunk);
            return match err {
                ReadExactError::Eof => {
                    debug!(worker_index, "connection closed cleanly while idle");
                    Ok(())
                }
                ReadExactError::Io(err) => Err(ReceiverError::Io(err)),
            };
        }
        let header = ChunkHeader::decode(&mut &header_buf[..])?;

        if header.is_end_of_stream() {
            ctx.pool.free(chunk);
            if header.seq_no != 0 {
                ctx.publish_eof_seq_no(header.seq_no);
                ctx.record_progress();
            }
            return Ok(());
        }

        if header.seq_no == 0 {
            ctx.pool.free(chunk);
            error!(worker_index, "chunk carried reserved sequence number 0");
            return Err(ReceiverError::ReservedSeqNo);
        }

        chunk.seq_no = header.seq_no;
        chunk.xfer_length = header.xfer_length;
        chunk.data_length = header.data_length;

        let payload = &mut chunk.payload[..header.xfer_length as usize];
        connection.read_exact(payload)?;
        stats.add_io(io_start.elapsed());

        let rewrite_start = Instant::now();
        match rewrite_packet_header(&mut chunk.payload[..], header.data_length as usize) {
            Ok(pkt_count) => chunk.pkt_count = pkt_count as u32,
            Err(err) => {
                warn!(worker_index, seq_no = header.seq_no, %err, "packet header rewrite failed");
                ctx.pool.free(chunk);
                return Err(ReceiverError::Wire(err));
            }
        }
        stats.add_rewrite(rewrite_start.elapsed());

        let mut to_push = chunk;
        loop {
            match queue.try_push(to_push) {
                Ok(()) => break,
                Err(rejected) => {
                    to_push = rejected;
                    thread::sleep(BACKOFF);
                }
            }
        }
        stats.add_chunk();
        ctx.record_progress();
    }
}

enum ReadExactError {
    Eof,
    Io(io::Error),
}

/// Like `Read::read_exact`, but a zero-length read against an empty buffer
/// (the connection was closed between chunks) is reported as `Eof` instead
/// of an `UnexpectedEof` I/O error.
fn read_exact_or_eof<R: Read>(connection: &mut R, buf: &mut [u8]) -> Result<(), ReadExactError> {
    let mut filled = 0;
    while filled < buf.len() {
        match connection.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Err(ReadExactError::Eof),
            Ok(0) => {
                return Err(ReadExactError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-header",
                )))
            }
            Ok(n) => filled += n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(ReadExactError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use protocol::{ChunkFlags, PacketHeader};

    fn encode_chunk_header(header: ChunkHeader) -> Vec<u8> {
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        buf.to_vec()
    }

    fn encode_packet(ts_ns: u64, payload: &[u8]) -> Vec<u8> {
        let header = PacketHeader {
            ts_ns,
            length_captured: payload.len() as u16,
            length_wire: payload.len() as u16,
            port_no: 0,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        buf.extend_from_slice(payload);
        buf.to_vec()
    }

    #[test]
    fn receives_and_rewrites_a_single_chunk() {
        let packet = encode_packet(3_000_000_000, b"hello");
        let data_length = packet.len() as u32;
        let mut stream = encode_chunk_header(ChunkHeader {
            seq_no: 1,
            xfer_length: data_length,
            data_length,
            flag: ChunkFlags::empty(),
        });
        stream.extend_from_slice(&packet);
        stream.extend_from_slice(&encode_chunk_header(ChunkHeader {
            seq_no: 2,
            xfer_length: 0,
            data_length: 0,
            flag: ChunkFlags::END_OF_STREAM,
        }));

        let ctx = TransferContext::new(1, 8, 8);
        run_receiver(&stream[..], 0, &ctx).unwrap();

        assert_eq!(ctx.eof_seq_no(), Some(2));
        let chunk = ctx.queues[0].try_pop().unwrap();
        assert_eq!(chunk.seq_no, 1);
        assert_eq!(chunk.pkt_count, 1);
        assert_eq!(&chunk.payload[16..16 + 5], b"hello");
    }

    #[test]
    fn rejects_reserved_sequence_number_zero() {
        let stream = encode_chunk_header(ChunkHeader {
            seq_no: 0,
            xfer_length: 0,
            data_length: 0,
            flag: ChunkFlags::empty(),
        });
        let ctx = TransferContext::new(1, 8, 8);
        let err = run_receiver(&stream[..], 0, &ctx).unwrap_err();
        assert!(matches!(err, ReceiverError::ReservedSeqNo));
    }

    #[test]
    fn clean_close_between_chunks_is_not_an_error() {
        let ctx = TransferContext::new(1, 8, 8);
        let result = run_receiver(&[][..], 0, &ctx);
        assert!(result.is_ok());
    }
}
