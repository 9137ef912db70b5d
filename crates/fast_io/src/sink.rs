use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::aligned::AlignedBuffer;
use crate::writer::{AsyncWriter, WriterConfig, WriterError};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Size of the disk sink's accumulator; a multiple of the writer's block
/// size so every full accumulator flush is an even number of block writes.
pub const ACCUMULATOR_LEN: usize = 1024 * 1024;

/// Destination for the reassembled PCAP byte stream.
///
/// Both variants emit the identical byte sequence: the PCAP global header
/// followed by every chunk's rewritten payload in ascending sequence order.
/// A stream sink writes synchronously and byte-granular; a disk sink
/// accumulates into aligned blocks for the async writer and flushes any
/// unaligned tail with a buffered append on close.
pub enum Sink {
    Stream(StreamSink),
    Disk(DiskSink),
}

impl Sink {
    pub fn write(&mut self, data: &[u8]) -> Result<(), SinkError> {
        match self {
            Self::Stream(sink) => sink.write(data),
            Self::Disk(sink) => sink.write(data),
        }
    }

    pub fn close(&mut self) -> Result<(), SinkError> {
        match self {
            Self::Stream(sink) => sink.close(),
            Self::Disk(sink) => sink.close(),
        }
    }
}

/// Synchronous, fully buffered stdout sink.
pub struct StreamSink {
    out: BufWriter<io::Stdout>,
}

impl StreamSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: BufWriter::with_capacity(ACCUMULATOR_LEN, io::stdout()),
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), SinkError> {
        self.out.write_all(data)?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

impl Default for StreamSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Direct-I/O disk sink. Buffers arbitrary-length writes into a page-aligned
/// accumulator and hands full `block_size` slices to the async writer; the
/// unaligned remainder is flushed with a buffered append on close.
pub struct DiskSink {
    path: PathBuf,
    writer: AsyncWriter,
    block_size: usize,
    accumulator: AlignedBuffer,
    filled: usize,
}

impl DiskSink {
    pub fn open(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let block_size = config.block_size;
        let writer = AsyncWriter::open(&path, config)?;
        Ok(Self {
            path,
            writer,
            block_size,
            accumulator: AlignedBuffer::new(ACCUMULATOR_LEN),
            filled: 0,
        })
    }

    pub fn write(&mut self, mut data: &[u8]) -> Result<(), SinkError> {
        while !data.is_empty() {
            let space = self.accumulator.len() - self.filled;
            let take = space.min(data.len());
            self.accumulator[self.filled..self.filled + take].copy_from_slice(&data[..take]);
            self.filled += take;
            data = &data[take..];

            if self.filled == self.accumulator.len() {
                self.flush_full_blocks()?;
            }
        }
        Ok(())
    }

    fn flush_full_blocks(&mut self) -> Result<(), SinkError> {
        let mut offset = 0;
        while self.filled - offset >= self.block_size {
            loop {
                match self.writer.write(&self.accumulator[offset..offset + self.block_size]) {
                    Ok(()) => break,
                    Err(WriterError::RingBusy) => {
                        self.writer.update();
                        self.writer.write_update();
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            offset += self.block_size;
        }
        let remaining = self.filled - offset;
        self.accumulator.copy_within(offset..self.filled, 0);
        self.filled = remaining;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), SinkError> {
        self.flush_full_blocks()?;
        self.writer.write_flush();

        if self.filled > 0 {
            debug!(tail_len = self.filled, path = %self.path.display(), "flushing unaligned tail via buffered append");
            let mut file = OpenOptions::new().append(true).open(&self.path)?;
            file.write_all(&self.accumulator[..self.filled])?;
            self.filled = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_sink_emits_bytes_in_order_across_block_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let config = WriterConfig {
            block_size: 4096,
            ring_depth: 4,
            submit_depth: 8,
            histogram_bin_ns: 1000,
        };
        let path = dir.path().join("out.pcap");
        let mut sink = DiskSink::open(&path, config).unwrap();

        let mut expected = Vec::new();
        for i in 0..5 {
            let chunk = vec![i as u8; 500_000];
            expected.extend_from_slice(&chunk);
            sink.write(&chunk).unwrap();
        }
        sink.close().unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), expected.len());
        assert_eq!(written, expected);
    }
}
