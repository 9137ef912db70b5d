//! Asynchronous direct-I/O writer and the stream/disk sink dispatcher built
//! on top of it.
//!
//! # Overview
//! [`writer::AsyncWriter`] owns a ring of page-aligned staging buffers and
//! submits them through the platform's async-I/O interface
//! ([`io_uring`](https://docs.rs/io-uring) on Linux, a synchronous
//! positioned-write fallback elsewhere), tracking per-operation latency in
//! [`histogram::LatencyHistogram`]. [`sink::Sink`] multiplexes emission
//! between a synchronous stdout sink and a disk sink backed by the writer.
//!
//! # Design
//! The writer's ring, op free list, and histogram are owned by a single
//! caller thread; there is no internal locking, matching the appliance's
//! own single-threaded completion-draining model.

mod aligned;
pub mod histogram;
pub mod op;
pub mod sink;
pub mod writer;

pub use aligned::AlignedBuffer;
pub use histogram::{LatencyHistogram, OpKind};
pub use sink::{DiskSink, Sink, SinkError, StreamSink, ACCUMULATOR_LEN};
pub use writer::{AsyncWriter, WriterConfig, WriterError};
