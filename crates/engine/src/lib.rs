//! Chunk pool, SPSC reassembly queues, receiver workers, and the global
//! sequence merger.
//!
//! # Overview
//! Each data connection is drained by one [`receiver::run_receiver`] loop on
//! its own thread. A receiver draws chunks from a shared [`pool::ChunkPool`],
//! fills them from its connection, rewrites packet headers in place via
//! `protocol::rewrite_packet_header`, and publishes them into its own
//! [`queue::ChunkQueue`]. [`merger::Merger`] scans every worker's queue for
//! the next expected global sequence number and drains chunks back to the
//! pool as it emits their payload.
//!
//! # Design
//! The pool and the per-worker queues are the only shared state; everything
//! else (socket, local scratch buffers) is owned by a single worker thread.
//! [`context::TransferContext`] carries the handful of cross-thread signals
//! (stop flag, end-of-stream sequence number, per-worker counters) as plain
//! atomics, since each has exactly one writer.

pub mod context;
pub mod merger;
pub mod pool;
pub mod queue;
pub mod receiver;
pub mod stats;

pub use context::TransferContext;
pub use merger::{Merger, MergerError};
pub use pool::{Chunk, ChunkPool, CHUNK_PAYLOAD_LEN};
pub use queue::ChunkQueue;
pub use receiver::{run_receiver, ReceiverError};
pub use stats::{MergerStats, WorkerStats, WorkerStatsSnapshot};
