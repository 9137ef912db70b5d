use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::pool::ChunkPool;
use crate::queue::ChunkQueue;
use crate::stats::{MergerStats, WorkerStats};

/// Cross-thread state shared by every receiver worker and the merger.
///
/// Everything here is either an atomic with a single writer or a mutex
/// guarding an `Instant`; there is no contended fast path.
pub struct TransferContext {
    pub pool: ChunkPool,
    pub queues: Vec<ChunkQueue>,
    pub worker_stats: Vec<WorkerStats>,
    pub merger_stats: MergerStats,
    stop: AtomicBool,
    /// Sequence number carried by the end-of-stream chunk, `0` until known.
    eof_seq_no: AtomicU32,
    last_progress: Mutex<Instant>,
}

impl TransferContext {
    #[must_use]
    pub fn new(connection_count: usize, chunk_pool_size: usize, queue_depth: usize) -> Self {
        Self {
            pool: ChunkPool::new(chunk_pool_size),
            queues: (0..connection_count)
                .map(|_| ChunkQueue::with_capacity(queue_depth))
                .collect(),
            worker_stats: (0..connection_count).map(|_| WorkerStats::new()).collect(),
            merger_stats: MergerStats::new(),
            stop: AtomicBool::new(false),
            eof_seq_no: AtomicU32::new(0),
            last_progress: Mutex::new(Instant::now()),
        }
    }

    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Publishes the end-of-stream sequence number. Idempotent; only the
    /// first call takes effect.
    pub fn publish_eof_seq_no(&self, seq_no: u32) {
        self.eof_seq_no.store(seq_no, Ordering::Release);
    }

    #[must_use]
    pub fn eof_seq_no(&self) -> Option<u32> {
        match self.eof_seq_no.load(Ordering::Acquire) {
            0 => None,
            seq_no => Some(seq_no),
        }
    }

    pub fn record_progress(&self) {
        *self.last_progress.lock().expect("progress mutex poisoned") = Instant::now();
    }

    #[must_use]
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_progress
            .lock()
            .expect("progress mutex poisoned")
            .elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_seq_no_is_none_until_published() {
        let ctx = TransferContext::new(2, 4, 4);
        assert_eq!(ctx.eof_seq_no(), None);
        ctx.publish_eof_seq_no(123);
        assert_eq!(ctx.eof_seq_no(), Some(123));
    }

    #[test]
    fn stop_flag_round_trips() {
        let ctx = TransferContext::new(1, 4, 4);
        assert!(!ctx.should_stop());
        ctx.request_stop();
        assert!(ctx.should_stop());
    }

    #[test]
    fn record_progress_resets_idle_duration() {
        let ctx = TransferContext::new(1, 4, 4);
        std::thread::sleep(std::time::Duration::from_millis(5));
        ctx.record_progress();
        assert!(ctx.idle_for() < std::time::Duration::from_millis(5));
    }
}
