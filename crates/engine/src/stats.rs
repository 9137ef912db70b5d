use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-receiver-worker counters, accumulated in nanoseconds.
///
/// Ordinary `Relaxed` atomics are sufficient: each counter has exactly one
/// writer (its owning worker thread) and readers (the periodic reporter)
/// tolerate skew between fields.
#[derive(Default)]
pub struct WorkerStats {
    total_ns: AtomicU64,
    io_ns: AtomicU64,
    rewrite_ns: AtomicU64,
    stalled_ns: AtomicU64,
    chunks: AtomicU64,
}

impl WorkerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_io(&self, elapsed: Duration) {
        self.io_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.total_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn add_rewrite(&self, elapsed: Duration) {
        self.rewrite_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.total_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn add_stalled(&self, elapsed: Duration) {
        self.stalled_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.total_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn add_chunk(&self) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            total_ns: self.total_ns.load(Ordering::Relaxed),
            io_ns: self.io_ns.load(Ordering::Relaxed),
            rewrite_ns: self.rewrite_ns.load(Ordering::Relaxed),
            stalled_ns: self.stalled_ns.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`WorkerStats`], cheap to log or aggregate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStatsSnapshot {
    pub total_ns: u64,
    pub io_ns: u64,
    pub rewrite_ns: u64,
    pub stalled_ns: u64,
    pub chunks: u64,
}

/// Merger-side counters: total loop cycles and cycles spent in the disk
/// sink's write path.
#[derive(Default)]
pub struct MergerStats {
    cycles: AtomicU64,
    disk_write_cycles: AtomicU64,
    bytes_emitted: AtomicU64,
}

impl MergerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_disk_write_cycle(&self) {
        self.disk_write_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_emitted.fetch_add(bytes, Ordering::Relaxed);
    }

    #[must_use]
    pub fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn disk_write_cycles(&self) -> u64 {
        self.disk_write_cycles.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_stats_accumulate_into_total() {
        let stats = WorkerStats::new();
        stats.add_io(Duration::from_millis(1));
        stats.add_rewrite(Duration::from_millis(2));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_ns, snapshot.io_ns + snapshot.rewrite_ns);
    }

    #[test]
    fn merger_stats_track_bytes_and_cycles() {
        let stats = MergerStats::new();
        stats.add_cycle();
        stats.add_bytes(1024);
        assert_eq!(stats.cycles(), 1);
        assert_eq!(stats.bytes_emitted(), 1024);
    }
}
