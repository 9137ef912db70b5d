use std::thread;
use std::time::{Duration, Instant};

use fast_io::{Sink, SinkError};
use thiserror::Error;
use tracing::{info, warn};

use crate::context::TransferContext;

const MERGE_BACKOFF: Duration = Duration::from_micros(200);
const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum MergerError {
    #[error("no merger progress for {0:?}; aborting transfer")]
    Idle(Duration),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("duplicate seq_no {0} received from more than one worker")]
    DuplicateSeqNo(u32),
}

/// Scans every receiver worker's queue for the next expected global
/// sequence number and drains it through a [`Sink`] in order.
///
/// At most one queue can hold `next_seq` at any instant, since sequence
/// numbers are assigned from a single global counter on the appliance side;
/// scan order only bounds per-iteration work, it never affects correctness.
pub struct Merger<'ctx> {
    ctx: &'ctx TransferContext,
    sink: Sink,
    next_seq: u32,
    idle_timeout: Duration,
    last_report: Instant,
}

impl<'ctx> Merger<'ctx> {
    #[must_use]
    pub fn new(ctx: &'ctx TransferContext, sink: Sink, idle_timeout: Duration) -> Self {
        Self {
            ctx,
            sink,
            next_seq: 1,
            idle_timeout,
            last_report: Instant::now(),
        }
    }

    /// Emits the per-worker and merger counters at `info` level, if at least
    /// [`STATS_REPORT_INTERVAL`] has passed since the last report.
    fn maybe_report_stats(&mut self) {
        if self.last_report.elapsed() < STATS_REPORT_INTERVAL {
            return;
        }
        self.last_report = Instant::now();
        for (worker_index, stats) in self.ctx.worker_stats.iter().enumerate() {
            let snapshot = stats.snapshot();
            info!(
                worker_index,
                chunks = snapshot.chunks,
                total_ns = snapshot.total_ns,
                io_ns = snapshot.io_ns,
                rewrite_ns = snapshot.rewrite_ns,
                stalled_ns = snapshot.stalled_ns,
                "receiver worker stats"
            );
        }
        info!(
            cycles = self.ctx.merger_stats.cycles(),
            disk_write_cycles = self.ctx.merger_stats.disk_write_cycles(),
            bytes_emitted = self.ctx.merger_stats.bytes_emitted(),
            "merger stats"
        );
    }

    /// Runs until end-of-stream is reached, returning total bytes emitted.
    ///
    /// # Errors
    /// Returns [`MergerError::Idle`] if the idle watchdog fires, or
    /// propagates a sink write failure.
    pub fn run(mut self) -> Result<u64, MergerError> {
        loop {
            if let Some(eof_seq_no) = self.ctx.eof_seq_no() {
                if eof_seq_no == self.next_seq {
                    break;
                }
            }

            // A single global sequence space means at most one worker queue can
            // legitimately hold next_seq at a time; a second one holding it is a
            // protocol violation, not a race to resolve by taking the first match.
            let mut matched_worker = None;
            for (worker_index, queue) in self.ctx.queues.iter().enumerate() {
                if queue.peek_seq_no() != Some(self.next_seq) {
                    continue;
                }
                if let Some(first_worker) = matched_worker {
                    debug_assert!(
                        false,
                        "duplicate seq_no {} observed on workers {} and {}",
                        self.next_seq, first_worker, worker_index
                    );
                    warn!(
                        seq_no = self.next_seq,
                        first_worker, second_worker = worker_index,
                        "duplicate seq_no from more than one worker"
                    );
                    return Err(MergerError::DuplicateSeqNo(self.next_seq));
                }
                matched_worker = Some(worker_index);
            }

            let mut advanced = false;
            if let Some(worker_index) = matched_worker {
                let chunk = self.ctx.queues[worker_index]
                    .try_pop()
                    .expect("peeked chunk must still be present");
                let payload = &chunk.payload[..chunk.data_length as usize];
                self.sink.write(payload)?;
                self.ctx.merger_stats.add_disk_write_cycle();
                self.ctx.merger_stats.add_bytes(u64::from(chunk.data_length));
                self.ctx.pool.free(chunk);
                self.next_seq = self.next_seq.wrapping_add(1);
                self.ctx.record_progress();
                advanced = true;
            }

            self.ctx.merger_stats.add_cycle();
            self.maybe_report_stats();
            if !advanced {
                if self.ctx.idle_for() > self.idle_timeout {
                    warn!(idle = ?self.ctx.idle_for(), "idle watchdog fired");
                    return Err(MergerError::Idle(self.ctx.idle_for()));
                }
                thread::sleep(MERGE_BACKOFF);
            }
        }

        self.sink.close()?;
        let bytes = self.ctx.merger_stats.bytes_emitted();
        info!(bytes, "transfer complete");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Chunk;
    use fast_io::StreamSink;

    fn push_chunk(ctx: &TransferContext, worker: usize, seq_no: u32, payload: &[u8]) {
        let mut chunk = ctx.pool.alloc().unwrap();
        chunk.seq_no = seq_no;
        chunk.data_length = payload.len() as u32;
        chunk.payload[..payload.len()].copy_from_slice(payload);
        let _: Result<(), Box<Chunk>> = ctx.queues[worker].try_push(chunk);
    }

    #[test]
    fn drains_interleaved_queues_in_global_order() {
        let ctx = TransferContext::new(2, 8, 8);
        push_chunk(&ctx, 0, 1, b"a");
        push_chunk(&ctx, 1, 2, b"b");
        push_chunk(&ctx, 0, 3, b"c");
        ctx.publish_eof_seq_no(4);

        let sink = Sink::Stream(StreamSink::new());
        let merger = Merger::new(&ctx, sink, Duration::from_secs(1));
        let bytes = merger.run().unwrap();
        assert_eq!(bytes, 3);
    }

    // debug_assert! fires before the error path is reached whenever
    // debug_assertions are enabled (the default for `cargo test`), matching
    // the documented "assert in debug, hard-error in release" contract.
    #[test]
    #[should_panic(expected = "duplicate seq_no")]
    fn duplicate_seq_no_from_two_workers_trips_the_debug_assertion() {
        let ctx = TransferContext::new(2, 8, 8);
        push_chunk(&ctx, 0, 1, b"a");
        push_chunk(&ctx, 1, 1, b"b");

        let sink = Sink::Stream(StreamSink::new());
        let merger = Merger::new(&ctx, sink, Duration::from_secs(1));
        let _ = merger.run();
    }

    #[test]
    fn idle_watchdog_fires_when_no_queue_ever_advances() {
        let ctx = TransferContext::new(1, 8, 8);
        let sink = Sink::Stream(StreamSink::new());
        let merger = Merger::new(&ctx, sink, Duration::from_millis(5));
        let err = merger.run().unwrap_err();
        assert!(matches!(err, MergerError::Idle(_)));
    }
}
