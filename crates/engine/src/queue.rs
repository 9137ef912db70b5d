use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::pool::Chunk;

/// A bounded, lock-free single-producer/single-consumer queue of chunks.
///
/// # Design
/// `put` and `get` are 64-bit monotonic cursors, each touched by exactly one
/// side and padded onto separate cache lines to avoid false sharing between
/// the receiver and the merger. The producer writes a slot and then issues a
/// release-store incrementing `put`; the consumer acquire-loads `put` before
/// reading a slot. That ordering is what makes the slot write visible to the
/// consumer before the slot is observed as occupied.
///
/// # Safety
/// The slot array is a confined block of `unsafe` code: each slot is a
/// `UnsafeCell<Option<Box<Chunk>>>`, and the put/get protocol above
/// guarantees that at any instant a given slot is touched by at most one of
/// the two sides. A safe, lock-free SPSC handoff of a non-`Copy`,
/// heap-allocated value cannot be expressed without this — the same
/// invariant a plain mutex would enforce at runtime is instead upheld by the
/// cursor protocol.
pub struct ChunkQueue {
    put: CachePadded<AtomicU64>,
    get: CachePadded<AtomicU64>,
    mask: u64,
    slots: Box<[UnsafeCell<Option<Box<Chunk>>>]>,
}

// SAFETY: `ChunkQueue` is shared between exactly one producer thread and one
// consumer thread, and the put/get protocol ensures each slot is accessed by
// only one of them at a time.
unsafe impl Send for ChunkQueue {}
unsafe impl Sync for ChunkQueue {}

impl ChunkQueue {
    /// Creates a queue with the given capacity, rounded up to the next
    /// power of two.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2);
        let slots = (0..capacity).map(|_| UnsafeCell::new(None)).collect();
        Self {
            put: CachePadded::new(AtomicU64::new(0)),
            get: CachePadded::new(AtomicU64::new(0)),
            mask: capacity as u64 - 1,
            slots,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.mask + 1
    }

    /// Number of chunks currently queued. Safe to call from either side;
    /// advisory under concurrent mutation from the other side.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.put.load(Ordering::Acquire) - self.get.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Producer-side: attempts to publish a chunk. Returns the chunk back on
    /// failure if the queue is full.
    pub fn try_push(&self, chunk: Box<Chunk>) -> Result<(), Box<Chunk>> {
        let put = self.put.load(Ordering::Relaxed);
        let get = self.get.load(Ordering::Acquire);
        if put - get >= self.capacity() {
            return Err(chunk);
        }
        let index = (put & self.mask) as usize;
        // SAFETY: only the producer writes this slot, and it is only
        // written once per `put` value, which this thread owns exclusively.
        unsafe {
            *self.slots[index].get() = Some(chunk);
        }
        self.put.store(put + 1, Ordering::Release);
        Ok(())
    }

    /// Consumer-side: pops the oldest queued chunk, if any.
    pub fn try_pop(&self) -> Option<Box<Chunk>> {
        let get = self.get.load(Ordering::Relaxed);
        let put = self.put.load(Ordering::Acquire);
        if get >= put {
            return None;
        }
        let index = (get & self.mask) as usize;
        // SAFETY: only the consumer reads/clears this slot, and the
        // acquire-load of `put` above happened-after the producer's
        // release-store, making its write visible here.
        let chunk = unsafe { (*self.slots[index].get()).take() };
        self.get.store(get + 1, Ordering::Release);
        chunk
    }

    /// Consumer-side: peeks at the head chunk's sequence number without
    /// removing it.
    pub fn peek_seq_no(&self) -> Option<u32> {
        let get = self.get.load(Ordering::Relaxed);
        let put = self.put.load(Ordering::Acquire);
        if get >= put {
            return None;
        }
        let index = (get & self.mask) as usize;
        // SAFETY: see `try_pop`; only the consumer touches this slot.
        unsafe { (*self.slots[index].get()).as_ref().map(|c| c.seq_no) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(seq_no: u32) -> Box<Chunk> {
        let mut chunk = Box::new(Chunk {
            seq_no,
            xfer_length: 0,
            data_length: 0,
            end_of_stream: false,
            pkt_count: 0,
            payload: Box::new([0; crate::pool::CHUNK_PAYLOAD_LEN]),
        });
        chunk.seq_no = seq_no;
        chunk
    }

    #[test]
    fn rounds_capacity_up_to_power_of_two() {
        let queue = ChunkQueue::with_capacity(10);
        assert_eq!(queue.capacity(), 16);
    }

    #[test]
    fn fifo_order_is_preserved() {
        let queue = ChunkQueue::with_capacity(4);
        queue.try_push(chunk(1)).unwrap();
        queue.try_push(chunk(2)).unwrap();
        assert_eq!(queue.try_pop().unwrap().seq_no, 1);
        assert_eq!(queue.try_pop().unwrap().seq_no, 2);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn push_fails_when_full_and_returns_the_chunk() {
        let queue = ChunkQueue::with_capacity(2);
        queue.try_push(chunk(1)).unwrap();
        queue.try_push(chunk(2)).unwrap();
        let rejected = queue.try_push(chunk(3)).unwrap_err();
        assert_eq!(rejected.seq_no, 3);
    }

    #[test]
    fn peek_does_not_remove() {
        let queue = ChunkQueue::with_capacity(4);
        queue.try_push(chunk(9)).unwrap();
        assert_eq!(queue.peek_seq_no(), Some(9));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_pop().unwrap().seq_no, 9);
    }

    #[test]
    fn concurrent_producer_and_consumer_preserve_order() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(ChunkQueue::with_capacity(64));
        let producer_queue = Arc::clone(&queue);
        const COUNT: u32 = 10_000;

        let producer = thread::spawn(move || {
            let mut next = 1u32;
            while next <= COUNT {
                if producer_queue.try_push(chunk(next)).is_ok() {
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut received = Vec::with_capacity(COUNT as usize);
        while received.len() < COUNT as usize {
            if let Some(chunk) = queue.try_pop() {
                received.push(chunk.seq_no);
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        let expected: Vec<u32> = (1..=COUNT).collect();
        assert_eq!(received, expected);
    }
}
