use std::sync::Mutex;

/// Size in bytes of a chunk's payload arena.
pub const CHUNK_PAYLOAD_LEN: usize = 256 * 1024;

/// A fixed-capacity reassembly buffer.
///
/// A `Chunk` lives in exactly one place at a time: the pool's free list, a
/// receiver's local variable, a [`crate::queue::ChunkQueue`] slot, or the
/// merger's local variable while it is being drained. Rust's move semantics
/// make that "exactly one owner" property a type-level guarantee rather than
/// a runtime invariant that has to be checked, since ownership of the
/// `Box<Chunk>` transfers wholesale at each of those boundaries.
pub struct Chunk {
    /// Global sequence number. `0` means "unassigned"; never published.
    pub seq_no: u32,
    /// Bytes read off the wire for this chunk.
    pub xfer_length: u32,
    /// Logical payload length after header rewrite.
    pub data_length: u32,
    /// Set when this chunk carries the end-of-stream marker.
    pub end_of_stream: bool,
    /// Packet count, set by the receiver during header rewrite.
    pub pkt_count: u32,
    pub payload: Box<[u8; CHUNK_PAYLOAD_LEN]>,
}

impl Chunk {
    fn new() -> Self {
        Self {
            seq_no: 0,
            xfer_length: 0,
            data_length: 0,
            end_of_stream: false,
            pkt_count: 0,
            payload: Box::new([0; CHUNK_PAYLOAD_LEN]),
        }
    }

    fn reset(&mut self) {
        self.seq_no = 0;
        self.xfer_length = 0;
        self.data_length = 0;
        self.end_of_stream = false;
        self.pkt_count = 0;
    }
}

/// Fixed-count pool of [`Chunk`] buffers, allocated once at startup.
///
/// The free list is a `Mutex`-protected stack rather than a lock-free
/// structure: the critical section is an O(1) `Vec` push/pop, and the
/// appliance's own pool used a CAS spin loop here only because C has no
/// cheaper primitive to reach for. Contention on a pool this size does not
/// justify spinning.
pub struct ChunkPool {
    free: Mutex<Vec<Box<Chunk>>>,
}

impl ChunkPool {
    /// Allocates `capacity` chunks up front.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| Box::new(Chunk::new())).collect();
        Self {
            free: Mutex::new(free),
        }
    }

    /// Draws a chunk from the free list, or `None` if the pool is exhausted.
    ///
    /// Exhaustion is ordinary back-pressure, not an error: callers are
    /// expected to yield briefly and retry.
    #[must_use]
    pub fn alloc(&self) -> Option<Box<Chunk>> {
        let mut chunk = self.free.lock().expect("chunk pool mutex poisoned").pop()?;
        chunk.reset();
        Some(chunk)
    }

    /// Returns a chunk to the free list.
    pub fn free(&self, chunk: Box<Chunk>) {
        self.free.lock().expect("chunk pool mutex poisoned").push(chunk);
    }

    /// Number of chunks currently on the free list. Advisory; for metrics
    /// and tests only.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.lock().expect("chunk pool mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_resets_fields_from_a_prior_use() {
        let pool = ChunkPool::new(2);
        let mut chunk = pool.alloc().unwrap();
        chunk.seq_no = 7;
        chunk.data_length = 100;
        chunk.payload[0] = 0xff;
        pool.free(chunk);

        let chunk = pool.alloc().unwrap();
        assert_eq!(chunk.seq_no, 0);
        assert_eq!(chunk.data_length, 0);
        // payload bytes are not required to be zeroed; only metadata is.
    }

    #[test]
    fn exhaustion_returns_none_instead_of_blocking() {
        let pool = ChunkPool::new(1);
        let first = pool.alloc();
        assert!(first.is_some());
        assert!(pool.alloc().is_none());
    }

    #[test]
    fn freed_chunks_are_available_again() {
        let pool = ChunkPool::new(1);
        let chunk = pool.alloc().unwrap();
        assert_eq!(pool.available(), 0);
        pool.free(chunk);
        assert_eq!(pool.available(), 1);
    }
}
