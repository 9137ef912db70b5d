use std::time::Instant;

use crate::histogram::OpKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Free,
    Pending,
    Complete,
}

/// One in-flight (or recently completed) async I/O operation.
///
/// Lifecycle: drawn from [`OpFreeList`] as `Free`, transitions to `Pending`
/// on submit, to `Complete` when its completion event arrives, and back to
/// `Free` only when the caller explicitly releases it. No transition
/// short-circuits this sequence.
#[derive(Debug, Clone, Copy)]
pub struct AsyncOp {
    pub state: OpState,
    pub kind: OpKind,
    pub offset: u64,
    pub length: usize,
    pub kicked_at: Option<Instant>,
    pub result: Option<i64>,
}

impl AsyncOp {
    fn free() -> Self {
        Self {
            state: OpState::Free,
            kind: OpKind::Write,
            offset: 0,
            length: 0,
            kicked_at: None,
            result: None,
        }
    }
}

/// A fixed-capacity free list of [`AsyncOp`] slots, indexed by `user_data`
/// handed to the kernel at submission time.
pub struct OpFreeList {
    ops: Vec<AsyncOp>,
    free_indices: Vec<usize>,
}

impl OpFreeList {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ops: vec![AsyncOp::free(); capacity],
            free_indices: (0..capacity).rev().collect(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.ops.iter().filter(|op| op.state == OpState::Pending).count()
    }

    /// Draws a free slot and marks it `Pending`, returning its index for use
    /// as the submission's `user_data`.
    pub fn acquire(&mut self, kind: OpKind, offset: u64, length: usize) -> Option<usize> {
        let index = self.free_indices.pop()?;
        let op = &mut self.ops[index];
        debug_assert_eq!(op.state, OpState::Free);
        op.state = OpState::Pending;
        op.kind = kind;
        op.offset = offset;
        op.length = length;
        op.kicked_at = Some(Instant::now());
        op.result = None;
        Some(index)
    }

    /// Marks a pending op `Complete` with its syscall result.
    pub fn complete(&mut self, index: usize, result: i64) {
        let op = &mut self.ops[index];
        debug_assert_eq!(op.state, OpState::Pending);
        op.state = OpState::Complete;
        op.result = Some(result);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> &AsyncOp {
        &self.ops[index]
    }

    /// Releases a completed op back to `Free`.
    pub fn release(&mut self, index: usize) {
        let op = &mut self.ops[index];
        debug_assert_eq!(op.state, OpState::Complete);
        *op = AsyncOp::free();
        self.free_indices.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_complete_release_cycle() {
        let mut list = OpFreeList::new(2);
        let a = list.acquire(OpKind::Write, 0, 4096).unwrap();
        assert_eq!(list.pending_count(), 1);
        list.complete(a, 4096);
        assert_eq!(list.get(a).state, OpState::Complete);
        list.release(a);
        assert_eq!(list.pending_count(), 0);
        assert_eq!(list.capacity() - list.free_indices.len(), 0);
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut list = OpFreeList::new(1);
        assert!(list.acquire(OpKind::Write, 0, 1).is_some());
        assert!(list.acquire(OpKind::Write, 0, 1).is_none());
    }
}
