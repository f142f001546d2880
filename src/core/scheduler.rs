//! Work queue and chunk claiming
//!
//! Each copy request becomes one [`WorkDescriptor`] at the tail of a FIFO
//! queue. Workers claim chunks from the head descriptor, shrinking it in
//! place until its last chunk is claimed and it leaves the queue.

use super::plan::BlockPlan;
use crossbeam::channel::Sender;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// One finished chunk, as reported back to the issuing thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkSpan {
    /// Byte offset from the start of the request
    pub offset: usize,
    /// Bytes copied
    pub len: usize,
    /// Index of the worker that copied it
    pub worker: usize,
}

/// Remaining work of one in-flight copy request.
///
/// Lives in the queue until its final chunk is claimed. The issuing thread
/// keeps only the receiving end of `done`.
pub(crate) struct WorkDescriptor {
    from: *const u8,
    to: *mut u8,
    offset: usize,
    size: usize,
    chunk_size: usize,
    remainder: usize,
    done: Sender<ChunkSpan>,
}

// SAFETY: the pointers are only dereferenced by the worker that claims a span,
// and the issuing thread keeps both regions borrowed until every span reports.
unsafe impl Send for WorkDescriptor {}

impl WorkDescriptor {
    /// Describe a copy of `plan.size` bytes from `from` to `to`
    pub(crate) fn new(from: *const u8, to: *mut u8, plan: &BlockPlan, done: Sender<ChunkSpan>) -> Self {
        Self {
            from,
            to,
            offset: 0,
            size: plan.size,
            chunk_size: plan.chunk_size,
            remainder: plan.remainder,
            done,
        }
    }

    /// Bytes not yet claimed by any worker
    pub(crate) fn remaining(&self) -> usize {
        self.size
    }
}

/// A span claimed by a worker, to be copied outside the queue lock
pub(crate) struct ClaimedChunk {
    from: *const u8,
    to: *mut u8,
    offset: usize,
    len: usize,
    done: Sender<ChunkSpan>,
}

// SAFETY: see WorkDescriptor; a claimed span is disjoint from every other span.
unsafe impl Send for ClaimedChunk {}

impl ClaimedChunk {
    /// Offset of this span within its request
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Length of this span
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Copy the span and post completion
    pub(crate) fn execute(self, worker: usize, stats: &PoolStats) {
        // SAFETY: the span lies inside a request whose source and destination
        // are valid, non-overlapping, and borrowed until this post is received.
        unsafe {
            std::ptr::copy_nonoverlapping(self.from, self.to, self.len);
        }

        stats.chunks_copied.fetch_add(1, Ordering::Relaxed);
        stats.bytes_copied.fetch_add(self.len as u64, Ordering::Relaxed);

        // The receiver outlives every sender unless the caller already gave up.
        let _ = self.done.send(ChunkSpan {
            offset: self.offset,
            len: self.len,
            worker,
        });
    }
}

/// FIFO of outstanding copy requests
#[derive(Default)]
pub(crate) struct WorkQueue {
    descriptors: VecDeque<WorkDescriptor>,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a request at the tail
    pub(crate) fn push(&mut self, descriptor: WorkDescriptor) {
        self.descriptors.push_back(descriptor);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Claim the next chunk of the head request.
    ///
    /// The first claim on a descriptor takes the remainder as well. The claim
    /// that exhausts a descriptor removes it from the queue.
    pub(crate) fn claim(&mut self) -> Option<ClaimedChunk> {
        let head = self.descriptors.front_mut()?;
        let span = head.chunk_size + head.remainder;
        head.remainder = 0;

        if head.remaining() > span {
            let chunk = ClaimedChunk {
                from: head.from,
                to: head.to,
                offset: head.offset,
                len: span,
                done: head.done.clone(),
            };

            // SAFETY: span < remaining, so both cursors stay inside the request.
            unsafe {
                head.from = head.from.add(span);
                head.to = head.to.add(span);
            }
            head.offset += span;
            head.size -= span;

            Some(chunk)
        } else {
            let last = self.descriptors.pop_front()?;
            Some(ClaimedChunk {
                from: last.from,
                to: last.to,
                offset: last.offset,
                len: last.size,
                done: last.done,
            })
        }
    }
}

/// Pool-wide counters
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Copy requests that completed
    pub requests_completed: AtomicU64,
    /// Chunks copied by workers
    pub chunks_copied: AtomicU64,
    /// Bytes copied by workers
    pub bytes_copied: AtomicU64,
    /// Worker threads currently alive
    pub live_workers: AtomicUsize,
}

impl PoolStats {
    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            chunks_copied: self.chunks_copied.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            live_workers: self.live_workers.load(Ordering::SeqCst),
        }
    }

    /// Bytes/second copied over `elapsed`, 0 when no time has passed
    pub fn throughput(&self, elapsed: std::time::Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes_copied.load(Ordering::Relaxed) as f64 / secs
    }
}

/// Plain-value view of [`PoolStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Copy requests that completed
    pub requests_completed: u64,
    /// Chunks copied by workers
    pub chunks_copied: u64,
    /// Bytes copied by workers
    pub bytes_copied: u64,
    /// Worker threads currently alive
    pub live_workers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::time::Duration;

    const KIB: usize = 1024;

    fn drain(queue: &mut WorkQueue, stats: &PoolStats) -> usize {
        let mut claims = 0;
        while let Some(chunk) = queue.claim() {
            chunk.execute(0, stats);
            claims += 1;
        }
        claims
    }

    #[test]
    fn test_claims_match_plan() {
        let src: Vec<u8> = (0..(3 * 64 * KIB + 7)).map(|i| (i % 251) as u8).collect();
        let mut dst = vec![0u8; src.len()];
        let plan = BlockPlan::compute(src.len(), 64 * KIB, 8);

        let (tx, rx) = unbounded();
        let mut queue = WorkQueue::new();
        queue.push(WorkDescriptor::new(src.as_ptr(), dst.as_mut_ptr(), &plan, tx));

        let stats = PoolStats::default();
        assert_eq!(drain(&mut queue, &stats), plan.blocks);
        assert!(queue.is_empty());

        let spans: Vec<(usize, usize)> = rx.try_iter().map(|s| (s.offset, s.len)).collect();
        assert_eq!(spans, plan.chunk_spans());
        assert_eq!(dst, src);
        assert_eq!(stats.snapshot().bytes_copied, src.len() as u64);
    }

    #[test]
    fn test_head_descriptor_served_first() {
        let src_a = vec![1u8; 2 * 64 * KIB];
        let src_b = vec![2u8; 64 * KIB];
        let mut dst_a = vec![0u8; src_a.len()];
        let mut dst_b = vec![0u8; src_b.len()];

        let plan_a = BlockPlan::compute(src_a.len(), 64 * KIB, 4);
        let plan_b = BlockPlan::compute(src_b.len(), 64 * KIB, 4);

        let (tx_a, rx_a) = unbounded();
        let (tx_b, rx_b) = unbounded();
        let mut queue = WorkQueue::new();
        queue.push(WorkDescriptor::new(src_a.as_ptr(), dst_a.as_mut_ptr(), &plan_a, tx_a));
        queue.push(WorkDescriptor::new(src_b.as_ptr(), dst_b.as_mut_ptr(), &plan_b, tx_b));
        assert_eq!(queue.len(), 2);

        let stats = PoolStats::default();
        let first = queue.claim().unwrap();
        assert_eq!(first.offset(), 0);
        assert_eq!(first.len(), 64 * KIB);
        first.execute(1, &stats);

        // Request A still has one chunk left and stays at the head
        assert_eq!(queue.len(), 2);
        queue.claim().unwrap().execute(2, &stats);
        assert_eq!(queue.len(), 1);
        queue.claim().unwrap().execute(3, &stats);
        assert!(queue.claim().is_none());

        assert_eq!(rx_a.try_iter().count(), 2);
        assert_eq!(rx_b.try_iter().map(|s| s.worker).collect::<Vec<_>>(), vec![3]);
        assert_eq!(dst_a, src_a);
        assert_eq!(dst_b, src_b);
    }

    #[test]
    fn test_final_claim_never_overruns() {
        // 2 chunks with a remainder: the second claim must copy exactly chunk_size
        let size = 2 * 64 * KIB + 1;
        let src = vec![7u8; size];
        let mut dst = vec![0u8; size + 16];
        let plan = BlockPlan::compute(size, 64 * KIB, 8);
        assert_eq!(plan.remainder, 1);

        let (tx, rx) = unbounded();
        let mut queue = WorkQueue::new();
        queue.push(WorkDescriptor::new(src.as_ptr(), dst.as_mut_ptr(), &plan, tx));
        drain(&mut queue, &PoolStats::default());

        let total: usize = rx.try_iter().map(|s| s.len).sum();
        assert_eq!(total, size);
        assert!(dst[size..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_stats_throughput() {
        let stats = PoolStats::default();
        stats.bytes_copied.store(3 * 1024 * 1024, Ordering::Relaxed);

        assert_eq!(stats.throughput(Duration::ZERO), 0.0);
        assert!((stats.throughput(Duration::from_secs(3)) - 1024.0 * 1024.0).abs() < 1e-6);
        assert!(stats.throughput(Duration::from_nanos(1)).is_finite());
    }
}
