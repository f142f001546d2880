//! Persistent worker pool and the copy dispatch protocol
//!
//! A [`CopyPool`] owns a fixed set of worker threads parked on a condition
//! variable. [`CopyPool::copy`] enqueues one descriptor for the whole request,
//! wakes workers, and blocks until every chunk has reported completion.

use super::plan::BlockPlan;
use super::scheduler::{ChunkSpan, PoolStats, WorkDescriptor, WorkQueue};
use crate::config::PoolConfig;
use crate::error::{MemcpyError, Result};
use crossbeam::channel::bounded;
use serde::Serialize;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Result of one copy request
#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    /// Bytes copied
    pub bytes: usize,
    /// Chunks the request was split into (0 for an empty copy)
    pub blocks: usize,
    /// Completed chunks in the order they reported back
    pub chunks: Vec<ChunkSpan>,
    /// Wall-clock time from dispatch to the last completion
    pub duration: Duration,
}

impl CopyReport {
    fn empty() -> Self {
        Self {
            bytes: 0,
            blocks: 0,
            chunks: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Average throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.bytes as f64 / secs
        }
    }

    /// Check that the chunks cover `[0, bytes)` exactly once
    pub fn is_exact_tiling(&self) -> bool {
        let mut spans: Vec<(usize, usize)> = self.chunks.iter().map(|c| (c.offset, c.len)).collect();
        spans.sort_unstable();

        let mut next = 0;
        for (offset, len) in spans {
            if offset != next {
                return false;
            }
            next += len;
        }
        next == self.bytes
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("Bytes copied: {}", humansize::format_size(self.bytes as u64, humansize::BINARY));
        println!("Blocks:       {}", self.blocks);
        println!("Duration:     {:.2?}", self.duration);
        println!(
            "Throughput:   {}/s",
            humansize::format_size(self.throughput() as u64, humansize::BINARY)
        );
    }
}

struct QueueState {
    queue: WorkQueue,
    running: bool,
}

/// State shared between the pool handle and its workers
struct Shared {
    state: Mutex<QueueState>,
    work_ready: Condvar,
    stats: Arc<PoolStats>,
}

impl Shared {
    // Queue invariants hold at every unlock, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Work queue mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Decrements the live-worker count however the worker exits
struct LiveWorker<'a>(&'a PoolStats);

impl Drop for LiveWorker<'_> {
    fn drop(&mut self) {
        self.0.live_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

fn worker_loop(index: usize, shared: Arc<Shared>) {
    let _live = LiveWorker(&shared.stats);
    tracing::debug!("Worker {} started", index);

    loop {
        let chunk = {
            let mut state = shared.lock();

            while state.queue.is_empty() && state.running {
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }

            if !state.running {
                break;
            }

            match state.queue.claim() {
                Some(chunk) => chunk,
                None => continue,
            }
        };

        tracing::trace!(
            "Worker {} copying {} bytes at offset {}",
            index,
            chunk.len(),
            chunk.offset()
        );
        chunk.execute(index, &shared.stats);
    }

    tracing::debug!("Worker {} shutting down", index);
}

fn spawn_worker(index: usize, shared: Arc<Shared>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("memcpy-worker-{}", index))
        .spawn(move || worker_loop(index, shared))
}

/// Fixed pool of copy workers
pub struct CopyPool {
    /// Configuration
    config: PoolConfig,
    /// Shared queue state
    shared: Arc<Shared>,
    /// Worker handles, joined on shutdown
    workers: Vec<JoinHandle<()>>,
}

impl CopyPool {
    /// Create a pool and spawn its workers.
    ///
    /// If any worker fails to spawn, the ones already running are stopped
    /// and joined before the error is returned.
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_spawner(config, spawn_worker)
    }

    fn with_spawner<F>(config: PoolConfig, mut spawn: F) -> Result<Self>
    where
        F: FnMut(usize, Arc<Shared>) -> io::Result<JoinHandle<()>>,
    {
        config.validate()?;
        let threads = config.effective_threads();

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                queue: WorkQueue::new(),
                running: true,
            }),
            work_ready: Condvar::new(),
            stats: Arc::new(PoolStats::default()),
        });

        let mut pool = Self {
            config,
            shared,
            workers: Vec::with_capacity(threads),
        };

        for index in 0..threads {
            let shared = Arc::clone(&pool.shared);
            pool.shared.stats.live_workers.fetch_add(1, Ordering::SeqCst);

            match spawn(index, shared) {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    pool.shared.stats.live_workers.fetch_sub(1, Ordering::SeqCst);
                    return Err(MemcpyError::ThreadSpawn { index, source });
                }
            }
        }

        tracing::info!(
            "Copy pool started: {} workers, {} blocks",
            threads,
            humansize::format_size(pool.config.block_size as u64, humansize::BINARY)
        );

        Ok(pool)
    }

    /// Create a pool with `threads` workers (0 = default) and default granularity
    pub fn with_threads(threads: usize) -> Result<Self> {
        Self::new(PoolConfig::with_threads(threads))
    }

    /// Configuration the pool was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of worker threads
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Block plan this pool would use for a copy of `size` bytes
    pub fn plan(&self, size: usize) -> BlockPlan {
        BlockPlan::compute(size, self.config.block_size, self.thread_count())
    }

    /// Copy `src` into `dst`, blocking until every chunk is done.
    pub fn copy(&self, dst: &mut [u8], src: &[u8]) -> Result<CopyReport> {
        if dst.len() != src.len() {
            return Err(MemcpyError::LengthMismatch {
                destination: dst.len(),
                source_len: src.len(),
            });
        }

        // SAFETY: both slices are valid for their length and a `&mut` borrow
        // cannot alias the shared one.
        unsafe { self.copy_raw(dst.as_mut_ptr(), src.as_ptr(), src.len()) }
    }

    /// Copy `size` bytes from `src` to `dst`, blocking until done.
    ///
    /// # Safety
    ///
    /// Same contract as [`std::ptr::copy_nonoverlapping`]: `src` must be valid
    /// for reads and `dst` valid for writes of `size` bytes, and the two
    /// regions must not overlap. Both must stay valid until this returns.
    pub unsafe fn copy_raw(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<CopyReport> {
        let start = Instant::now();
        let plan = self.plan(size);
        if plan.blocks == 0 {
            return Ok(CopyReport::empty());
        }

        let (done_tx, done_rx) = bounded(plan.blocks);

        {
            let mut state = self.shared.lock();
            state.queue.push(WorkDescriptor::new(src, dst, &plan, done_tx));
            tracing::debug!(
                "Dispatching {} bytes as {} blocks (queue depth {})",
                size,
                plan.blocks,
                state.queue.len()
            );

            for _ in 0..plan.blocks {
                self.shared.work_ready.notify_one();
            }
        }

        let mut chunks = Vec::with_capacity(plan.blocks);
        while chunks.len() < plan.blocks {
            match done_rx.recv() {
                Ok(span) => chunks.push(span),
                // Every sender is gone, so no worker still touches the buffers.
                Err(_) => {
                    return Err(MemcpyError::WorkerLost {
                        completed: chunks.len(),
                        expected: plan.blocks,
                    })
                }
            }
        }

        self.shared.stats.requests_completed.fetch_add(1, Ordering::Relaxed);

        Ok(CopyReport {
            bytes: size,
            blocks: plan.blocks,
            chunks,
            duration: start.elapsed(),
        })
    }

    /// Stop all workers and wait for them to exit.
    ///
    /// Returns an error if any worker panicked.
    pub fn shutdown(mut self) -> Result<()> {
        match self.stop_and_join() {
            0 => Ok(()),
            count => Err(MemcpyError::WorkerPanicked { count }),
        }
    }

    /// Returns the number of workers that panicked
    fn stop_and_join(&mut self) -> usize {
        {
            let mut state = self.shared.lock();
            state.running = false;
        }
        // Any subset of workers may be parked; each must see `running == false`.
        self.shared.work_ready.notify_all();

        let panicked = self
            .workers
            .drain(..)
            .map(JoinHandle::join)
            .filter(|joined| joined.is_err())
            .count();

        if panicked > 0 {
            tracing::warn!("{} copy workers panicked", panicked);
        }
        tracing::info!("Copy pool stopped");

        panicked
    }
}

impl std::fmt::Debug for CopyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyPool")
            .field("config", &self.config)
            .field("threads", &self.workers.len())
            .field("stats", &self.shared.stats.snapshot())
            .finish()
    }
}

impl Drop for CopyPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop_and_join();
        }
    }
}
