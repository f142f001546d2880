//! Copy strategy benchmarks
//!
//! Times the same buffer copy with `copy_from_slice`, a rayon chunked copy,
//! and a [`CopyPool`], so the pool can be judged against both baselines.

use crate::core::{CopyPool, CopyReport};
use crate::error::{MemcpyError, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Copy strategies compared by the benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyStrategy {
    /// Single-threaded `copy_from_slice`
    Std,
    /// rayon `par_chunks_mut` with the pool's block size
    Rayon,
    /// The persistent worker pool
    Pool,
}

impl CopyStrategy {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Std => "copy_from_slice",
            Self::Rayon => "rayon chunks",
            Self::Pool => "worker pool",
        }
    }
}

/// Timing for one strategy
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    /// Strategy measured
    pub strategy: CopyStrategy,
    /// Bytes per iteration
    pub size: usize,
    /// Timed iterations
    pub iterations: usize,
    /// Fastest iteration
    pub best: Duration,
    /// Mean iteration time
    pub mean: Duration,
}

impl BenchmarkResult {
    fn from_samples(strategy: CopyStrategy, size: usize, samples: &[Duration]) -> Self {
        let best = samples.iter().copied().min().unwrap_or_default();
        let total: Duration = samples.iter().sum();
        let mean = if samples.is_empty() {
            Duration::ZERO
        } else {
            total / samples.len() as u32
        };

        Self {
            strategy,
            size,
            iterations: samples.len(),
            best,
            mean,
        }
    }

    /// Throughput of the fastest iteration in bytes/second
    pub fn best_throughput(&self) -> f64 {
        let secs = self.best.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.size as f64 / secs
        }
    }
}

/// Copy `src` into `dst` with rayon, one task per `chunk_size` bytes
pub fn rayon_copy(dst: &mut [u8], src: &[u8], chunk_size: usize) -> Result<()> {
    if dst.len() != src.len() {
        return Err(MemcpyError::LengthMismatch {
            destination: dst.len(),
            source_len: src.len(),
        });
    }

    dst.par_chunks_mut(chunk_size.max(1))
        .zip(src.par_chunks(chunk_size.max(1)))
        .for_each(|(d, s)| d.copy_from_slice(s));

    Ok(())
}

fn time_iterations<F>(iterations: usize, mut copy: F) -> Result<Vec<Duration>>
where
    F: FnMut() -> Result<()>,
{
    // Warm up page mappings and caches
    copy()?;

    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        copy()?;
        samples.push(start.elapsed());
    }
    Ok(samples)
}

fn pattern_buffer(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn verify(name: &str, dst: &[u8], src: &[u8]) -> Result<()> {
    if dst != src {
        return Err(MemcpyError::VerificationFailed(format!(
            "{} produced a mismatched copy of {} bytes",
            name,
            src.len()
        )));
    }
    Ok(())
}

/// Copy one `size`-byte buffer through the pool and verify the result
pub fn run_single_copy(pool: &CopyPool, size: usize) -> Result<CopyReport> {
    let src = pattern_buffer(size);
    let mut dst = vec![0u8; size];

    let report = pool.copy(&mut dst, &src)?;
    verify(CopyStrategy::Pool.name(), &dst, &src)?;

    if !report.is_exact_tiling() {
        return Err(MemcpyError::VerificationFailed(format!(
            "{} chunks do not tile {} bytes",
            report.chunks.len(),
            size
        )));
    }

    Ok(report)
}

/// Run every strategy on a `size`-byte buffer and verify each result
pub fn run_benchmark(pool: &CopyPool, size: usize, iterations: usize) -> Result<Vec<BenchmarkResult>> {
    let src = pattern_buffer(size);
    let mut dst = vec![0u8; size];
    let block_size = pool.config().block_size;
    let mut results = Vec::with_capacity(3);

    for strategy in [CopyStrategy::Std, CopyStrategy::Rayon, CopyStrategy::Pool] {
        dst.fill(0);
        tracing::debug!("Benchmarking {} on {} bytes", strategy.name(), size);

        let samples = match strategy {
            CopyStrategy::Std => time_iterations(iterations, || {
                dst.copy_from_slice(&src);
                Ok(())
            })?,
            CopyStrategy::Rayon => time_iterations(iterations, || rayon_copy(&mut dst, &src, block_size))?,
            CopyStrategy::Pool => time_iterations(iterations, || pool.copy(&mut dst, &src).map(|_| ()))?,
        };

        verify(strategy.name(), &dst, &src)?;
        results.push(BenchmarkResult::from_samples(strategy, size, &samples));
    }

    Ok(results)
}

/// Print results as a table
pub fn print_results(results: &[BenchmarkResult]) {
    println!("{:18} {:>12} {:>12} {:>14}", "Strategy", "Best", "Mean", "Throughput");
    for result in results {
        println!(
            "{:18} {:>12.2?} {:>12.2?} {:>12}/s",
            result.strategy.name(),
            result.best,
            result.mean,
            humansize::format_size(result.best_throughput() as u64, humansize::BINARY)
        );
    }
}
