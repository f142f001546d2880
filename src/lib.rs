//! # threaded-memcpy - Block-Parallel Memory Copy
//!
//! Splits one large memory copy into fixed-size blocks and copies them
//! concurrently on a pool of long-lived worker threads. The calling thread
//! blocks until every block is done.
//!
//! ## Features
//!
//! - **Persistent Workers**: threads are spawned once and parked between copies
//! - **Bounded Fan-out**: never more blocks than workers, one or more for any non-empty copy
//! - **Exact Partitioning**: chunks tile the request with no gap or overlap
//! - **Concurrent Callers**: several threads may share one pool
//! - **Runtime Configuration**: block size and thread cap are pool parameters
//!
//! ## Quick Start
//!
//! ```no_run
//! use threaded_memcpy::CopyPool;
//!
//! let pool = CopyPool::with_threads(4).unwrap();
//!
//! let src = vec![0xABu8; 64 * 1024 * 1024];
//! let mut dst = vec![0u8; src.len()];
//!
//! let report = pool.copy(&mut dst, &src).unwrap();
//! println!("Copied {} bytes in {} blocks", report.bytes, report.blocks);
//!
//! pool.shutdown().unwrap();
//! ```
//!
//! ## Custom Block Size
//!
//! ```no_run
//! use threaded_memcpy::{CopyPool, PoolConfig};
//!
//! let config = PoolConfig::with_threads(8).block_size(256 * 1024);
//! let pool = CopyPool::new(config).unwrap();
//!
//! let plan = pool.plan(1024 * 1024);
//! println!("{} blocks of {} bytes", plan.blocks, plan.chunk_size);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod benchmark;
pub mod config;
pub mod core;
pub mod error;

// Re-export commonly used types
pub use crate::config::PoolConfig;
pub use crate::core::{BlockPlan, ChunkSpan, CopyPool, CopyReport, PoolStats};
pub use crate::error::{MemcpyError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use threaded_memcpy::prelude::*;
    //! ```

    pub use crate::config::{PoolConfig, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_THREADS};
    pub use crate::core::{BlockPlan, ChunkSpan, CopyPool, CopyReport, PoolStats, StatsSnapshot};
    pub use crate::error::{MemcpyError, Result};
}
