//! Configuration settings for threaded-memcpy
//!
//! Defines the pool configuration, CLI arguments, and defaults.

use crate::error::{MemcpyError, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Default block granularity (64 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default hard cap on worker threads
pub const DEFAULT_MAX_THREADS: usize = 8;

/// threaded-memcpy - block-parallel memory copy benchmark and planner
#[derive(Parser, Debug, Clone)]
#[command(name = "threaded-memcpy")]
#[command(author = "SmartCopy Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Split large memory copies across a persistent worker pool")]
#[command(long_about = r#"
threaded-memcpy splits one large memory copy into fixed-size blocks and copies
them concurrently on a pool of long-lived worker threads.

Examples:
  threaded-memcpy benchmark --size 256M --threads 4   # Compare copy strategies
  threaded-memcpy copy --size 1G -b 1M                # One verified pool copy
  threaded-memcpy plan --size 1M --threads 4          # Show the block split
  threaded-memcpy config --block-size 128K            # Print effective config
"#)]
pub struct CliArgs {
    /// Number of worker threads (0 = default, the thread cap)
    #[arg(short = 't', long, default_value = "0", value_name = "NUM", global = true)]
    pub threads: usize,

    /// Block granularity (e.g., 64K, 1M)
    #[arg(short = 'b', long, default_value = "64K", value_name = "SIZE", global = true)]
    pub block_size: String,

    /// Hard cap on worker threads
    #[arg(long, default_value = "8", value_name = "NUM", global = true)]
    pub max_threads: usize,

    /// Output format for reports
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output_format: OutputFormat,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compare copy_from_slice, a rayon chunked copy and the worker pool
    #[command(name = "benchmark")]
    Benchmark {
        /// Buffer size to copy
        #[arg(long, default_value = "256M")]
        size: String,
        /// Timed iterations per strategy
        #[arg(short = 'n', long, default_value = "10")]
        iterations: usize,
    },

    /// Copy one buffer through the pool and report chunks and throughput
    #[command(name = "copy")]
    Copy {
        /// Buffer size to copy
        #[arg(long, default_value = "64M")]
        size: String,
    },

    /// Show how a copy of the given size is split into chunks
    #[command(name = "plan")]
    Plan {
        /// Copy size
        #[arg(long, default_value = "1M")]
        size: String,
    },

    /// Print the effective pool configuration
    #[command(name = "config")]
    Config,
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Pool construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker thread count (0 = use `max_threads`)
    pub threads: usize,
    /// Target bytes per block
    pub block_size: usize,
    /// Hard cap on worker threads
    pub max_threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            max_threads: DEFAULT_MAX_THREADS,
        }
    }
}

impl PoolConfig {
    /// Config with an explicit thread count and default granularity
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Default::default()
        }
    }

    /// Set the block granularity
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the thread cap
    pub fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Number of workers the pool will actually spawn
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            self.max_threads
        } else {
            self.threads
        }
    }

    /// Reject configurations the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(MemcpyError::config("block size must be non-zero"));
        }
        if self.max_threads == 0 {
            return Err(MemcpyError::config("thread cap must be non-zero"));
        }
        if self.threads > self.max_threads {
            return Err(MemcpyError::config(format!(
                "{} threads requested, cap is {}",
                self.threads, self.max_threads
            )));
        }
        Ok(())
    }

    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let block_size = parse_size(&args.block_size)
            .map_err(|e| MemcpyError::config(format!("Invalid block size: {}", e)))?;

        let config = Self {
            threads: args.threads,
            block_size: block_size as usize,
            max_threads: args.max_threads,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(['G', 'B']), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(['M', 'B']), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(['K', 'B']), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        // Assume bytes if no suffix
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    if !num.is_finite() {
        return Err(format!("Invalid number: {}", num_str));
    }

    if num < 0.0 {
        return Err(format!("Negative size: {}", num_str));
    }

    let bytes = num * multiplier as f64;

    // u64::MAX rounds up to 2^64 as f64, so equality is already out of range
    if bytes >= u64::MAX as f64 {
        return Err(format!("Size too large: {}", size));
    }

    if num > 0.0 && bytes < 1.0 {
        return Err(format!("Size rounds to zero bytes: {}", size));
    }

    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("64K").unwrap(), 64 * 1024);
        assert_eq!(parse_size("64kb").unwrap(), 64 * 1024);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1.5M").unwrap(), 1536 * 1024);
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-1K").is_err());
    }

    #[test]
    fn test_parse_size_rejects_unrepresentable() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("0.5K").unwrap(), 512);
        assert!(parse_size("nan").is_err());
        assert!(parse_size("inf").is_err());
        assert!(parse_size("-inf").is_err());
        assert!(parse_size("1e30").is_err());
        assert!(parse_size("99999999999G").is_err());
        assert!(parse_size("0.5").is_err());
        assert!(parse_size("0.0001K").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.block_size, 64 * 1024);
        assert_eq!(config.effective_threads(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PoolConfig::default().block_size(0).validate().is_err());
        assert!(PoolConfig::default().max_threads(0).validate().is_err());
        assert!(PoolConfig::with_threads(9).validate().is_err());
        assert!(PoolConfig::with_threads(16).max_threads(16).validate().is_ok());
    }

    #[test]
    fn test_from_cli() {
        let args = CliArgs::parse_from(["threaded-memcpy", "-t", "4", "-b", "128K", "config"]);
        let config = PoolConfig::from_cli(&args).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.block_size, 128 * 1024);

        let args = CliArgs::parse_from(["threaded-memcpy", "-b", "huge", "config"]);
        assert!(PoolConfig::from_cli(&args).unwrap_err().is_config_error());
    }

    #[test]
    fn test_copy_command_args() {
        let args = CliArgs::parse_from(["threaded-memcpy", "copy", "--size", "16M", "-t", "2"]);
        assert!(matches!(&args.command, Commands::Copy { size } if size == "16M"));
        assert_eq!(PoolConfig::from_cli(&args).unwrap().effective_threads(), 2);
    }

    #[test]
    fn test_config_deserialize_fills_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{"threads": 2}"#).unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.max_threads, DEFAULT_MAX_THREADS);
    }
}
