//! Error types for threaded-memcpy
//!
//! The pool is a performance primitive, so the taxonomy is small: construction
//! failures, invalid configuration, caller-side argument errors and lost workers.

use thiserror::Error;

/// Main error type for pool and copy operations
#[derive(Error, Debug)]
pub enum MemcpyError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A worker thread could not be spawned during pool construction
    #[error("Failed to spawn worker {index}: {source}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Source and destination slices differ in length
    #[error("Length mismatch: destination is {destination} bytes, source is {source_len} bytes")]
    LengthMismatch {
        destination: usize,
        source_len: usize,
    },

    /// The completion signal closed before every chunk reported back
    #[error("Worker lost: {completed} of {expected} chunks completed")]
    WorkerLost { completed: usize, expected: usize },

    /// A finished copy does not match its source
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// One or more worker threads panicked before being joined
    #[error("{count} worker thread(s) panicked")]
    WorkerPanicked { count: usize },

    /// Report serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MemcpyError>,
    },
}

impl MemcpyError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error came from invalid configuration or arguments
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::ConfigError(_) | Self::LengthMismatch { .. } => true,
            Self::WithContext { source, .. } => source.is_config_error(),
            _ => false,
        }
    }

    /// Check if this error means the worker set is degraded
    pub fn is_worker_failure(&self) -> bool {
        match self {
            Self::ThreadSpawn { .. } | Self::WorkerLost { .. } | Self::WorkerPanicked { .. } => {
                true
            }
            Self::WithContext { source, .. } => source.is_worker_failure(),
            _ => false,
        }
    }
}

/// Result type alias for threaded-memcpy operations
pub type Result<T> = std::result::Result<T, MemcpyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = MemcpyError::config("block size must be non-zero");
        assert_eq!(err.to_string(), "Configuration error: block size must be non-zero");
        assert!(err.is_config_error());
        assert!(!err.is_worker_failure());
    }

    #[test]
    fn test_context_preserves_classification() {
        let err = MemcpyError::WorkerLost {
            completed: 2,
            expected: 4,
        }
        .with_context("copy of 1 MiB");

        assert!(err.is_worker_failure());
        assert!(err.to_string().starts_with("copy of 1 MiB: Worker lost"));
    }

    #[test]
    fn test_length_mismatch() {
        let err = MemcpyError::LengthMismatch {
            destination: 10,
            source_len: 12,
        };
        assert!(err.is_config_error());
        assert!(err.to_string().contains("10"));
    }
}
