//! Configuration module for threaded-memcpy
//!
//! Provides pool configuration, CLI arguments, and size parsing.

mod settings;

pub use settings::*;
