//! Core copy engine module
//!
//! Provides block planning, the shared work queue, and the persistent
//! worker pool that executes copy requests.

mod copier;
mod plan;
mod scheduler;

pub use copier::*;
pub use plan::*;
pub use scheduler::*;
