//! Shared infrastructure utilities for termai.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)

pub mod atomic_write;

pub use atomic_write::{DurabilityPolicy, WriteOptions, atomic_write, atomic_write_with_options};
