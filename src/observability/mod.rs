//! Structured logging setup.
//!
//! Console logging with configurable format (pretty, compact, JSON) and
//! environment-based filtering.

mod tracing_init;

pub use tracing_init::*;
