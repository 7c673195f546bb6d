//! Global `tracing` subscriber with a filter that can be swapped once the
//! settings are known. See `bin/logger_demo.rs` for usage.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
