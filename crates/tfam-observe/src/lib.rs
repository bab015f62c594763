//! Logging setup shared by the session binaries.

mod logger;
pub use logger::*;
