//! Tracing subscriber setup shared by the urlcheck binaries.

mod tracing;

pub use self::tracing::{LogFormat, init_tracing_with_verbosity};
