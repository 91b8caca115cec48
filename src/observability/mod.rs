//! Log output: format, filtering and subscriber installation.

mod tracing_init;

pub use tracing_init::*;
